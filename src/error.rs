//! Error types for ci-pilot operations.
//!
//! Defines error types for the major subsystems:
//! - Docker image/container management
//! - CI control-plane HTTP interactions
//! - Orchestration of the overall run
//!
//! Transient infrastructure hiccups are absorbed where they are observed
//! (see `docker::client::Presence`); only failures a caller can act on are
//! modeled here.

use thiserror::Error;

/// Errors that can occur during Docker operations.
#[derive(Debug, Error)]
pub enum DockerError {
    #[error("Docker daemon not available: {0}")]
    DaemonUnavailable(String),

    #[error("Docker build failed: {0}")]
    BuildFailed(String),

    #[error("Docker run failed: {0}")]
    RunFailed(String),

    #[error("Container '{name}' not found")]
    ContainerNotFound { name: String },

    #[error("Failed to materialize build context: {0}")]
    ContextFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur talking to the CI control plane.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Job '{0}' not found")]
    JobNotFound(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Failed to parse control-plane response: {0}")]
    ParseError(String),
}

/// Errors that abort an orchestration run.
///
/// Soft stops (e.g. no build number visible after the grace window) are not
/// errors; they are reported through `orchestrator::RunOutcome`.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The control-plane session could not be established. Maps to exit code 1.
    #[error("Control-plane session could not be established: {0}")]
    Auth(#[source] ControlPlaneError),

    /// A control-plane operation failed after the session was established.
    #[error("Control-plane error: {0}")]
    Plane(#[from] ControlPlaneError),

    /// A Docker operation failed in a way the lifecycle manager could not absorb.
    #[error("Docker error: {0}")]
    Docker(#[from] DockerError),

    /// A bounded poll ran out of time.
    #[error("Timed out waiting for {stage}")]
    Timeout { stage: &'static str },

    /// The run was cancelled between poll attempts.
    #[error("Run cancelled")]
    Cancelled,

    /// Writing the console-log artifact failed.
    #[error("Failed to persist build output: {0}")]
    Artifact(#[source] std::io::Error),
}
