//! ci-pilot: bootstrap and drive a Jenkins-in-Docker CI controller.
//!
//! The pipeline ensures a custom Jenkins image and container exist and are
//! running, waits for the server to accept connections, idempotently syncs
//! a build job, triggers a build, polls it to completion and persists the
//! console log. Every stage is an idempotent re-check, so repeated runs
//! converge from whatever partial state the last one left behind.

pub mod cli;
pub mod config;
pub mod docker;
pub mod error;
pub mod jenkins;
pub mod orchestrator;
pub mod poll;
pub mod readiness;

// Re-export commonly used error types
pub use error::{ControlPlaneError, DockerError, OrchestratorError};
