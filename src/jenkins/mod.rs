//! Jenkins control-plane collaborators.
//!
//! `session` holds the authenticated HTTP client, `job` the declarative
//! job definition and its idempotent upsert, `build` the trigger/poll
//! driver. The [`ControlPlane`] trait is the seam the job and build stages
//! are tested through.

pub mod build;
pub mod job;
pub mod session;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ControlPlaneError;

pub use build::{trigger_and_await, BuildHandle, BuildPollPolicy};
pub use job::{sync_job, JobDescriptor, SyncAction};
pub use session::JenkinsSession;

/// The authenticated identity reported by the control plane.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    /// Display name of the authenticated user.
    #[serde(rename = "fullName")]
    pub full_name: String,
}

/// Reference to a build within job info.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildRef {
    /// Server-assigned build number.
    pub number: u32,
}

/// Subset of job info the driver needs.
#[derive(Debug, Clone, Deserialize)]
pub struct JobInfo {
    /// Most recent build of the job, if any build has ever been queued.
    #[serde(rename = "lastBuild")]
    pub last_build: Option<BuildRef>,
}

/// Subset of build info the driver needs.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildStatus {
    /// Whether the build is still executing.
    pub building: bool,
}

/// Job and build operations exposed by the CI control plane.
///
/// Write operations are fire-and-forget: server-side idempotency is the
/// control plane's responsibility.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Fetch the authenticated identity.
    async fn who_am_i(&self) -> Result<Identity, ControlPlaneError>;

    /// Read a job's config.xml. `JobNotFound` when the job does not exist.
    async fn job_config(&self, name: &str) -> Result<String, ControlPlaneError>;

    /// Create a new job from config.xml.
    async fn create_job(&self, name: &str, config_xml: &str) -> Result<(), ControlPlaneError>;

    /// Replace an existing job's config.xml.
    async fn reconfigure_job(&self, name: &str, config_xml: &str) -> Result<(), ControlPlaneError>;

    /// Enqueue a build. The assigned build number is not returned; it must
    /// be discovered afterward via `job_info`.
    async fn trigger_build(&self, name: &str) -> Result<(), ControlPlaneError>;

    /// Fetch job info (most recent build reference).
    async fn job_info(&self, name: &str) -> Result<JobInfo, ControlPlaneError>;

    /// Fetch a build's status.
    async fn build_status(&self, name: &str, number: u32) -> Result<BuildStatus, ControlPlaneError>;

    /// Fetch a build's console output as plain text.
    async fn console_output(&self, name: &str, number: u32) -> Result<String, ControlPlaneError>;
}
