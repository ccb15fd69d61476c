//! Run configuration for the bootstrap pipeline.
//!
//! All tunables live in a single immutable [`PilotConfig`] built once at
//! startup from CLI arguments / environment variables and passed by
//! reference into every stage. There is no process-wide mutable state.

use std::path::PathBuf;
use std::time::Duration;

use crate::docker::container::{ContainerRef, PortMapping};
use crate::docker::image::ImageRef;
use crate::jenkins::job::JobDescriptor;
use crate::poll::PollPolicy;

/// Immutable configuration for one orchestration run.
#[derive(Debug, Clone)]
pub struct PilotConfig {
    // Control plane
    /// Base URL of the CI server (e.g. "http://localhost:8080").
    pub service_url: String,
    /// Username for basic-auth against the CI API.
    pub user: String,
    /// API token for basic-auth against the CI API.
    pub api_token: String,
    /// Name of the job to create or update.
    pub job_name: String,

    // Job content
    /// Git repository the job builds.
    pub repo_url: String,
    /// Branch specifier for the job's SCM config.
    pub branch_spec: String,
    /// Shell command the job runs.
    pub build_command: String,

    // Docker
    /// Tag of the Jenkins image to ensure.
    pub image_tag: String,
    /// Name of the Jenkins container to ensure.
    pub container_name: String,

    // Timeouts
    /// Total budget for the server-readiness wait.
    pub readiness_timeout: Duration,
    /// Total budget for the build-completion poll.
    pub build_timeout: Duration,

    // Output
    /// Where the final console log is written, overwritten each run.
    pub output_path: PathBuf,
}

/// Delay between readiness probes and build-status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How often the driver re-reads job info while waiting for the new build
/// number to become visible.
pub const DISCOVERY_INTERVAL: Duration = Duration::from_secs(2);

/// Grace window for the asynchronously-enqueued build to show up as
/// `lastBuild`. Exhausting it is a soft stop, not an error.
pub const GRACE_PERIOD: Duration = Duration::from_secs(10);

impl PilotConfig {
    /// The image the container lifecycle manager provisions.
    pub fn image_ref(&self) -> ImageRef {
        ImageRef::new(&self.image_tag)
    }

    /// The container the lifecycle manager drives toward `running`.
    ///
    /// Ports mirror the stock Jenkins layout: 8080 for the web UI/API and
    /// 50000 for inbound agents.
    pub fn container_ref(&self) -> ContainerRef {
        ContainerRef {
            name: self.container_name.clone(),
            ports: vec![PortMapping::new(8080, 8080), PortMapping::new(50000, 50000)],
        }
    }

    /// The declarative job definition synced to the control plane.
    pub fn job_descriptor(&self) -> JobDescriptor {
        JobDescriptor {
            name: self.job_name.clone(),
            repo_url: self.repo_url.clone(),
            branch_spec: self.branch_spec.clone(),
            build_command: self.build_command.clone(),
        }
    }

    /// Poll policy for the readiness wait.
    pub fn readiness_policy(&self) -> PollPolicy {
        PollPolicy::bounded(POLL_INTERVAL, self.readiness_timeout)
    }

    /// Poll policy for build-number discovery (the grace window).
    pub fn discovery_policy(&self) -> PollPolicy {
        PollPolicy::bounded(DISCOVERY_INTERVAL, GRACE_PERIOD)
    }

    /// Poll policy for the build-completion wait.
    pub fn build_policy(&self) -> PollPolicy {
        PollPolicy::bounded(POLL_INTERVAL, self.build_timeout)
    }
}
