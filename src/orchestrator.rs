//! Run orchestration.
//!
//! Sequences the pipeline stages in strict order (provision image, ensure
//! container, wait for readiness, connect, sync job, drive build) and
//! persists the console log. Each stage's postcondition is the next
//! stage's precondition, and no stage assumes a clean slate: the whole
//! sequence is safe to re-run against whatever state a previous invocation
//! left behind.
//!
//! Exactly one run may be active against a given job name at a time; the
//! job upsert and build-number discovery race against concurrent writers.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::PilotConfig;
use crate::docker::client::ContainerRuntime;
use crate::docker::container::ensure_running;
use crate::error::{ControlPlaneError, OrchestratorError};
use crate::jenkins::build::{trigger_and_await, BuildPollPolicy};
use crate::jenkins::job::sync_job;
use crate::jenkins::{ControlPlane, Identity, JenkinsSession};
use crate::poll::CancelSignal;
use crate::readiness::{wait_until_reachable, Probe};

/// How a run ended, short of a fatal error.
#[derive(Debug)]
pub enum RunOutcome {
    /// The build finished and its console log was persisted.
    Completed {
        /// Build number of the persisted log.
        build_number: u32,
        /// Where the log was written.
        artifact: PathBuf,
    },
    /// The run stopped cleanly without a persisted artifact.
    SoftStopped {
        /// Human-readable reason, already logged.
        reason: String,
    },
}

/// Establishes the authenticated control-plane session.
///
/// A seam so the full pipeline can run against a scripted control plane in
/// tests.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<(Box<dyn ControlPlane>, Identity), ControlPlaneError>;
}

/// Connector backed by a real Jenkins session.
pub struct JenkinsConnector<'a> {
    config: &'a PilotConfig,
}

impl<'a> JenkinsConnector<'a> {
    pub fn new(config: &'a PilotConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for JenkinsConnector<'_> {
    async fn connect(&self) -> Result<(Box<dyn ControlPlane>, Identity), ControlPlaneError> {
        let (session, identity) = JenkinsSession::connect(
            &self.config.service_url,
            &self.config.user,
            &self.config.api_token,
        )
        .await?;
        Ok((Box::new(session), identity))
    }
}

/// Run the full bootstrap/readiness/trigger/poll sequence with explicit
/// collaborators.
pub async fn run_stages(
    config: &PilotConfig,
    runtime: &dyn ContainerRuntime,
    probe: &dyn Probe,
    connector: &dyn Connector,
    cancel: &CancelSignal,
) -> Result<RunOutcome, OrchestratorError> {
    ensure_running(runtime, &config.container_ref(), &config.image_ref()).await?;

    wait_until_reachable(probe, config.readiness_policy(), cancel).await?;

    let (plane, identity) = connector
        .connect()
        .await
        .map_err(OrchestratorError::Auth)?;
    info!(user = %identity.full_name, "Connected to the control plane");

    sync_job(plane.as_ref(), &config.job_descriptor()).await?;

    let policy = BuildPollPolicy {
        discovery: config.discovery_policy(),
        completion: config.build_policy(),
    };

    let handle = match trigger_and_await(plane.as_ref(), &config.job_name, &policy, cancel).await? {
        Some(handle) => handle,
        None => {
            warn!(job = %config.job_name, "Stopping without a build to report");
            return Ok(RunOutcome::SoftStopped {
                reason: "no build info found".to_string(),
            });
        }
    };

    tokio::fs::write(&config.output_path, &handle.console)
        .await
        .map_err(OrchestratorError::Artifact)?;
    info!(path = %config.output_path.display(), build = handle.number, "Console log saved");

    Ok(RunOutcome::Completed {
        build_number: handle.number,
        artifact: config.output_path.clone(),
    })
}

/// Run the pipeline with the real Docker and Jenkins collaborators.
pub async fn run(
    config: &PilotConfig,
    cancel: &CancelSignal,
) -> Result<RunOutcome, OrchestratorError> {
    let runtime = crate::docker::client::BollardRuntime::new()?;
    let probe = crate::readiness::HttpProbe::new(config)?;
    let connector = JenkinsConnector::new(config);

    run_stages(config, &runtime, &probe, &connector, cancel).await
}
