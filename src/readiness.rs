//! Server readiness detection.
//!
//! Probes the control plane with short authenticated requests until it
//! answers with a status proving the listener is up. 403 counts: it means
//! the server is alive and talking HTTP even if authorization differs.
//! Everything else, including transport errors, is "not yet".

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::PilotConfig;
use crate::error::OrchestratorError;
use crate::poll::{poll_until, CancelSignal, PollOutcome, PollPolicy};

/// Statuses accepted as proof of liveness.
const REACHABLE_STATUSES: [u16; 3] = [200, 302, 403];

/// Per-attempt timeout for a single probe request.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A single liveness probe against the control plane.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Issue one probe and report the HTTP status, or a transport-level
    /// failure description.
    async fn status(&self) -> Result<u16, String>;
}

/// Probe backed by an authenticated GET against the service base URL.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    user: String,
    token: String,
}

impl HttpProbe {
    /// Build a probe for the configured service.
    ///
    /// Redirects are not followed so a 302 from the server is observable
    /// as such.
    pub fn new(config: &PilotConfig) -> Result<Self, OrchestratorError> {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                OrchestratorError::Plane(crate::error::ControlPlaneError::RequestFailed(
                    e.to_string(),
                ))
            })?;

        Ok(Self {
            client,
            url: config.service_url.clone(),
            user: config.user.clone(),
            token: config.api_token.clone(),
        })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn status(&self) -> Result<u16, String> {
        self.client
            .get(&self.url)
            .basic_auth(&self.user, Some(&self.token))
            .send()
            .await
            .map(|response| response.status().as_u16())
            .map_err(|e| e.to_string())
    }
}

/// Wait until the control plane is reachable.
///
/// Returns as soon as a probe yields 200, 302 or 403; retries on any other
/// status or transport error until the policy's deadline.
pub async fn wait_until_reachable(
    probe: &dyn Probe,
    policy: PollPolicy,
    cancel: &CancelSignal,
) -> Result<(), OrchestratorError> {
    info!("Waiting for the CI server to become reachable");

    let outcome = poll_until(policy, cancel, || async {
        match probe.status().await {
            Ok(status) if REACHABLE_STATUSES.contains(&status) => Some(status),
            Ok(status) => {
                debug!(status, "Server answered but is not ready yet");
                None
            }
            Err(e) => {
                debug!(error = %e, "Probe failed, still waiting");
                None
            }
        }
    })
    .await;

    match outcome {
        PollOutcome::Ready(status) => {
            info!(status, "CI server is up");
            Ok(())
        }
        PollOutcome::TimedOut => Err(OrchestratorError::Timeout {
            stage: "server readiness",
        }),
        PollOutcome::Cancelled => Err(OrchestratorError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Probe replaying a fixed sequence of results.
    struct ScriptedProbe {
        script: Mutex<VecDeque<Result<u16, String>>>,
        attempts: Mutex<u32>,
    }

    impl ScriptedProbe {
        fn new(script: Vec<Result<u16, String>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                attempts: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl Probe for ScriptedProbe {
        async fn status(&self) -> Result<u16, String> {
            *self.attempts.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(200))
        }
    }

    fn fast_policy(deadline_ms: u64) -> PollPolicy {
        PollPolicy::bounded(Duration::from_millis(1), Duration::from_millis(deadline_ms))
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt_after_error_and_500() {
        let probe = ScriptedProbe::new(vec![
            Err("connection refused".to_string()),
            Ok(500),
            Ok(403),
        ]);

        wait_until_reachable(&probe, fast_policy(1000), &CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(*probe.attempts.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_accepts_200_and_302_immediately() {
        for status in [200u16, 302] {
            let probe = ScriptedProbe::new(vec![Ok(status)]);
            wait_until_reachable(&probe, fast_policy(1000), &CancelSignal::never())
                .await
                .unwrap();
            assert_eq!(*probe.attempts.lock().unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn test_times_out_when_never_ready() {
        let probe = ScriptedProbe::new(vec![Ok(503); 64]);

        let result = wait_until_reachable(&probe, fast_policy(10), &CancelSignal::never()).await;

        assert!(matches!(
            result,
            Err(OrchestratorError::Timeout { stage: "server readiness" })
        ));
    }
}
