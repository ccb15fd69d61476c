//! Build trigger and completion driver.
//!
//! Triggering only enqueues: the control plane assigns the build number
//! asynchronously, so the driver snapshots the job's latest build number
//! before triggering and then polls job info during a grace window for a
//! number newer than that snapshot, so a previous run's finished build is
//! never mistaken for the one just triggered. A new number that never
//! shows up is a soft stop. Once known, the build is polled until it
//! leaves its running state and the console log is fetched.

use tracing::{debug, info, warn};

use crate::error::OrchestratorError;
use crate::poll::{poll_until, CancelSignal, PollOutcome, PollPolicy};

use super::ControlPlane;

/// A finished build and its captured console log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildHandle {
    /// Job the build belongs to.
    pub job_name: String,
    /// Server-assigned build number.
    pub number: u32,
    /// Console text of the terminal build. Immutable once finished.
    pub console: String,
}

/// Pacing for the two waits the driver performs.
#[derive(Debug, Clone, Copy)]
pub struct BuildPollPolicy {
    /// Grace window for the new build number to become visible.
    pub discovery: PollPolicy,
    /// Wait for the build to finish.
    pub completion: PollPolicy,
}

/// Trigger a build and wait for it to finish.
///
/// Returns `Ok(None)` when no build number becomes visible within the
/// grace window: an acknowledged race with the control plane's queue, not
/// an error. Transient read failures while polling are absorbed as "not
/// yet"; only the trigger itself, the final console fetch, poll timeouts
/// and cancellation propagate.
pub async fn trigger_and_await(
    plane: &dyn ControlPlane,
    job_name: &str,
    policy: &BuildPollPolicy,
    cancel: &CancelSignal,
) -> Result<Option<BuildHandle>, OrchestratorError> {
    // Snapshot the latest build number before triggering so the discovery
    // poll only accepts a number assigned after the trigger. A failed read
    // here degrades to threshold 0, accepting any visible build for this
    // one run.
    let threshold = match plane.job_info(job_name).await {
        Ok(info) => info.last_build.map(|b| b.number).unwrap_or(0),
        Err(e) => {
            debug!(job = %job_name, error = %e, "Could not read job info before trigger");
            0
        }
    };

    info!(job = %job_name, "Triggering build");
    plane.trigger_build(job_name).await?;

    let number = match poll_until(policy.discovery, cancel, || async {
        match plane.job_info(job_name).await {
            Ok(info) => info
                .last_build
                .map(|b| b.number)
                .filter(|number| *number > threshold),
            Err(e) => {
                debug!(job = %job_name, error = %e, "Job info not readable yet");
                None
            }
        }
    })
    .await
    {
        PollOutcome::Ready(number) => number,
        PollOutcome::TimedOut => {
            warn!(job = %job_name, "No build info found within the grace window");
            return Ok(None);
        }
        PollOutcome::Cancelled => return Err(OrchestratorError::Cancelled),
    };

    info!(job = %job_name, build = number, "Waiting for build to finish");

    let outcome = poll_until(policy.completion, cancel, || async {
        match plane.build_status(job_name, number).await {
            Ok(status) if !status.building => Some(()),
            Ok(_) => None,
            Err(e) => {
                debug!(job = %job_name, build = number, error = %e, "Build status not readable yet");
                None
            }
        }
    })
    .await;

    match outcome {
        PollOutcome::Ready(()) => {}
        PollOutcome::TimedOut => {
            return Err(OrchestratorError::Timeout {
                stage: "build completion",
            })
        }
        PollOutcome::Cancelled => return Err(OrchestratorError::Cancelled),
    }

    info!(job = %job_name, build = number, "Build done");

    let console = plane.console_output(job_name, number).await?;

    Ok(Some(BuildHandle {
        job_name: job_name.to_string(),
        number,
        console,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControlPlaneError;
    use crate::jenkins::{BuildRef, BuildStatus, Identity, JobInfo};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Control plane that reveals the new build number (42) after a few
    /// job-info reads and keeps the build running for a few status polls.
    /// Until the reveal, job info reports `old_build`, the previous run's
    /// finished build, if any.
    struct FakePlane {
        old_build: Option<u32>,
        reveal_after: u32,
        job_info_reads: Mutex<u32>,
        building_polls: Mutex<u32>,
        polls_until_done: u32,
        console: String,
    }

    impl FakePlane {
        fn new(reveal_after: u32, polls_until_done: u32) -> Self {
            Self {
                old_build: None,
                reveal_after,
                job_info_reads: Mutex::new(0),
                building_polls: Mutex::new(0),
                polls_until_done,
                console: "BUILD SUCCESSFUL\n".to_string(),
            }
        }

        fn with_old_build(mut self, number: u32) -> Self {
            self.old_build = Some(number);
            self
        }
    }

    #[async_trait]
    impl ControlPlane for FakePlane {
        async fn who_am_i(&self) -> Result<Identity, ControlPlaneError> {
            Ok(Identity {
                full_name: "admin".to_string(),
            })
        }

        async fn job_config(&self, name: &str) -> Result<String, ControlPlaneError> {
            Err(ControlPlaneError::JobNotFound(name.to_string()))
        }

        async fn create_job(&self, _: &str, _: &str) -> Result<(), ControlPlaneError> {
            Ok(())
        }

        async fn reconfigure_job(&self, _: &str, _: &str) -> Result<(), ControlPlaneError> {
            Ok(())
        }

        async fn trigger_build(&self, _name: &str) -> Result<(), ControlPlaneError> {
            Ok(())
        }

        async fn job_info(&self, _name: &str) -> Result<JobInfo, ControlPlaneError> {
            let mut reads = self.job_info_reads.lock().unwrap();
            *reads += 1;
            if *reads > self.reveal_after {
                Ok(JobInfo {
                    last_build: Some(BuildRef { number: 42 }),
                })
            } else {
                Ok(JobInfo {
                    last_build: self.old_build.map(|number| BuildRef { number }),
                })
            }
        }

        async fn build_status(
            &self,
            _name: &str,
            number: u32,
        ) -> Result<BuildStatus, ControlPlaneError> {
            assert_eq!(number, 42);
            let mut polls = self.building_polls.lock().unwrap();
            *polls += 1;
            Ok(BuildStatus {
                building: *polls <= self.polls_until_done,
            })
        }

        async fn console_output(
            &self,
            _name: &str,
            number: u32,
        ) -> Result<String, ControlPlaneError> {
            assert_eq!(number, 42);
            Ok(self.console.clone())
        }
    }

    fn fast_policy() -> BuildPollPolicy {
        BuildPollPolicy {
            discovery: PollPolicy::bounded(Duration::from_millis(1), Duration::from_millis(50)),
            completion: PollPolicy::bounded(Duration::from_millis(1), Duration::from_millis(500)),
        }
    }

    #[tokio::test]
    async fn test_discovers_number_then_polls_until_not_building() {
        // Read 1 is the pre-trigger snapshot; the build shows up on read 4.
        let plane = FakePlane::new(3, 3);

        let handle = trigger_and_await(&plane, "arc_job", &fast_policy(), &CancelSignal::never())
            .await
            .unwrap()
            .expect("build should finish");

        assert_eq!(handle.number, 42);
        assert_eq!(handle.console, "BUILD SUCCESSFUL\n");
        // The status poll kept going while `building` was true.
        assert_eq!(*plane.building_polls.lock().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_previous_finished_build_is_not_mistaken_for_the_new_one() {
        // Job info keeps reporting the previous run's finished build (1)
        // until the queue assigns the new number. The driver must wait for
        // 42 rather than latch onto 1; `build_status` asserts it is only
        // ever asked about 42.
        let plane = FakePlane::new(3, 0).with_old_build(1);

        let handle = trigger_and_await(&plane, "arc_job", &fast_policy(), &CancelSignal::never())
            .await
            .unwrap()
            .expect("build should finish");

        assert_eq!(handle.number, 42);
    }

    #[tokio::test]
    async fn test_soft_stop_when_no_build_becomes_visible() {
        // Reveal far beyond what the grace window allows.
        let plane = FakePlane::new(10_000, 0);

        let result = trigger_and_await(&plane, "arc_job", &fast_policy(), &CancelSignal::never())
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(*plane.building_polls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_soft_stop_when_only_the_old_build_stays_visible() {
        let plane = FakePlane::new(10_000, 0).with_old_build(5);

        let result = trigger_and_await(&plane, "arc_job", &fast_policy(), &CancelSignal::never())
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(*plane.building_polls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_completion_timeout_is_fatal() {
        // Snapshot on read 1, new number from read 2, never stops building.
        let plane = FakePlane::new(1, u32::MAX);
        let policy = BuildPollPolicy {
            discovery: PollPolicy::bounded(Duration::from_millis(1), Duration::from_millis(50)),
            completion: PollPolicy::bounded(Duration::from_millis(1), Duration::from_millis(10)),
        };

        let result =
            trigger_and_await(&plane, "arc_job", &policy, &CancelSignal::never()).await;

        assert!(matches!(
            result,
            Err(OrchestratorError::Timeout { stage: "build completion" })
        ));
    }
}
