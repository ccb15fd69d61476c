//! Bounded, cancellable polling.
//!
//! Every wait in the pipeline (server readiness, build-number discovery,
//! build completion) goes through [`poll_until`]: a fixed inter-attempt
//! interval, an optional deadline that converts "wait forever" into a
//! typed timeout, and a cancellation signal checked between attempts.
//!
//! All polled operations are idempotent re-checks, so cancelling between
//! attempts never leaves partial state behind.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// How a poll loop paces itself and when it gives up.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Delay between attempts.
    pub interval: Duration,
    /// Total time budget. `None` polls until ready or cancelled.
    pub deadline: Option<Duration>,
}

impl PollPolicy {
    /// A policy with the given interval and deadline.
    pub fn bounded(interval: Duration, deadline: Duration) -> Self {
        Self {
            interval,
            deadline: Some(deadline),
        }
    }

    /// A policy with the given interval and no deadline.
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }
}

/// Terminal state of a poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The predicate produced a value.
    Ready(T),
    /// The deadline elapsed before the predicate produced a value.
    TimedOut,
    /// The cancel signal fired between attempts.
    Cancelled,
}

/// Sending half of a cancellation channel.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signal every listening poll loop to stop after its current attempt.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiving half of a cancellation channel. Cheap to clone.
#[derive(Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Whether cancellation has already been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when cancellation is requested. If the handle is dropped
    /// without cancelling, this never resolves.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
        std::future::pending::<()>().await;
    }

    /// A signal that can never fire, for callers without a cancel source.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }
}

/// Create a connected cancel handle/signal pair.
pub fn cancel_channel() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

/// Repeatedly evaluate `check` until it yields a value, the deadline passes,
/// or the run is cancelled.
///
/// The first attempt runs immediately; subsequent attempts are separated by
/// `policy.interval`. The deadline is checked before sleeping, so a poll
/// never sleeps past its budget just to fail on wakeup.
pub async fn poll_until<T, F, Fut>(
    policy: PollPolicy,
    cancel: &CancelSignal,
    mut check: F,
) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let started = Instant::now();
    loop {
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled;
        }

        if let Some(value) = check().await {
            return PollOutcome::Ready(value);
        }

        if let Some(deadline) = policy.deadline {
            if started.elapsed() + policy.interval >= deadline {
                return PollOutcome::TimedOut;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(policy.interval) => {}
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_ready_on_first_attempt() {
        let cancel = CancelSignal::never();
        let policy = PollPolicy::unbounded(Duration::from_millis(1));

        let outcome = poll_until(policy, &cancel, || async { Some(7) }).await;
        assert_eq!(outcome, PollOutcome::Ready(7));
    }

    #[tokio::test]
    async fn test_ready_after_retries() {
        let cancel = CancelSignal::never();
        let policy = PollPolicy::unbounded(Duration::from_millis(1));
        let attempts = AtomicU32::new(0);

        let outcome = poll_until(policy, &cancel, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move { if n >= 2 { Some("up") } else { None } }
        })
        .await;

        assert_eq!(outcome, PollOutcome::Ready("up"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_deadline_times_out() {
        let cancel = CancelSignal::never();
        let policy = PollPolicy::bounded(Duration::from_millis(5), Duration::from_millis(12));
        let attempts = AtomicU32::new(0);

        let outcome: PollOutcome<()> = poll_until(policy, &cancel, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { None }
        })
        .await;

        assert_eq!(outcome, PollOutcome::TimedOut);
        // 12ms budget at 5ms per attempt: the third sleep would overrun.
        assert!(attempts.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let (handle, signal) = cancel_channel();
        handle.cancel();

        let outcome: PollOutcome<()> = poll_until(
            PollPolicy::unbounded(Duration::from_millis(1)),
            &signal,
            || async { None },
        )
        .await;

        assert_eq!(outcome, PollOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_between_attempts() {
        let (handle, signal) = cancel_channel();
        let policy = PollPolicy::unbounded(Duration::from_secs(60));

        let poller = tokio::spawn(async move {
            poll_until::<(), _, _>(policy, &signal, || async { None }).await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();

        assert_eq!(poller.await.unwrap(), PollOutcome::Cancelled);
    }
}
