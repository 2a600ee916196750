//! Poll-with-timeout combinator.
//!
//! `poll_until` probes, sleeps for the interval, and stops at whichever comes
//! first: the probe reporting completion, the deadline, or cancellation.
//! Stopping never touches the remote job.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How a poll loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The probe produced a value.
    Completed(T),
    /// The deadline elapsed first.
    TimedOut,
    /// The cancellation token fired first.
    Cancelled,
}

/// Probe every `interval` until it returns `Some`, `timeout` elapses, or
/// `cancel` fires.
///
/// The first probe runs immediately. A probe in flight when the deadline
/// passes is allowed to finish, and its result counts.
pub async fn poll_until<T, F, Fut>(
    interval: Duration,
    timeout: Duration,
    cancel: Option<&CancellationToken>,
    mut probe: F,
) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    // A timeout past the end of the clock means no deadline.
    let deadline = Instant::now().checked_add(timeout);

    loop {
        let value = match with_cancellation(cancel, probe()).await {
            Some(value) => value,
            None => return PollOutcome::Cancelled,
        };
        if let Some(done) = value {
            return PollOutcome::Completed(done);
        }

        let now = Instant::now();
        if deadline.is_some_and(|d| now >= d) {
            return PollOutcome::TimedOut;
        }
        let wake = match (now.checked_add(interval), deadline) {
            (Some(next), Some(d)) => next.min(d),
            (Some(next), None) => next,
            (None, Some(d)) => d,
            (None, None) => {
                with_cancellation(cancel, std::future::pending::<()>()).await;
                return PollOutcome::Cancelled;
            }
        };
        if with_cancellation(cancel, tokio::time::sleep_until(wake)).await.is_none() {
            return PollOutcome::Cancelled;
        }
        if deadline.is_some_and(|d| wake == d && Instant::now() >= d) {
            return PollOutcome::TimedOut;
        }
    }
}

/// Run `fut` unless `cancel` fires first. `None` means cancelled.
pub async fn with_cancellation<T>(
    cancel: Option<&CancellationToken>,
    fut: impl Future<Output = T>,
) -> Option<T> {
    match cancel {
        None => Some(fut.await),
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => None,
                value = fut => Some(value),
            }
        }
    }
}
