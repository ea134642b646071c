//! Operator stop control for a running session.
//!
//! [`SessionControl`] is shared through an [`Arc`](std::sync::Arc) between
//! the tick loop and whatever requests the stop (a signal handler, a test).
//! Requesting a stop wakes the tick loop immediately instead of letting it
//! finish its current sleep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

/// Shared stop flag with a wake-up notification.
#[derive(Debug, Default)]
pub struct SessionControl {
    stop_requested: AtomicBool,
    stop_notify: Notify,
}

impl SessionControl {
    /// A control with no stop requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a graceful stop and wake the tick loop.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        // `notify_one` stores a permit, so a loop that is not yet waiting
        // still wakes on its next sleep.
        self.stop_notify.notify_one();
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Sleep for `period`, returning early if a stop is requested.
    ///
    /// Returns `true` when woken by a stop request.
    pub async fn sleep_or_stop(&self, period: Duration) -> bool {
        if self.is_stop_requested() {
            return true;
        }
        tokio::select! {
            () = tokio::time::sleep(period) => self.is_stop_requested(),
            () = self.stop_notify.notified() => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn initial_state_is_running() {
        let control = SessionControl::new();
        assert!(!control.is_stop_requested());
    }

    #[test]
    fn stop_request() {
        let control = SessionControl::new();
        control.request_stop();
        assert!(control.is_stop_requested());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_runs_to_completion_without_stop() {
        let control = SessionControl::new();
        assert!(!control.sleep_or_stop(Duration::from_secs(5)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_sleep() {
        let control = Arc::new(SessionControl::new());
        let waiter = {
            let control = Arc::clone(&control);
            tokio::spawn(async move { control.sleep_or_stop(Duration::from_secs(3600)).await })
        };
        tokio::task::yield_now().await;
        control.request_stop();
        assert!(waiter.await.unwrap_or(false));
    }
}
