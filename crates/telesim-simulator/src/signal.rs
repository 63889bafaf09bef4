//! Fleet-wide stop signal.
//!
//! Set at most once, by the supervisor on an external interrupt or by a device
//! whose connection was rejected. Never cleared.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Set-once cancellation shared by the supervisor and every device
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
    raised: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal. Returns true only for the call that actually set it.
    pub fn trigger(&self) -> bool {
        if self.raised.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_set(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal is raised
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Waits up to `timeout`, returning early as soon as the signal is raised.
    ///
    /// Returns true when the wait was interrupted by the signal.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => true,
            _ = tokio::time::sleep(timeout) => self.is_set(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_trigger_is_idempotent() {
        let signal = StopSignal::new();
        assert!(!signal.is_set());

        assert!(signal.trigger());
        assert!(signal.is_set());

        assert!(!signal.trigger());
        assert!(!signal.clone().trigger());
        assert!(signal.is_set());
    }

    #[test]
    fn test_clones_share_state() {
        let signal = StopSignal::new();
        let observer = signal.clone();
        signal.trigger();
        assert!(observer.is_set());
    }

    #[tokio::test]
    async fn test_wait_times_out_when_not_raised() {
        let signal = StopSignal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_wait_returns_early_when_raised() {
        let signal = StopSignal::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.trigger();
        });

        let start = Instant::now();
        assert!(signal.wait_timeout(Duration::from_secs(30)).await);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_wait_on_raised_signal_is_immediate() {
        let signal = StopSignal::new();
        signal.trigger();
        assert!(signal.wait_timeout(Duration::from_secs(30)).await);
        signal.cancelled().await;
    }
}
