//! Reconnect timer for the persistent socket

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Fixed or exponential retry delay. Each firing allows exactly one
/// reconnect attempt.
#[derive(Debug, Clone)]
pub struct ReconnectScheduler {
    base: Duration,
    max: Duration,
    multiplier: u32,
    current: Duration,
    attempts: u32,
}

impl ReconnectScheduler {
    /// Same delay before every attempt
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base: delay,
            max: delay,
            multiplier: 1,
            current: delay,
            attempts: 0,
        }
    }

    /// Delay doubles after every attempt, capped at `max`
    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            multiplier: 2,
            current: base,
            attempts: 0,
        }
    }

    /// Delay for the next attempt; advances the backoff
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.attempts = self.attempts.saturating_add(1);
        self.current = std::cmp::min(self.current.saturating_mul(self.multiplier), self.max);
        delay
    }

    /// Back to the base delay, after a successful connect
    pub fn reset(&mut self) {
        self.current = self.base;
        self.attempts = 0;
    }

    /// Attempts scheduled since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Wait out the next delay. Returns false if cancelled first.
    pub async fn wait(&mut self, cancel: &CancellationToken) -> bool {
        let delay = self.next_delay();
        debug!(
            "[SOCKET] Reconnect #{} scheduled in {}ms",
            self.attempts,
            delay.as_millis()
        );

        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay() {
        let mut scheduler = ReconnectScheduler::fixed(Duration::from_secs(5));
        for _ in 0..4 {
            assert_eq!(scheduler.next_delay(), Duration::from_secs(5));
        }
        assert_eq!(scheduler.attempts(), 4);
    }

    #[test]
    fn test_exponential_backoff_caps_and_resets() {
        let mut scheduler =
            ReconnectScheduler::exponential(Duration::from_secs(1), Duration::from_secs(5));
        let delays: Vec<u64> = (0..5).map(|_| scheduler.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);

        scheduler.reset();
        assert_eq!(scheduler.attempts(), 0);
        assert_eq!(scheduler.next_delay(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_wait_cancelled() {
        let mut scheduler = ReconnectScheduler::fixed(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!scheduler.wait(&cancel).await);
    }

    #[tokio::test]
    async fn test_wait_fires() {
        let mut scheduler = ReconnectScheduler::fixed(Duration::from_millis(5));
        assert!(scheduler.wait(&CancellationToken::new()).await);
        assert_eq!(scheduler.attempts(), 1);
    }
}
