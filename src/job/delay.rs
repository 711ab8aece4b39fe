//! Inter-request delay policy
//!
//! Produces the cancellable sleep each worker runs after its request, either
//! a fixed duration or a uniform sample from a configured range.

use crate::config::Delay;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Cancellable inter-request sleep
#[derive(Debug, Clone, Copy)]
pub struct DelayPolicy {
    delay: Delay,
}

impl DelayPolicy {
    pub fn new(delay: Delay) -> Self {
        Self { delay }
    }

    /// Picks the next sleep duration
    ///
    /// Range delays sample uniformly from `[min, max]` seconds.
    pub fn next_duration(&self) -> Duration {
        if !self.delay.has_delay {
            return Duration::ZERO;
        }
        let seconds = if self.delay.is_range {
            rand::thread_rng().gen_range(self.delay.min..=self.delay.max)
        } else {
            self.delay.min
        };
        Duration::from_secs_f64(seconds)
    }

    /// Sleeps for the configured delay, aborting early on cancellation
    pub async fn sleep(&self, cancel: &CancellationToken) {
        if !self.delay.has_delay {
            return;
        }
        let duration = self.next_duration();
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_no_delay_is_zero() {
        let policy = DelayPolicy::new(Delay::default());
        assert_eq!(policy.next_duration(), Duration::ZERO);
    }

    #[test]
    fn test_fixed_delay() {
        let policy = DelayPolicy::new(Delay {
            has_delay: true,
            is_range: false,
            min: 0.25,
            max: 0.25,
        });
        assert_eq!(policy.next_duration(), Duration::from_millis(250));
    }

    #[test]
    fn test_range_delay_stays_in_bounds() {
        let policy = DelayPolicy::new(Delay {
            has_delay: true,
            is_range: true,
            min: 0.1,
            max: 0.3,
        });
        for _ in 0..100 {
            let duration = policy.next_duration();
            assert!(duration >= Duration::from_millis(100));
            assert!(duration <= Duration::from_millis(300));
        }
    }

    #[tokio::test]
    async fn test_sleep_without_delay_returns_immediately() {
        let policy = DelayPolicy::new(Delay::default());
        let cancel = CancellationToken::new();

        let start = Instant::now();
        policy.sleep(&cancel).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_sleep_aborts_on_cancellation() {
        let policy = DelayPolicy::new(Delay {
            has_delay: true,
            is_range: false,
            min: 10.0,
            max: 10.0,
        });
        let cancel = CancellationToken::new();
        cancel.cancel();

        let start = Instant::now();
        policy.sleep(&cancel).await;
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
