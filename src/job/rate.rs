//! Request rate measurement and throttling
//!
//! Keeps a sliding window of recent request completions and per-request
//! durations. Workers call `throttle` after each request, which parks them
//! while the observed rate is above the configured cap; the progress monitor
//! calls `adjust` periodically to re-center the window.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Width of the sliding window the observed rate is computed over
const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Number of per-request duration samples kept for averaging
const DURATION_SAMPLES: usize = 100;

#[derive(Debug, Default)]
struct ThrottleState {
    completions: VecDeque<Instant>,
    durations: VecDeque<Duration>,
}

impl ThrottleState {
    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.completions.front() {
            if now.duration_since(oldest) > RATE_WINDOW {
                self.completions.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Sliding-window rate throttle shared by all workers
#[derive(Debug)]
pub struct RateThrottle {
    /// Requests per second; 0 disables throttling
    rate_limit: u64,
    state: Mutex<ThrottleState>,
}

impl RateThrottle {
    pub fn new(rate_limit: u64) -> Self {
        Self {
            rate_limit,
            state: Mutex::new(ThrottleState::default()),
        }
    }

    /// Records one completed request
    ///
    /// # Arguments
    ///
    /// * `start` - When the worker began the request
    /// * `end` - When the worker finished it
    pub fn tick(&self, start: Instant, end: Instant) {
        let mut state = self.state.lock().expect("rate lock poisoned");
        state.completions.push_back(end);
        state.durations.push_back(end.duration_since(start));
        if state.durations.len() > DURATION_SAMPLES {
            state.durations.pop_front();
        }
        state.prune(Instant::now());
    }

    /// The observed rate over the sliding window, in requests per second
    pub fn current_rate(&self) -> f64 {
        let mut state = self.state.lock().expect("rate lock poisoned");
        state.prune(Instant::now());
        state.completions.len() as f64 / RATE_WINDOW.as_secs_f64()
    }

    /// Average duration of recent requests
    pub fn average_duration(&self) -> Duration {
        let state = self.state.lock().expect("rate lock poisoned");
        if state.durations.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = state.durations.iter().sum();
        total / state.durations.len() as u32
    }

    /// Parks the calling worker while the observed rate is above the cap
    ///
    /// Sleeps in steps of one request interval so released workers re-check
    /// against fresh measurements. Returns immediately when no cap is set,
    /// and aborts on cancellation.
    pub async fn throttle(&self, cancel: &CancellationToken) {
        if self.rate_limit == 0 {
            return;
        }
        let interval = Duration::from_secs_f64(1.0 / self.rate_limit as f64);
        while self.current_rate() >= self.rate_limit as f64 {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Re-centers the window; called periodically by the progress monitor
    pub fn adjust(&self) {
        let mut state = self.state.lock().expect("rate lock poisoned");
        state.prune(Instant::now());
    }
}
