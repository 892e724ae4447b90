//! Minimum-interval pacing for registrar calls.
//!
//! Every provider owns one [`RateLimiter`]. The limiter remembers when the
//! last call was let through and makes the next caller wait until the
//! provider's interval has elapsed. Time comes from `tokio::time`, so tests
//! can run the whole verifier on a paused clock.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Spacing is measured from the start of one call to the start of the next,
/// so a slow response does not add to the wait.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// How long a call issued right now would have to wait.
    pub async fn required_wait(&self) -> Duration {
        match *self.last_call.lock().await {
            Some(last) => (last + self.interval).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    /// Wait for the interval to elapse, then claim the slot for a call.
    ///
    /// Callers are served one at a time. Returns `false` without claiming
    /// when `token` is already cancelled or fires while waiting.
    pub async fn acquire(&self, token: &CancellationToken) -> bool {
        let mut last_call = self.last_call.lock().await;
        if token.is_cancelled() {
            return false;
        }

        if let Some(last) = *last_call {
            let ready_at = last + self.interval;
            if ready_at > Instant::now() {
                tokio::select! {
                    _ = token.cancelled() => return false,
                    _ = sleep_until(ready_at) => {}
                }
            }
        }

        *last_call = Some(Instant::now());
        true
    }

    /// Wait until a call would be allowed, without claiming it.
    ///
    /// Returns `false` when cancelled first.
    pub async fn until_ready(&self, token: &CancellationToken) -> bool {
        let wait = self.required_wait().await;
        if wait.is_zero() {
            return !token.is_cancelled();
        }
        tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(wait) => true,
        }
    }
}
