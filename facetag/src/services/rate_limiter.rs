//! Call throttle for quota-constrained APIs
//!
//! Token bucket of size one: a call may start once `min_interval` has passed
//! since the previous call started. The bucket starts full, so the first
//! call goes through immediately. Waiting holds the lock, which serializes
//! every caller sharing the throttle.
//!
//! Uses `tokio::time`, so tests can drive it with a paused virtual clock.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Face API free tier: 20 requests per minute
pub const FACE_API_INTERVAL: Duration = Duration::from_secs(6);

/// Process-wide minimum spacing between external calls
#[derive(Debug)]
pub struct Throttle {
    last_call: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_call: Mutex::new(None),
            min_interval,
        }
    }

    /// Throttle tuned to the face API quota
    pub fn face_api() -> Self {
        Self::new(FACE_API_INTERVAL)
    }

    /// Throttle that never waits
    pub fn unthrottled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next call is allowed, then claim the slot
    ///
    /// Returns how long the caller waited.
    pub async fn acquire(&self) -> Duration {
        let mut last = self.last_call.lock().await;
        let mut waited = Duration::ZERO;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                waited = self.min_interval - elapsed;
                tracing::debug!(wait_ms = waited.as_millis() as u64, "Throttling: waiting before call");
                tokio::time::sleep(waited).await;
            }
        }

        *last = Some(Instant::now());
        waited
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::face_api()
    }
}
