//! Shared token-bucket rate limiter gating every outbound request.
//!
//! The remote API enforces a global request budget per account. A single
//! bucket is shared by all concurrent workers through the client, so fan-out
//! orchestrations self-throttle instead of tripping HTTP 429 storms.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Async token bucket. `acquire` suspends until a token is available.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_per_sec: f64,
}

impl RateLimiter {
    /// Create a bucket refilling at `refill_per_sec` tokens/second with the
    /// given burst capacity. The bucket starts full.
    pub fn new(refill_per_sec: f64, capacity: f64) -> Self {
        let refill_per_sec = refill_per_sec.max(f64::MIN_POSITIVE);
        let capacity = capacity.max(1.0);
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_per_sec,
        }
    }

    /// A bucket that never blocks, for tests and offline tooling.
    pub fn unlimited() -> Self {
        Self::new(f64::MAX / 4.0, f64::MAX / 4.0)
    }

    /// Take one token, sleeping until the refill makes one available.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
                state.last_refill = now;
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_sec)
            };
            tokio::time::sleep(wait).await;
        }
    }
}
