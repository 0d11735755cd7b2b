use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time;

/// Per-provider token bucket (spec §4.3 "Rate limiting"). Requests are
/// admitted when a token is available; callers choose whether admission
/// blocks (`acquire`) or fails immediately (`try_acquire`).
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_per_sec: f64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
            capacity: capacity as f64,
            refill_per_sec,
        }
    }

    /// Waits until a token is available, then consumes it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut guard = self.state.lock().await;
                self.refill(&mut guard);
                if guard.tokens >= 1.0 {
                    guard.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - guard.tokens;
                    Some(Duration::from_secs_f64(deficit / self.refill_per_sec))
                }
            };
            match wait {
                None => return,
                Some(dur) => time::sleep(dur.max(Duration::from_millis(1))).await,
            }
        }
    }

    /// Consumes a token if one is immediately available; returns `false`
    /// without blocking otherwise.
    pub async fn try_acquire(&self) -> bool {
        let mut guard = self.state.lock().await;
        self.refill(&mut guard);
        if guard.tokens >= 1.0 {
            guard.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }
}
