use std::time::Duration;

/// Exponential backoff policy (spec §7): base 500ms, factor 2, jitter
/// ±20%, cap 8s, default 3 attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub factor: u32,
    pub jitter: f64,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            factor: 2,
            jitter: 0.2,
            cap: Duration::from_secs(8),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// Backoff duration before attempt `attempt` (0-indexed: the delay
    /// before the *second* call, since the first attempt never waits).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.factor.saturating_pow(attempt);
        let nominal = self.base.saturating_mul(exp).min(self.cap);
        let jitter_span = nominal.as_secs_f64() * self.jitter;
        let offset = (fastrand::f64() * 2.0 - 1.0) * jitter_span;
        let jittered = (nominal.as_secs_f64() + offset).max(0.0);
        Duration::from_secs_f64(jittered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_respects_cap() {
        let policy = RetryPolicy::default();
        let d0 = policy.delay_for(0);
        let d3 = policy.delay_for(3);
        assert!(d0 < Duration::from_secs(1));
        assert!(d3 <= policy.cap + Duration::from_millis(1));
    }

    #[test]
    fn jitter_stays_within_twenty_percent() {
        let policy = RetryPolicy::default();
        for attempt in 0..5 {
            let nominal = policy
                .base
                .saturating_mul(policy.factor.saturating_pow(attempt))
                .min(policy.cap)
                .as_secs_f64();
            let observed = policy.delay_for(attempt).as_secs_f64();
            assert!(observed >= (nominal * 0.8) - 0.001);
            assert!(observed <= (nominal * 1.2) + 0.001);
        }
    }
}
