use std::time::Duration;

use rand::Rng;

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, capped
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return base.min(max);
    }
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
    base.saturating_mul(factor).min(max)
}

/// Consecutive failure counter of one polling loop
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max, failures: 0 }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Count a failure and return how long to wait, with up to 10% jitter
    pub fn next_delay(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let delay = backoff_delay(self.failures, self.base, self.max);

        let spread = delay.as_millis() as u64 / 10;
        let jitter = if spread > 0 { rand::thread_rng().gen_range(0..=spread) } else { 0 };
        (delay + Duration::from_millis(jitter)).min(self.max)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }
}
