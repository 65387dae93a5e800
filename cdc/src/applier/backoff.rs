use std::time::Duration;

use cdc_config::shared::ApplierConfig;
use rand::Rng;

/// Decides how long to wait before retrying after a failed attempt.
pub trait Backoff: Send + Sync {
    /// Delay after the zero based `attempt` failed.
    fn delay(&self, attempt: u32) -> Duration;
}

/// `base * 2^attempt` plus a uniformly drawn jitter of `1..=max_jitter_ms` milliseconds.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max_jitter_ms: u64,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max_jitter_ms: u64) -> Self {
        Self {
            base,
            max_jitter_ms,
        }
    }

    pub fn from_config(config: &ApplierConfig) -> Self {
        Self::new(config.base_backoff(), config.max_jitter_ms)
    }
}

impl Backoff for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let exponential = self.base.saturating_mul(factor);
        let jitter_ms = if self.max_jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(1..=self.max_jitter_ms)
        };

        exponential.saturating_add(Duration::from_millis(jitter_ms))
    }
}

/// Always waits the same amount of time.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedBackoff(pub Duration);

impl Backoff for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}
