use std::time::Duration;

use serde::Deserialize;

use crate::shared::ValidationError;

/// Retry settings of the transactional applier.
///
/// The delay before retry `n` (zero based) is `base_backoff_ms * 2^n` plus a uniformly drawn
/// jitter in `1..=max_jitter_ms` milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ApplierConfig {
    /// Total attempts per event, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    100
}

fn default_max_jitter_ms() -> u64 {
    99
}

impl Default for ApplierConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_jitter_ms: default_max_jitter_ms(),
        }
    }
}

impl ApplierConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::Zero("applier.max_attempts"));
        }

        Ok(())
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }
}
