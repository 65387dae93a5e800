use std::sync::Arc;
use std::time::Duration;

use cdc_config::shared::ApplierConfig;

use crate::applier::backoff::{Backoff, ExponentialBackoff};
use crate::error::CdcError;

/// Bound and pacing of statement retries.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub backoff: Arc<dyn Backoff>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Arc<dyn Backoff>) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    pub fn from_config(config: &ApplierConfig) -> Self {
        Self::new(
            config.max_attempts,
            Arc::new(ExponentialBackoff::from_config(config)),
        )
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

/// Progress of applying one mutation.
///
/// ```text
/// Attempting{n} --ok--------------------------> Succeeded{n+1}
/// Attempting{n} --retryable, n+1 < max------> Backoff{n} --resume--> Attempting{n+1}
/// Attempting{n} --retryable, n+1 == max-----> Failed{exhausted: true}
/// Attempting{n} --terminal------------------> Failed{exhausted: false}
/// ```
#[derive(Debug)]
pub enum RetryState {
    Attempting {
        attempt: u32,
    },
    Backoff {
        attempt: u32,
        delay: Duration,
        error: CdcError,
    },
    Succeeded {
        attempts: u32,
        rows_affected: u64,
    },
    Failed {
        attempts: u32,
        exhausted: bool,
        error: CdcError,
    },
}

impl RetryState {
    pub fn start() -> RetryState {
        RetryState::Attempting { attempt: 0 }
    }

    /// Records a successful attempt. Only meaningful while attempting.
    pub fn succeed(self, rows_affected: u64) -> RetryState {
        match self {
            RetryState::Attempting { attempt } => RetryState::Succeeded {
                attempts: attempt + 1,
                rows_affected,
            },
            other => other,
        }
    }

    /// Records a failed attempt, choosing between another attempt and giving up.
    pub fn fail(self, error: CdcError, policy: &RetryPolicy) -> RetryState {
        let RetryState::Attempting { attempt } = self else {
            return self;
        };

        let attempts = attempt + 1;
        if !error.kind().is_retryable() {
            return RetryState::Failed {
                attempts,
                exhausted: false,
                error,
            };
        }
        if attempts >= policy.max_attempts {
            return RetryState::Failed {
                attempts,
                exhausted: true,
                error,
            };
        }

        RetryState::Backoff {
            attempt,
            delay: policy.backoff.delay(attempt),
            error,
        }
    }

    /// Leaves the backoff state for the next attempt.
    pub fn resume(self) -> RetryState {
        match self {
            RetryState::Backoff { attempt, .. } => RetryState::Attempting {
                attempt: attempt + 1,
            },
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RetryState::Succeeded { .. } | RetryState::Failed { .. }
        )
    }
}
