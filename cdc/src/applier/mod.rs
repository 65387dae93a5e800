//! Transactional application of row mutations with bounded conflict retry.
//!
//! Every attempt runs in its own transaction. Statement failures classified as serialization
//! conflicts are retried after a backoff, every other failure ends the mutation immediately.
//! Failing to open or commit a transaction is terminal as well.

mod backoff;
mod retry;

use std::sync::Arc;

use tracing::{debug, warn};

pub use backoff::{Backoff, ExponentialBackoff, FixedBackoff};
pub use retry::{RetryPolicy, RetryState};

use crate::cdc_error;
use crate::error::{CdcError, CdcResult, ErrorKind};
use crate::mutation::RowMutation;
use crate::store::TargetStore;

/// Result of a successfully applied mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedMutation {
    pub rows_affected: u64,
    pub attempts: u32,
}

/// How a single attempt ended when it did not commit.
enum AttemptError {
    /// Begin or commit failed, the mutation is abandoned.
    Terminal(CdcError),
    /// The statement failed and the transaction was rolled back.
    Statement(CdcError),
}

/// Applies mutations to a [`TargetStore`].
#[derive(Clone)]
pub struct Applier {
    store: Arc<dyn TargetStore>,
    policy: RetryPolicy,
}

impl Applier {
    pub fn new(store: Arc<dyn TargetStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Applies `mutation` in a transaction, retrying serialization conflicts.
    ///
    /// Errors are [`ErrorKind::TransactionBeginFailed`], [`ErrorKind::CommitFailed`],
    /// [`ErrorKind::StatementFailed`] or [`ErrorKind::RetriesExhausted`], each carrying the store
    /// error as its source.
    pub async fn apply(&self, mutation: &RowMutation) -> CdcResult<AppliedMutation> {
        let mut state = RetryState::start();
        loop {
            state = match state {
                RetryState::Attempting { attempt } => match self.attempt(mutation).await {
                    Ok(rows_affected) => state.succeed(rows_affected),
                    Err(AttemptError::Terminal(error)) => return Err(error),
                    Err(AttemptError::Statement(error)) => {
                        debug!(
                            table = %mutation.table(),
                            attempt,
                            error = %error,
                            "mutation statement failed"
                        );
                        state.fail(error, &self.policy)
                    }
                },
                RetryState::Backoff {
                    attempt,
                    delay,
                    ref error,
                } => {
                    warn!(
                        table = %mutation.table(),
                        operation = mutation.operation(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying mutation after a transient conflict"
                    );
                    tokio::time::sleep(delay).await;
                    state.resume()
                }
                RetryState::Succeeded {
                    attempts,
                    rows_affected,
                } => {
                    return Ok(AppliedMutation {
                        rows_affected,
                        attempts,
                    });
                }
                RetryState::Failed {
                    attempts,
                    exhausted,
                    error,
                } => {
                    let error = if exhausted {
                        cdc_error!(
                            ErrorKind::RetriesExhausted,
                            "Statement retries exhausted",
                            format!("gave up after {attempts} attempts: {error}"),
                            source: error
                        )
                    } else {
                        cdc_error!(
                            ErrorKind::StatementFailed,
                            "Statement failed",
                            error.to_string(),
                            source: error
                        )
                    };
                    return Err(error);
                }
            };
        }
    }

    async fn attempt(&self, mutation: &RowMutation) -> Result<u64, AttemptError> {
        let mut transaction = self.store.begin().await.map_err(|error| {
            AttemptError::Terminal(cdc_error!(
                ErrorKind::TransactionBeginFailed,
                "Failed to begin a transaction",
                error.to_string(),
                source: error
            ))
        })?;

        match transaction.execute(mutation).await {
            Ok(rows_affected) => {
                transaction.commit().await.map_err(|error| {
                    AttemptError::Terminal(cdc_error!(
                        ErrorKind::CommitFailed,
                        "Failed to commit a transaction",
                        error.to_string(),
                        source: error
                    ))
                })?;

                Ok(rows_affected)
            }
            Err(error) => {
                if let Err(rollback_error) = transaction.rollback().await {
                    warn!(
                        table = %mutation.table(),
                        error = %rollback_error,
                        "failed to roll back after a statement failure"
                    );
                }

                Err(AttemptError::Statement(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::mutation::build_mutation;
    use crate::store::memory::{CallCounts, MemoryStore};
    use crate::types::{PrimaryKeyColumns, TableName};

    fn applier(store: &MemoryStore) -> Applier {
        Applier::new(
            Arc::new(store.clone()),
            RetryPolicy::new(3, Arc::new(FixedBackoff(Duration::ZERO))),
        )
    }

    fn upsert() -> RowMutation {
        let Some(after) = json!({"id": 1, "amount": 10}).as_object().cloned() else {
            panic!("object literal");
        };
        build_mutation(
            TableName::parse("orders").unwrap(),
            &PrimaryKeyColumns::parse("id").unwrap(),
            vec![json!(1)],
            Some(after),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn conflicts_are_retried_in_fresh_transactions() {
        let store = MemoryStore::new();
        store
            .fail_next_executes(2, ErrorKind::SerializationConflict)
            .await;

        let applied = applier(&store).apply(&upsert()).await.unwrap();

        assert_eq!(applied.attempts, 3);
        assert_eq!(applied.rows_affected, 1);
        assert_eq!(
            store.calls().await,
            CallCounts {
                begins: 3,
                executes: 3,
                commits: 1,
                rollbacks: 2,
            }
        );
        assert_eq!(store.rows("orders").await.len(), 1);
    }

    #[tokio::test]
    async fn conflicts_stop_after_three_attempts() {
        let store = MemoryStore::new();
        store
            .fail_next_executes(5, ErrorKind::SerializationConflict)
            .await;

        let err = applier(&store).apply(&upsert()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RetriesExhausted);
        assert_eq!(err.root_kind(), ErrorKind::SerializationConflict);
        assert_eq!(store.calls().await.executes, 3);
        assert!(store.rows("orders").await.is_empty());
    }

    #[tokio::test]
    async fn other_statement_failures_are_not_retried() {
        let store = MemoryStore::new();
        store
            .fail_next_executes(1, ErrorKind::ConstraintViolation)
            .await;

        let err = applier(&store).apply(&upsert()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StatementFailed);
        assert_eq!(err.root_kind(), ErrorKind::ConstraintViolation);
        assert_eq!(store.calls().await.executes, 1);
    }

    #[tokio::test]
    async fn begin_and_commit_failures_are_terminal() {
        let store = MemoryStore::new();

        store.fail_next_begin(ErrorKind::ConnectionFailed).await;
        let err = applier(&store).apply(&upsert()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransactionBeginFailed);

        store.fail_next_commit(ErrorKind::SerializationConflict).await;
        let err = applier(&store).apply(&upsert()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommitFailed);

        let calls = store.calls().await;
        assert_eq!(calls.begins, 2);
        assert_eq!(calls.executes, 1);
        assert!(store.rows("orders").await.is_empty());
    }

    #[tokio::test]
    async fn rollback_failures_do_not_mask_the_statement_error() {
        let store = MemoryStore::new();
        store.fail_next_executes(1, ErrorKind::ConversionError).await;
        store.fail_next_rollback(ErrorKind::ConnectionFailed).await;

        let err = applier(&store).apply(&upsert()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StatementFailed);
        assert_eq!(err.root_kind(), ErrorKind::ConversionError);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_sleeps_only_between_attempts() {
        let store = MemoryStore::new();
        store
            .fail_next_executes(3, ErrorKind::SerializationConflict)
            .await;
        let applier = Applier::new(
            Arc::new(store.clone()),
            RetryPolicy::new(3, Arc::new(FixedBackoff(Duration::from_millis(100)))),
        );

        let started = tokio::time::Instant::now();
        let err = applier.apply(&upsert()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RetriesExhausted);
        let elapsed = started.elapsed();
        assert!(
            elapsed >= Duration::from_millis(200) && elapsed < Duration::from_millis(300),
            "waited {elapsed:?}"
        );
    }
}
