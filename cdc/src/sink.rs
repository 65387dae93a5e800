//! Applies webhook batches and records their statistics.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::applier::Applier;
use crate::error::CdcResult;
use crate::mutation::build_mutation;
use crate::stats::StatsStore;
use crate::types::{ChangeEvent, PrimaryKeyColumns, TableName};

/// Events of one webhook request.
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    pub primary_key: PrimaryKeyColumns,
    pub events: Vec<ChangeEvent>,
    /// Size of the whole request body.
    pub payload_bytes: u64,
    /// Unix second the request was received.
    pub received_at_secs: i64,
}

/// Summary of a fully applied batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub applied: usize,
    /// Events dropped because their key did not match the primary-key columns.
    pub skipped: usize,
    /// Distinct tables named by the batch, sorted.
    pub tables: Vec<String>,
}

/// Drives batches through the applier and into the statistics.
#[derive(Clone)]
pub struct ChangeSink {
    applier: Applier,
    stats: Arc<StatsStore>,
}

impl ChangeSink {
    pub fn new(applier: Applier, stats: Arc<StatsStore>) -> Self {
        Self { applier, stats }
    }

    pub fn stats(&self) -> &Arc<StatsStore> {
        &self.stats
    }

    /// Applies the events of `batch` in order, each in its own transaction.
    ///
    /// Events whose key length differs from the primary-key column count are skipped. The
    /// first failing event aborts the batch, leaving earlier events committed. Statistics are
    /// only recorded once every event went through.
    pub async fn process(&self, batch: ChangeBatch) -> CdcResult<BatchOutcome> {
        let ChangeBatch {
            primary_key,
            events,
            payload_bytes,
            received_at_secs,
        } = batch;

        let mut tables = BTreeSet::new();
        let mut outcome = BatchOutcome::default();
        for (index, event) in events.into_iter().enumerate() {
            tables.insert(event.source.clone());

            if event.key.len() != primary_key.len() {
                warn!(
                    table = %event.source,
                    index,
                    expected = primary_key.len(),
                    actual = event.key.len(),
                    "skipping event whose key does not match the primary-key columns"
                );
                outcome.skipped += 1;
                continue;
            }

            let table = TableName::parse(&event.source)?;
            let mutation = build_mutation(table, &primary_key, event.key, event.after)?;
            if let Err(err) = self.applier.apply(&mutation).await {
                error!(
                    table = %mutation.table(),
                    operation = mutation.operation(),
                    index,
                    error = %err,
                    "aborting batch"
                );
                return Err(err);
            }
            outcome.applied += 1;
        }

        for table in &tables {
            self.stats.record(table, received_at_secs, payload_bytes);
        }
        outcome.tables = tables.into_iter().collect();

        debug!(
            applied = outcome.applied,
            skipped = outcome.skipped,
            tables = outcome.tables.len(),
            "batch applied"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cdc_config::shared::StatsConfig;
    use serde_json::{Value, json};

    use super::*;
    use crate::applier::{FixedBackoff, RetryPolicy};
    use crate::error::ErrorKind;
    use crate::store::memory::MemoryStore;

    const T: i64 = 1_700_000_000;

    fn sink(store: &MemoryStore) -> ChangeSink {
        let applier = Applier::new(
            Arc::new(store.clone()),
            RetryPolicy::new(3, Arc::new(FixedBackoff(Duration::ZERO))),
        );
        ChangeSink::new(applier, Arc::new(StatsStore::new(StatsConfig::default())))
    }

    fn event(topic: &str, key: Value, after: Value) -> ChangeEvent {
        serde_json::from_value(json!({"topic": topic, "key": key, "after": after})).unwrap()
    }

    fn batch(primary_key: &str, events: Vec<ChangeEvent>) -> ChangeBatch {
        ChangeBatch {
            primary_key: PrimaryKeyColumns::parse(primary_key).unwrap(),
            events,
            payload_bytes: 200,
            received_at_secs: T,
        }
    }

    #[tokio::test]
    async fn replayed_upserts_leave_a_single_row() {
        let store = MemoryStore::new();
        let sink = sink(&store);
        let events = vec![
            event("orders", json!([1]), json!({"id": 1, "amount": 5})),
            event("orders", json!([1]), json!({"id": 1, "amount": 7})),
        ];

        for _ in 0..3 {
            let outcome = sink.process(batch("id", events.clone())).await.unwrap();
            assert_eq!(outcome.applied, 2);
        }

        assert_eq!(
            store.rows("orders").await,
            vec![json!({"id": 1, "amount": 7}).as_object().unwrap().clone()]
        );
    }

    #[tokio::test]
    async fn deleting_a_missing_row_succeeds() {
        let store = MemoryStore::new();

        let outcome = sink(&store)
            .process(batch("id", vec![event("orders", json!([42]), json!(null))]))
            .await
            .unwrap();

        assert_eq!(outcome.applied, 1);
        assert!(store.rows("orders").await.is_empty());
    }

    #[tokio::test]
    async fn mismatched_keys_are_skipped_without_touching_the_store() {
        let store = MemoryStore::new();
        let sink = sink(&store);

        let outcome = sink
            .process(batch(
                "region,id",
                vec![
                    event("orders", json!([1]), json!({"id": 1})),
                    event("items", json!(["eu", 1, 2]), json!(null)),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            BatchOutcome {
                applied: 0,
                skipped: 2,
                tables: vec!["items".to_string(), "orders".to_string()],
            }
        );
        assert_eq!(store.calls().await.begins, 0);
        assert!(store.rows("orders").await.is_empty());
        assert_eq!(sink.stats().table_count(), 2);
    }

    #[tokio::test]
    async fn events_are_applied_in_order() {
        let store = MemoryStore::new();

        sink(&store)
            .process(batch(
                "id",
                vec![
                    event("orders", json!([1]), json!({"id": 1, "amount": 1})),
                    event("orders", json!([1]), json!(null)),
                    event("orders", json!([2]), json!({"id": 2, "amount": 2})),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(
            store.rows("orders").await,
            vec![json!({"id": 2, "amount": 2}).as_object().unwrap().clone()]
        );
    }

    #[tokio::test]
    async fn failed_batches_stop_and_record_no_stats() {
        let store = MemoryStore::new();
        let sink = sink(&store);
        store
            .fail_next_executes(3, ErrorKind::SerializationConflict)
            .await;

        let err = sink
            .process(batch(
                "id",
                vec![
                    event("orders", json!([1]), json!({"id": 1})),
                    event("orders", json!([2]), json!({"id": 2})),
                ],
            ))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RetriesExhausted);
        assert_eq!(store.calls().await.executes, 3);
        assert!(store.rows("orders").await.is_empty());
        assert_eq!(sink.stats().table_count(), 0);
    }

    #[tokio::test]
    async fn stats_are_recorded_once_per_table() {
        let store = MemoryStore::new();
        let sink = sink(&store);

        sink.process(batch(
            "id",
            vec![
                event("orders", json!([1]), json!({"id": 1})),
                event("orders", json!([2]), json!({"id": 2})),
                event("customers", json!([1]), json!({"id": 1})),
            ],
        ))
        .await
        .unwrap();

        let rows = sink.stats().snapshot(T);
        assert_eq!(rows.len(), 2);
        for row in rows {
            let minute = row.window(60).unwrap();
            assert!((minute.rate - 1.0 / 60.0).abs() < 1e-9, "{row:?}");
            assert_eq!(minute.avg_bytes, 200.0);
        }
    }

    #[tokio::test]
    async fn resolved_only_batches_are_empty_successes() {
        let store = MemoryStore::new();
        let sink = sink(&store);

        let outcome = sink.process(batch("id", vec![])).await.unwrap();

        assert_eq!(outcome, BatchOutcome::default());
        assert_eq!(sink.stats().table_count(), 0);
    }
}
