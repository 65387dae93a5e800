use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::cdc_error;
use crate::error::{CdcResult, ErrorKind};
use crate::mutation::RowMutation;
use crate::store::{StoreTransaction, TargetStore};

/// Rows of one table keyed by the JSON rendering of their primary key.
type Table = BTreeMap<String, Map<String, Value>>;

/// Number of calls observed by a [`MemoryStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub begins: usize,
    pub executes: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

#[derive(Debug, Default)]
struct Faults {
    begin: Option<ErrorKind>,
    executes: Vec<ErrorKind>,
    commit: Option<ErrorKind>,
    rollback: Option<ErrorKind>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: BTreeMap<String, Table>,
    faults: Faults,
    calls: CallCounts,
}

/// In-memory transactional store for tests and local development.
///
/// Writes are staged per transaction and only become visible once the transaction commits.
/// Failures can be injected for the next begin, execute, commit or rollback calls to exercise
/// the applier's error paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` statement executions fail with `kind`.
    pub async fn fail_next_executes(&self, count: usize, kind: ErrorKind) {
        let mut inner = self.inner.lock().await;
        inner.faults.executes.extend(std::iter::repeat_n(kind, count));
    }

    pub async fn fail_next_begin(&self, kind: ErrorKind) {
        self.inner.lock().await.faults.begin = Some(kind);
    }

    pub async fn fail_next_commit(&self, kind: ErrorKind) {
        self.inner.lock().await.faults.commit = Some(kind);
    }

    pub async fn fail_next_rollback(&self, kind: ErrorKind) {
        self.inner.lock().await.faults.rollback = Some(kind);
    }

    /// Returns the committed rows of `table`, ordered by primary key.
    pub async fn rows(&self, table: &str) -> Vec<Map<String, Value>> {
        let inner = self.inner.lock().await;
        inner
            .tables
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn calls(&self) -> CallCounts {
        self.inner.lock().await.calls
    }
}

#[async_trait::async_trait]
impl TargetStore for MemoryStore {
    async fn begin(&self) -> CdcResult<Box<dyn StoreTransaction>> {
        let mut inner = self.inner.lock().await;
        inner.calls.begins += 1;

        if let Some(kind) = inner.faults.begin.take() {
            return Err(cdc_error!(kind, "Injected begin failure"));
        }

        Ok(Box::new(MemoryTransaction {
            inner: self.inner.clone(),
            staged: Vec::new(),
            working: BTreeMap::new(),
        }))
    }
}

/// A transaction over a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTransaction {
    inner: Arc<Mutex<Inner>>,
    staged: Vec<RowMutation>,
    /// Copies of the touched tables with the staged writes applied.
    working: BTreeMap<String, Table>,
}

#[async_trait::async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn execute(&mut self, mutation: &RowMutation) -> CdcResult<u64> {
        let mut inner = self.inner.lock().await;
        inner.calls.executes += 1;

        if !inner.faults.executes.is_empty() {
            let kind = inner.faults.executes.remove(0);
            return Err(cdc_error!(kind, "Injected statement failure"));
        }

        let table_name = mutation.table().to_string();
        let table = self
            .working
            .entry(table_name.clone())
            .or_insert_with(|| inner.tables.get(&table_name).cloned().unwrap_or_default());
        let affected = apply(table, mutation);
        self.staged.push(mutation.clone());

        Ok(affected)
    }

    async fn commit(self: Box<Self>) -> CdcResult<()> {
        let mut inner = self.inner.lock().await;

        if let Some(kind) = inner.faults.commit.take() {
            return Err(cdc_error!(kind, "Injected commit failure"));
        }

        for mutation in &self.staged {
            let table = inner
                .tables
                .entry(mutation.table().to_string())
                .or_default();
            apply(table, mutation);
        }
        inner.calls.commits += 1;

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> CdcResult<()> {
        let mut inner = self.inner.lock().await;
        inner.calls.rollbacks += 1;

        if let Some(kind) = inner.faults.rollback.take() {
            return Err(cdc_error!(kind, "Injected rollback failure"));
        }

        Ok(())
    }
}

/// Applies `mutation` to `table` with upsert/delete semantics, returning the affected rows.
fn apply(table: &mut Table, mutation: &RowMutation) -> u64 {
    match mutation {
        RowMutation::Delete { key_values, .. } => {
            let removed = table.remove(&row_key(key_values.iter()));
            u64::from(removed.is_some())
        }
        RowMutation::Upsert {
            columns,
            values,
            conflict_columns,
            update_columns,
            ..
        } => {
            let key_values = conflict_columns.iter().map(|key_column| {
                columns
                    .iter()
                    .position(|column| column == key_column)
                    .map_or(&Value::Null, |index| &values[index])
            });
            let key = row_key(key_values);

            match table.get_mut(&key) {
                Some(_) if update_columns.is_empty() => 0,
                Some(row) => {
                    for (column, value) in columns.iter().zip(values) {
                        if update_columns.contains(column) {
                            row.insert(column.clone(), value.clone());
                        }
                    }
                    1
                }
                None => {
                    let row = columns.iter().cloned().zip(values.iter().cloned()).collect();
                    table.insert(key, row);
                    1
                }
            }
        }
    }
}

fn row_key<'a>(values: impl Iterator<Item = &'a Value>) -> String {
    Value::Array(values.cloned().collect()).to_string()
}
