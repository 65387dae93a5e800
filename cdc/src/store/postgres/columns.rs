use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgConnection;
use tokio::sync::RwLock;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::types::TableName;

/// Declared types of a table's columns, as printed by `format_type`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnTypes(HashMap<String, String>);

impl ColumnTypes {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    /// Whether every one of `columns` has a known type.
    pub fn covers<'a>(&self, mut columns: impl Iterator<Item = &'a String>) -> bool {
        columns.all(|column| self.0.contains_key(column))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ColumnTypes
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ColumnTypes(
            iter.into_iter()
                .map(|(column, column_type)| (column.into(), column_type.into()))
                .collect(),
        )
    }
}

/// Per-table cache of column types shared by all connections of a store.
///
/// Entries are loaded on first use and reloaded when a mutation names a column the cached
/// entry does not know about, which covers columns added after the table was first seen.
#[derive(Debug, Clone, Default)]
pub struct ColumnTypeCache {
    inner: Arc<RwLock<HashMap<TableName, Arc<ColumnTypes>>>>,
}

impl ColumnTypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, table: &TableName) -> Option<Arc<ColumnTypes>> {
        self.inner.read().await.get(table).cloned()
    }

    pub async fn insert(&self, table: TableName, types: ColumnTypes) -> Arc<ColumnTypes> {
        let types = Arc::new(types);
        self.inner.write().await.insert(table, types.clone());

        types
    }

    pub async fn invalidate(&self, table: &TableName) {
        self.inner.write().await.remove(table);
    }
}

/// Reads the column types of `table` from the catalog.
pub async fn load_column_types(
    connection: &mut PgConnection,
    table: &TableName,
) -> CdcResult<ColumnTypes> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        select a.attname::text, pg_catalog.format_type(a.atttypid, a.atttypmod)
        from pg_catalog.pg_attribute a
        where a.attrelid = $1::regclass
        and a.attnum > 0
        and not a.attisdropped
        "#,
    )
    .bind(table.as_quoted_identifier())
    .fetch_all(&mut *connection)
    .await?;

    if rows.is_empty() {
        bail!(
            ErrorKind::TableMissing,
            "Target table has no columns",
            format!("no columns found for table {table}")
        );
    }

    Ok(rows.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cache_entries_can_be_replaced_and_invalidated() {
        let cache = ColumnTypeCache::new();
        let table = TableName::parse("orders").unwrap();

        assert!(cache.get(&table).await.is_none());

        cache
            .insert(table.clone(), ColumnTypes::from_iter([("id", "bigint")]))
            .await;
        let types = cache.get(&table).await.unwrap();
        assert_eq!(types.get("id"), Some("bigint"));
        assert!(types.covers(["id".to_string()].iter()));
        assert!(!types.covers(["id".to_string(), "note".to_string()].iter()));

        cache.invalidate(&table).await;
        assert!(cache.get(&table).await.is_none());
    }
}
