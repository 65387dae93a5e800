//! Turns decoded change events into row mutations.

use serde_json::{Map, Value};

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::types::{PrimaryKeyColumns, TableName};

/// A single row write derived from one change event.
#[derive(Debug, Clone, PartialEq)]
pub enum RowMutation {
    /// Removes the row identified by the key columns.
    Delete {
        table: TableName,
        key_columns: Vec<String>,
        key_values: Vec<Value>,
    },
    /// Inserts the row, updating `update_columns` if a row with the same key exists.
    ///
    /// `columns` and `values` are positionally aligned and always include every key column.
    Upsert {
        table: TableName,
        columns: Vec<String>,
        values: Vec<Value>,
        conflict_columns: Vec<String>,
        update_columns: Vec<String>,
    },
}

impl RowMutation {
    pub fn table(&self) -> &TableName {
        match self {
            RowMutation::Delete { table, .. } | RowMutation::Upsert { table, .. } => table,
        }
    }

    /// Columns written or matched by the mutation.
    pub fn columns(&self) -> &[String] {
        match self {
            RowMutation::Delete { key_columns, .. } => key_columns,
            RowMutation::Upsert { columns, .. } => columns,
        }
    }

    /// Short name of the mutation used in logs.
    pub fn operation(&self) -> &'static str {
        match self {
            RowMutation::Delete { .. } => "delete",
            RowMutation::Upsert { .. } => "upsert",
        }
    }
}

/// Builds the mutation for one event.
///
/// An absent `after` row produces a [`RowMutation::Delete`], anything else an
/// [`RowMutation::Upsert`]. Key columns missing from `after` are appended with their positional
/// key value so the conflict target is always part of the inserted row.
pub fn build_mutation(
    table: TableName,
    primary_key: &PrimaryKeyColumns,
    key_values: Vec<Value>,
    after: Option<Map<String, Value>>,
) -> CdcResult<RowMutation> {
    if key_values.len() != primary_key.len() {
        bail!(
            ErrorKind::MalformedEvent,
            "Key length mismatch",
            format!(
                "expected {} key values, got {}",
                primary_key.len(),
                key_values.len()
            )
        );
    }

    let Some(after) = after else {
        return Ok(RowMutation::Delete {
            table,
            key_columns: primary_key.as_slice().to_vec(),
            key_values,
        });
    };

    // Columns and values come from the same traversal so they stay aligned.
    let mut columns = Vec::with_capacity(after.len() + primary_key.len());
    let mut values = Vec::with_capacity(after.len() + primary_key.len());
    for (column, value) in after {
        columns.push(column);
        values.push(value);
    }

    for (key_column, key_value) in primary_key.iter().zip(key_values) {
        if !columns.iter().any(|column| column == key_column) {
            columns.push(key_column.to_owned());
            values.push(key_value);
        }
    }

    let update_columns = columns
        .iter()
        .filter(|column| !primary_key.contains(column))
        .cloned()
        .collect();

    Ok(RowMutation::Upsert {
        table,
        columns,
        values,
        conflict_columns: primary_key.as_slice().to_vec(),
        update_columns,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn orders() -> TableName {
        TableName::parse("orders").unwrap()
    }

    fn after(value: Value) -> Option<Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    #[test]
    fn absent_after_builds_a_delete() {
        let primary_key = PrimaryKeyColumns::parse("region,id").unwrap();

        let mutation =
            build_mutation(orders(), &primary_key, vec![json!("eu"), json!(7)], None).unwrap();

        assert_eq!(
            mutation,
            RowMutation::Delete {
                table: orders(),
                key_columns: vec!["region".into(), "id".into()],
                key_values: vec![json!("eu"), json!(7)],
            }
        );
    }

    #[test]
    fn upsert_updates_only_non_key_columns() {
        let primary_key = PrimaryKeyColumns::parse("id").unwrap();

        let mutation = build_mutation(
            orders(),
            &primary_key,
            vec![json!(1)],
            after(json!({"id": 1, "amount": 10, "note": "x"})),
        )
        .unwrap();

        let RowMutation::Upsert {
            columns,
            values,
            conflict_columns,
            update_columns,
            ..
        } = mutation
        else {
            panic!("expected an upsert");
        };

        assert_eq!(columns.len(), values.len());
        for (column, value) in columns.iter().zip(&values) {
            let expected = match column.as_str() {
                "id" => json!(1),
                "amount" => json!(10),
                "note" => json!("x"),
                other => panic!("unexpected column {other}"),
            };
            assert_eq!(value, &expected);
        }
        assert_eq!(conflict_columns, vec!["id".to_string()]);
        let mut update_columns = update_columns;
        update_columns.sort();
        assert_eq!(update_columns, vec!["amount".to_string(), "note".to_string()]);
    }

    #[test]
    fn missing_key_columns_are_appended_from_the_key() {
        let primary_key = PrimaryKeyColumns::parse("region,id").unwrap();

        let mutation = build_mutation(
            orders(),
            &primary_key,
            vec![json!("eu"), json!(7)],
            after(json!({"id": 7, "amount": 3})),
        )
        .unwrap();

        let RowMutation::Upsert {
            columns,
            values,
            update_columns,
            ..
        } = mutation
        else {
            panic!("expected an upsert");
        };

        assert_eq!(columns.last().map(String::as_str), Some("region"));
        assert_eq!(values.last(), Some(&json!("eu")));
        assert_eq!(update_columns, vec!["amount".to_string()]);
    }

    #[test]
    fn empty_after_is_a_key_only_upsert() {
        let primary_key = PrimaryKeyColumns::parse("id").unwrap();

        let mutation =
            build_mutation(orders(), &primary_key, vec![json!(5)], after(json!({}))).unwrap();

        assert_eq!(
            mutation,
            RowMutation::Upsert {
                table: orders(),
                columns: vec!["id".into()],
                values: vec![json!(5)],
                conflict_columns: vec!["id".into()],
                update_columns: vec![],
            }
        );
    }

    #[test]
    fn key_length_mismatch_is_rejected() {
        let primary_key = PrimaryKeyColumns::parse("region,id").unwrap();

        let err = build_mutation(orders(), &primary_key, vec![json!(1)], None).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedEvent);
    }
}
