use pg_escape::quote_identifier;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::mutation::RowMutation;
use crate::store::postgres::columns::ColumnTypes;
use crate::store::postgres::encoding::encode_text;

/// SQL text with its positional text parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Option<String>>,
}

/// Renders the statement applying `mutation` to a table with the given column types.
///
/// Each `$n` placeholder is cast to its column's declared type.
pub fn render_statement(mutation: &RowMutation, types: &ColumnTypes) -> CdcResult<Statement> {
    match mutation {
        RowMutation::Delete {
            table,
            key_columns,
            key_values,
        } => {
            let mut predicates = Vec::with_capacity(key_columns.len());
            let mut params = Vec::with_capacity(key_values.len());
            for (i, (column, value)) in key_columns.iter().zip(key_values).enumerate() {
                let column_type = column_type(types, column)?;
                predicates.push(format!(
                    "{} = ${}::{column_type}",
                    quote_identifier(column),
                    i + 1
                ));
                params.push(encode_text(value, column_type));
            }

            Ok(Statement {
                sql: format!(
                    "delete from {} where {}",
                    table.as_quoted_identifier(),
                    predicates.join(" and ")
                ),
                params,
            })
        }
        RowMutation::Upsert {
            table,
            columns,
            values,
            conflict_columns,
            update_columns,
        } => {
            let mut placeholders = Vec::with_capacity(columns.len());
            let mut params = Vec::with_capacity(values.len());
            for (i, (column, value)) in columns.iter().zip(values).enumerate() {
                let column_type = column_type(types, column)?;
                placeholders.push(format!("${}::{column_type}", i + 1));
                params.push(encode_text(value, column_type));
            }

            let conflict_action = if update_columns.is_empty() {
                "do nothing".to_owned()
            } else {
                let assignments = update_columns
                    .iter()
                    .map(|column| {
                        let column = quote_identifier(column);
                        format!("{column} = excluded.{column}")
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("do update set {assignments}")
            };

            Ok(Statement {
                sql: format!(
                    "insert into {} ({}) values ({}) on conflict ({}) {conflict_action}",
                    table.as_quoted_identifier(),
                    quote_list(columns),
                    placeholders.join(", "),
                    quote_list(conflict_columns),
                ),
                params,
            })
        }
    }
}

fn quote_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_type<'a>(types: &'a ColumnTypes, column: &str) -> CdcResult<&'a str> {
    match types.get(column) {
        Some(column_type) => Ok(column_type),
        None => bail!(
            ErrorKind::InvalidData,
            "Unknown target column",
            format!("column `{column}` does not exist in the target table")
        ),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mutation::build_mutation;
    use crate::types::{PrimaryKeyColumns, TableName};

    fn order_types() -> ColumnTypes {
        ColumnTypes::from_iter([
            ("region", "text"),
            ("id", "bigint"),
            ("amount", "numeric(10,2)"),
            ("note", "character varying(64)"),
            ("tags", "text[]"),
        ])
    }

    fn mutation(
        primary_key: &str,
        key: Vec<serde_json::Value>,
        after: serde_json::Value,
    ) -> RowMutation {
        let after = match after {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        };
        build_mutation(
            TableName::parse("public.orders").unwrap(),
            &PrimaryKeyColumns::parse(primary_key).unwrap(),
            key,
            after,
        )
        .unwrap()
    }

    #[test]
    fn renders_composite_key_delete() {
        let statement = render_statement(
            &mutation("region,id", vec![json!("eu"), json!(7)], json!(null)),
            &order_types(),
        )
        .unwrap();

        insta::assert_snapshot!(statement.sql, @"delete from public.orders where region = $1::text and id = $2::bigint");
        assert_eq!(
            statement.params,
            vec![Some("eu".to_string()), Some("7".to_string())]
        );
    }

    #[test]
    fn renders_upsert_with_update_set() {
        let statement = render_statement(
            &mutation(
                "id",
                vec![json!(7)],
                json!({"id": 7, "amount": "12.50", "tags": ["a", "b"]}),
            ),
            &order_types(),
        )
        .unwrap();

        insta::assert_snapshot!(statement.sql, @"insert into public.orders (amount, id, tags) values ($1::numeric(10,2), $2::bigint, $3::text[]) on conflict (id) do update set amount = excluded.amount, tags = excluded.tags");
        assert_eq!(
            statement.params,
            vec![
                Some("12.50".to_string()),
                Some("7".to_string()),
                Some(r#"{"a","b"}"#.to_string()),
            ]
        );
    }

    #[test]
    fn key_only_upsert_does_nothing_on_conflict() {
        let statement =
            render_statement(&mutation("id", vec![json!(7)], json!({})), &order_types()).unwrap();

        insta::assert_snapshot!(statement.sql, @"insert into public.orders (id) values ($1::bigint) on conflict (id) do nothing");
    }

    #[test]
    fn null_values_bind_as_sql_null() {
        let statement = render_statement(
            &mutation("id", vec![json!(7)], json!({"id": 7, "note": null})),
            &order_types(),
        )
        .unwrap();

        assert_eq!(statement.params, vec![Some("7".to_string()), None]);
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let err = render_statement(
            &mutation("id", vec![json!(7)], json!({"id": 7, "missing": 1})),
            &order_types(),
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
