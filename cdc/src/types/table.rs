use std::fmt;

use pg_escape::quote_identifier;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};

/// Target table named by a changefeed event.
///
/// Changefeed topics may be qualified with a database and schema (`db.schema.table`). The
/// database part is dropped since the target connection already selects a database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn parse(source: &str) -> CdcResult<TableName> {
        let parts: Vec<&str> = source.split('.').collect();
        if parts.iter().any(|part| part.is_empty()) {
            bail!(
                ErrorKind::MalformedEvent,
                "Invalid table name",
                format!("table name `{source}` contains an empty segment")
            );
        }

        let table = match parts.as_slice() {
            [name] => TableName {
                schema: None,
                name: (*name).to_owned(),
            },
            [schema, name] | [_, schema, name] => TableName {
                schema: Some((*schema).to_owned()),
                name: (*name).to_owned(),
            },
            _ => bail!(
                ErrorKind::MalformedEvent,
                "Invalid table name",
                format!("table name `{source}` has too many segments")
            ),
        };

        Ok(table)
    }

    /// Returns the name quoted for use in SQL text.
    pub fn as_quoted_identifier(&self) -> String {
        let quoted_name = quote_identifier(&self.name);
        match &self.schema {
            Some(schema) => format!("{}.{quoted_name}", quote_identifier(schema)),
            None => quoted_name.into_owned(),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_qualified_names() {
        assert_eq!(
            TableName::parse("orders").unwrap(),
            TableName {
                schema: None,
                name: "orders".into()
            }
        );
        assert_eq!(
            TableName::parse("public.orders").unwrap().to_string(),
            "public.orders"
        );
        assert_eq!(
            TableName::parse("shop.public.orders").unwrap().to_string(),
            "public.orders"
        );
    }

    #[test]
    fn rejects_empty_segments() {
        for source in ["", ".orders", "public.", "a..b", "a.b.c.d"] {
            let err = TableName::parse(source).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedEvent, "source {source:?}");
        }
    }

    #[test]
    fn quotes_identifiers_when_needed() {
        assert_eq!(
            TableName::parse("public.orders")
                .unwrap()
                .as_quoted_identifier(),
            "public.orders"
        );
        assert_eq!(
            TableName::parse("Sales.Order Lines")
                .unwrap()
                .as_quoted_identifier(),
            r#""Sales"."Order Lines""#
        );
    }
}
