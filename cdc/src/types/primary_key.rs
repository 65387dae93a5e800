use std::fmt;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};

/// Ordered primary-key column names supplied with a webhook request.
///
/// The order matches the positional `key` values carried by every event of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeyColumns(Vec<String>);

impl PrimaryKeyColumns {
    /// Parses a comma separated list such as `region,id`.
    pub fn parse(raw: &str) -> CdcResult<PrimaryKeyColumns> {
        if raw.is_empty() {
            bail!(
                ErrorKind::InvalidData,
                "Missing primary-key columns",
                "no primary-key columns were supplied"
            );
        }

        let columns: Vec<String> = raw.split(',').map(str::to_owned).collect();
        if columns.iter().any(String::is_empty) {
            bail!(
                ErrorKind::InvalidData,
                "Invalid primary-key columns",
                format!("primary-key column list `{raw}` contains an empty column")
            );
        }

        Ok(PrimaryKeyColumns(columns))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.iter().any(|key| key == column)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for PrimaryKeyColumns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_column_order() {
        let columns = PrimaryKeyColumns::parse("region,id").unwrap();

        assert_eq!(columns.as_slice(), ["region", "id"]);
        assert!(columns.contains("id"));
        assert!(!columns.contains("amount"));
        assert_eq!(columns.to_string(), "region,id");
    }

    #[test]
    fn rejects_empty_lists_and_segments() {
        for raw in ["", ",", "id,", ",id", "region,,id"] {
            assert_eq!(
                PrimaryKeyColumns::parse(raw).unwrap_err().kind(),
                ErrorKind::InvalidData,
                "raw {raw:?}"
            );
        }
    }
}
