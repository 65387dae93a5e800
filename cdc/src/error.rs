//! Error type shared by every component of the sink.
//!
//! A [`CdcError`] carries an [`ErrorKind`] used for programmatic decisions (retry, abort the
//! batch, which status to answer with), a static description, an optional dynamic detail, the
//! originating error and the call site where it was raised.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result alias used across the crate.
pub type CdcResult<T> = Result<T, CdcError>;

/// Categories of failures the sink distinguishes.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Event shape
    MalformedEvent,
    InvalidData,

    // Applier outcomes
    TransactionBeginFailed,
    StatementFailed,
    RetriesExhausted,
    CommitFailed,
    RollbackFailed,

    // Target store classification
    SerializationConflict,
    ConnectionFailed,
    ConstraintViolation,
    ConversionError,
    TableMissing,
    QueryFailed,

    // Infrastructure
    ConfigError,
    IoError,
    DeserializationError,

    Unknown,
}

impl ErrorKind {
    /// Whether a statement failing with this kind may be retried in a fresh transaction.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::SerializationConflict)
    }
}

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the sink.
#[derive(Debug, Clone)]
pub struct CdcError {
    payload: Box<ErrorPayload>,
}

impl CdcError {
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    pub fn description(&self) -> &str {
        &self.payload.description
    }

    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.payload.backtrace
    }

    /// Walks the source chain and returns the first [`ErrorKind`] that is not one of the
    /// applier wrappers, which is the classification assigned by the target store.
    pub fn root_kind(&self) -> ErrorKind {
        let mut current: &CdcError = self;
        loop {
            let next = current
                .payload
                .source
                .as_deref()
                .and_then(|source| source.downcast_ref::<CdcError>());
            match next {
                Some(inner) => current = inner,
                None => return current.kind(),
            }
        }
    }

    /// Attaches the originating error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
    ) -> Self {
        CdcError {
            payload: Box::new(ErrorPayload {
                kind,
                description,
                detail,
                source: None,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for CdcError {
    fn eq(&self, other: &CdcError) -> bool {
        self.kind() == other.kind()
    }
}

impl fmt::Display for CdcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload = &self.payload;
        write!(f, "[{:?}] {}", payload.kind, payload.description)?;

        if let Some(detail) = &payload.detail {
            write!(f, ": {detail}")?;
        }

        Ok(())
    }
}

impl error::Error for CdcError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

impl From<(ErrorKind, &'static str)> for CdcError {
    #[track_caller]
    fn from((kind, description): (ErrorKind, &'static str)) -> CdcError {
        CdcError::from_components(kind, Cow::Borrowed(description), None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for CdcError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, description, detail): (ErrorKind, &'static str, D)) -> CdcError {
        CdcError::from_components(kind, Cow::Borrowed(description), Some(detail.into()))
    }
}

impl From<std::io::Error> for CdcError {
    #[track_caller]
    fn from(err: std::io::Error) -> CdcError {
        let detail = err.to_string();
        CdcError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
        )
        .with_source(err)
    }
}

impl From<serde_json::Error> for CdcError {
    #[track_caller]
    fn from(err: serde_json::Error) -> CdcError {
        let detail = err.to_string();
        CdcError::from_components(
            ErrorKind::DeserializationError,
            Cow::Borrowed("JSON decoding failed"),
            Some(Cow::Owned(detail)),
        )
        .with_source(err)
    }
}

/// Classifies sqlx failures by SQLSTATE so the applier can tell transient conflicts from
/// terminal errors.
impl From<sqlx::Error> for CdcError {
    #[track_caller]
    fn from(err: sqlx::Error) -> CdcError {
        let (kind, description) = match &err {
            sqlx::Error::Database(db_err) => classify_sqlstate(db_err.code().as_deref()),
            sqlx::Error::PoolTimedOut => (
                ErrorKind::ConnectionFailed,
                "Timed out waiting for a pooled connection",
            ),
            sqlx::Error::PoolClosed => (ErrorKind::ConnectionFailed, "Connection pool is closed"),
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) => (
                ErrorKind::ConnectionFailed,
                "Target store connection failed",
            ),
            sqlx::Error::Configuration(_) => {
                (ErrorKind::ConfigError, "Invalid target store configuration")
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => (
                ErrorKind::ConversionError,
                "Failed to decode a value from the target store",
            ),
            _ => (ErrorKind::QueryFailed, "Target store query failed"),
        };

        let detail = err.to_string();
        CdcError::from_components(kind, Cow::Borrowed(description), Some(Cow::Owned(detail)))
            .with_source(err)
    }
}

/// Maps a SQLSTATE code to an [`ErrorKind`].
fn classify_sqlstate(code: Option<&str>) -> (ErrorKind, &'static str) {
    let Some(code) = code else {
        return (ErrorKind::QueryFailed, "Target store query failed");
    };

    match code {
        // serialization_failure, deadlock_detected
        "40001" | "40P01" => (
            ErrorKind::SerializationConflict,
            "Transaction aborted by a concurrent conflict",
        ),
        "42P01" => (ErrorKind::TableMissing, "Target table does not exist"),
        _ if code.starts_with("08") => (
            ErrorKind::ConnectionFailed,
            "Target store connection failed",
        ),
        _ if code.starts_with("23") => (
            ErrorKind::ConstraintViolation,
            "Target store constraint violation",
        ),
        _ if code.starts_with("22") => (
            ErrorKind::ConversionError,
            "Target store rejected a value",
        ),
        _ => (ErrorKind::QueryFailed, "Target store query failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdc_error;

    #[test]
    fn serialization_failures_are_retryable() {
        assert_eq!(
            classify_sqlstate(Some("40001")).0,
            ErrorKind::SerializationConflict
        );
        assert_eq!(
            classify_sqlstate(Some("40P01")).0,
            ErrorKind::SerializationConflict
        );
        assert!(ErrorKind::SerializationConflict.is_retryable());
    }

    #[test]
    fn other_sqlstates_are_terminal() {
        for (code, kind) in [
            ("23505", ErrorKind::ConstraintViolation),
            ("22P02", ErrorKind::ConversionError),
            ("08006", ErrorKind::ConnectionFailed),
            ("42P01", ErrorKind::TableMissing),
            ("42601", ErrorKind::QueryFailed),
        ] {
            let (classified, _) = classify_sqlstate(Some(code));
            assert_eq!(classified, kind, "sqlstate {code}");
            assert!(!classified.is_retryable());
        }
    }

    #[test]
    fn root_kind_follows_the_source_chain() {
        let conflict = cdc_error!(ErrorKind::SerializationConflict, "conflict");
        let wrapped = cdc_error!(
            ErrorKind::RetriesExhausted,
            "Statement retries exhausted",
            source: conflict
        );

        assert_eq!(wrapped.kind(), ErrorKind::RetriesExhausted);
        assert_eq!(wrapped.root_kind(), ErrorKind::SerializationConflict);
    }

    #[test]
    fn display_includes_kind_description_and_detail() {
        let err = cdc_error!(
            ErrorKind::MalformedEvent,
            "Key length mismatch",
            "expected 2 key values, got 1"
        );

        assert_eq!(
            err.to_string(),
            "[MalformedEvent] Key length mismatch: expected 2 key values, got 1"
        );
    }
}
