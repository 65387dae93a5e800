//! Shorthands over the `From` tuples of [`crate::error::CdcError`].

/// Builds a [`crate::error::CdcError`].
///
/// `cdc_error!(kind, "description")`, optionally followed by a detail convertible into
/// `Cow<'static, str>` and then by `source: err`.
#[macro_export]
macro_rules! cdc_error {
    ($kind:expr, $desc:expr $(, source: $source:expr)? $(,)?) => {
        $crate::error::CdcError::from(($kind, $desc))$(.with_source($source))?
    };
    ($kind:expr, $desc:expr, $detail:expr $(, source: $source:expr)? $(,)?) => {
        $crate::error::CdcError::from(($kind, $desc, $detail))$(.with_source($source))?
    };
}

/// `return Err(cdc_error!(kind, "description", detail))` for validation failures.
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr, $detail:expr $(,)?) => {
        return ::core::result::Result::Err($crate::cdc_error!($kind, $desc, $detail))
    };
}

#[cfg(test)]
mod tests {
    use crate::error::{CdcResult, ErrorKind};

    fn parse_port(raw: &str) -> CdcResult<u16> {
        match raw.parse() {
            Ok(port) => Ok(port),
            Err(_) => bail!(ErrorKind::InvalidData, "Invalid port", format!("`{raw}`")),
        }
    }

    #[test]
    fn bail_returns_the_error_with_its_detail() {
        let err = parse_port("http").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(err.detail(), Some("`http`"));
        assert_eq!(parse_port("8443").unwrap(), 8443);
    }

    #[test]
    fn detail_and_source_are_both_optional() {
        let bare = cdc_error!(ErrorKind::Unknown, "bare");
        let sourced = cdc_error!(ErrorKind::QueryFailed, "wrapped", source: bare.clone());
        let detailed = cdc_error!(
            ErrorKind::QueryFailed,
            "wrapped",
            "with detail",
            source: bare.clone(),
        );

        assert_eq!(bare.detail(), None);
        assert_eq!(sourced.detail(), None);
        assert_eq!(sourced.root_kind(), ErrorKind::Unknown);
        assert_eq!(detailed.detail(), Some("with detail"));
        assert_eq!(detailed.root_kind(), ErrorKind::Unknown);
    }
}
