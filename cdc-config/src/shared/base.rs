use thiserror::Error;

/// Errors raised when a loaded configuration is internally inconsistent.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    #[error("Invalid server TLS config: `{0}` must not be empty")]
    EmptyServerTlsMaterial(&'static str),
    #[error("`{0}` cannot be zero")]
    Zero(&'static str),
    #[error("`pool.min_connections` ({min}) exceeds `pool.max_connections` ({max})")]
    PoolBounds { min: u32, max: u32 },
    #[error("Invalid stats config: {0}")]
    Stats(String),
}
