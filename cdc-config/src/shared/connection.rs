use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};

use crate::shared::ValidationError;

/// Session settings applied to every connection to the target store.
const SESSION_OPTIONS: &[(&str, &str)] = &[
    ("datestyle", "ISO"),
    ("intervalstyle", "postgres"),
    ("extra_float_digits", "3"),
    ("client_encoding", "UTF8"),
];

/// Connection parameters of the target Postgres compatible store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PgConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Name of the database the changes are applied to.
    pub name: String,
    pub username: String,
    /// Redacted in debug output.
    pub password: Option<SecretString>,
    pub tls: TlsConfig,
}

impl PgConnectionConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.tls.validate()
    }
}

/// Client side TLS settings for the target store connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TlsConfig {
    /// PEM encoded root certificates trusted when verifying the server.
    #[serde(default)]
    pub trusted_root_certs: String,
    pub enabled: bool,
}

impl TlsConfig {
    /// Fails with [`ValidationError::MissingTrustedRootCerts`] when TLS is enabled without
    /// any root certificate.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enabled && self.trusted_root_certs.is_empty() {
            return Err(ValidationError::MissingTrustedRootCerts);
        }

        Ok(())
    }
}

/// Sizing of the connection pool shared by all in-flight requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PoolConfig {
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a request waits for a free connection before failing.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

fn default_min_connections() -> u32 {
    1
}

fn default_max_connections() -> u32 {
    16
}

fn default_acquire_timeout_ms() -> u64 {
    30_000
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_connections == 0 {
            return Err(ValidationError::Zero("pool.max_connections"));
        }
        if self.min_connections > self.max_connections {
            return Err(ValidationError::PoolBounds {
                min: self.min_connections,
                max: self.max_connections,
            });
        }

        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Returns sqlx pool options reflecting this configuration.
    pub fn to_pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .min_connections(self.min_connections)
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout())
    }
}

/// Converts a connection configuration into driver specific connect options.
pub trait IntoConnectOptions<Output> {
    /// Options for connecting to the server without selecting a database, used for
    /// administrative statements such as `create database`.
    fn without_db(&self) -> Output;

    /// Options for connecting to the configured database.
    fn with_db(&self) -> Output;
}

impl IntoConnectOptions<PgConnectOptions> for PgConnectionConfig {
    fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.tls.enabled {
            PgSslMode::VerifyFull
        } else {
            PgSslMode::Prefer
        };
        let mut options = PgConnectOptions::new_without_pgpass()
            .host(&self.host)
            .username(&self.username)
            .port(self.port)
            .ssl_mode(ssl_mode)
            .options(SESSION_OPTIONS.iter().copied());

        if self.tls.enabled {
            let root_certs = self.tls.trusted_root_certs.clone().into_bytes();
            options = options.ssl_root_cert_from_pem(root_certs);
        }
        if let Some(password) = &self.password {
            options = options.password(password.expose_secret());
        }

        options
    }

    fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.name)
    }
}
