use serde::Deserialize;

use crate::Config;
use crate::shared::{
    ApplierConfig, PgConnectionConfig, PoolConfig, ServerConfig, StatsConfig, ValidationError,
};

/// Complete configuration of the webhook sink service.
///
/// Not serializable, it holds secrets.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    pub server: ServerConfig,
    /// Target store the change events are replayed into.
    pub database: PgConnectionConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub applier: ApplierConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

impl WebhookConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.pool.validate()?;
        self.applier.validate()?;
        self.stats.validate()
    }
}

impl Config for WebhookConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["stats.windows_secs"];
}
