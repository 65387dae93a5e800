use cdc_config::shared::{ValidationError, WebhookConfig};
use cdc_config::{LoadConfigError, load_config};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebhookConfigError {
    #[error(transparent)]
    Load(#[from] LoadConfigError),

    #[error("invalid webhook configuration: {0}")]
    Validation(#[from] ValidationError),
}

/// Loads the service configuration from `./configuration` and the environment, then
/// validates it.
pub fn load_webhook_config() -> Result<WebhookConfig, WebhookConfigError> {
    let config = load_config::<WebhookConfig>()?;
    config.validate()?;

    Ok(config)
}
