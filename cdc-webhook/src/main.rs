use anyhow::{Context, anyhow};
use cdc_config::shared::PgConnectionConfig;
use cdc_telemetry::tracing::init_tracing;
use cdc_webhook::config::load_webhook_config;
use cdc_webhook::startup::Application;
use tracing::info;

/// Installs the AWS LC provider as the process-wide rustls default.
///
/// Feature unification can enable more than one rustls provider, so one has to be chosen
/// explicitly before any TLS configuration is built.
fn install_crypto_provider() -> anyhow::Result<()> {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow!("a rustls crypto provider was already installed"))
}

fn main() -> anyhow::Result<()> {
    install_crypto_provider()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    actix_web::rt::System::new().block_on(async_main())?;

    Ok(())
}

async fn async_main() -> anyhow::Result<()> {
    let config = load_webhook_config().context("loading webhook configuration")?;
    log_pg_connection_config(&config.database);

    let application = Application::build(config).await?;
    info!(port = application.port(), "webhook sink listening");
    application.run_until_stopped().await?;

    Ok(())
}

fn log_pg_connection_config(config: &PgConnectionConfig) {
    info!(
        host = config.host,
        port = config.port,
        dbname = config.name,
        username = config.username,
        tls_enabled = config.tls.enabled,
        "pg database options",
    );
}
