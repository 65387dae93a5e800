use std::io;
use std::sync::Once;

use cdc_config::Environment;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "info";

/// Set to any value to print logs from tests.
const ENABLE_TEST_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

static INIT_TEST_TRACING: Once = Once::new();

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to determine the environment: {0}")]
    Environment(#[from] io::Error),

    #[error("failed to install the log bridge: {0}")]
    LogBridge(#[from] tracing_log::log::SetLoggerError),

    #[error("failed to install the global subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Flushes buffered log lines when dropped.
///
/// Keep it alive for the whole lifetime of `main`.
#[must_use = "logs are lost if the flusher is dropped early"]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

/// Installs the global subscriber for the binary `app_name`.
///
/// Development builds get pretty console output, production emits one JSON object per line.
/// Both write through a non-blocking stdout writer and honor `RUST_LOG`.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    let environment = Environment::load()?;

    // The subscriber is built without its own log bridge, records from `log` users are
    // forwarded here.
    tracing_log::LogTracer::init()?;

    let (writer, guard) = tracing_appender::non_blocking(io::stdout());
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if environment.is_prod() {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(writer),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_writer(writer))
            .try_init()?;
    }

    ::tracing::info!(app = app_name, environment = %environment, "tracing initialized");

    Ok(LogFlusher { _guard: guard })
}

/// Installs a test subscriber once per process when `ENABLE_TRACING` is set.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var(ENABLE_TEST_TRACING_ENV_NAME).is_err() {
            return;
        }

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}
