//! Configuration types shared by the sink library and the webhook service.

mod applier;
mod base;
mod connection;
mod server;
mod stats;
mod webhook;

pub use applier::ApplierConfig;
pub use base::ValidationError;
pub use connection::{IntoConnectOptions, PgConnectionConfig, PoolConfig, TlsConfig};
pub use server::{ServerConfig, ServerTlsConfig};
pub use stats::StatsConfig;
pub use webhook::WebhookConfig;
