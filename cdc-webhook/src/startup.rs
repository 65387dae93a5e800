use std::net::TcpListener;
use std::sync::Arc;

use actix_web::{App, HttpServer, dev::Server, web};
use cdc::applier::{Applier, RetryPolicy};
use cdc::sink::ChangeSink;
use cdc::stats::StatsStore;
use cdc::store::TargetStore;
use cdc::store::postgres::PgTargetStore;
use cdc_config::shared::WebhookConfig;
use tracing::info;
use tracing_actix_web::TracingLogger;

use crate::routes::{
    self,
    health_check::health_check,
    stats::{index, stats_json, stats_page},
};
use crate::tls::load_server_config;

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    pub async fn build(config: WebhookConfig) -> anyhow::Result<Self> {
        let store = PgTargetStore::connect_lazy(&config.database, &config.pool);
        let sink = build_sink(Arc::new(store), &config);

        let listener = TcpListener::bind(config.server.address())?;
        let port = listener.local_addr()?.port();

        let tls = config
            .server
            .tls
            .as_ref()
            .map(load_server_config)
            .transpose()?;

        let server = run(listener, sink, config.server.max_body_bytes, tls)?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

/// Wires a sink with the applier and statistics described by `config`.
pub fn build_sink(store: Arc<dyn TargetStore>, config: &WebhookConfig) -> ChangeSink {
    let applier = Applier::new(store, RetryPolicy::from_config(&config.applier));
    let stats = Arc::new(StatsStore::new(config.stats.clone()));

    ChangeSink::new(applier, stats)
}

/// Registers the routes and shared state of the service.
pub fn configure_app(
    cfg: &mut web::ServiceConfig,
    sink: web::Data<ChangeSink>,
    max_body_bytes: usize,
) {
    cfg.app_data(sink)
        .app_data(web::PayloadConfig::new(max_body_bytes))
        .service(health_check)
        .service(index)
        .service(stats_page)
        .service(stats_json)
        .configure(routes::cdc::configure);
}

pub fn run(
    listener: TcpListener,
    sink: ChangeSink,
    max_body_bytes: usize,
    tls: Option<rustls::ServerConfig>,
) -> Result<Server, std::io::Error> {
    let sink = web::Data::new(sink);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .configure(|cfg| configure_app(cfg, sink.clone(), max_body_bytes))
    });

    let server = match tls {
        Some(tls) => {
            info!("serving https");
            server.listen_rustls_0_23(listener, tls)?
        }
        None => {
            info!("serving plain http, tls is not configured");
            server.listen(listener)?
        }
    };

    Ok(server.run())
}
