//! Helpers for tests running against a real Postgres server.

use cdc_config::shared::{IntoConnectOptions, PgConnectionConfig, TlsConfig};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;

/// Connection settings for a uniquely named test database.
///
/// Read from `TESTS_DATABASE_HOST`, `TESTS_DATABASE_PORT`, `TESTS_DATABASE_USERNAME` and the
/// optional `TESTS_DATABASE_PASSWORD`.
pub fn local_pg_connection_config() -> PgConnectionConfig {
    PgConnectionConfig {
        host: std::env::var("TESTS_DATABASE_HOST").expect("TESTS_DATABASE_HOST must be set"),
        port: std::env::var("TESTS_DATABASE_PORT")
            .expect("TESTS_DATABASE_PORT must be set")
            .parse()
            .expect("TESTS_DATABASE_PORT must be a valid port number"),
        name: Uuid::new_v4().to_string(),
        username: std::env::var("TESTS_DATABASE_USERNAME")
            .expect("TESTS_DATABASE_USERNAME must be set"),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(Into::into),
        tls: TlsConfig {
            trusted_root_certs: String::new(),
            enabled: false,
        },
    }
}

/// Creates the database described by `config` and returns a pool connected to it.
///
/// # Panics
///
/// Panics if the server is unreachable or the database cannot be created.
pub async fn create_pg_database(config: &PgConnectionConfig) -> PgPool {
    let mut connection = PgConnection::connect_with(&config.without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"create database "{}";"#, config.name))
        .await
        .expect("Failed to create database");

    PgPool::connect_with(config.with_db())
        .await
        .expect("Failed to connect to Postgres")
}

/// Terminates the connections to the test database and drops it. Failures are only printed.
pub async fn drop_pg_database(config: &PgConnectionConfig) {
    let mut connection = match PgConnection::connect_with(&config.without_db()).await {
        Ok(connection) => connection,
        Err(err) => {
            eprintln!("warning: failed to connect to Postgres for cleanup: {err}");
            return;
        }
    };

    if let Err(err) = connection
        .execute(&*format!(
            r#"
            select pg_terminate_backend(pid)
            from pg_stat_activity
            where datname = '{}'
            and pid <> pg_backend_pid();"#,
            config.name
        ))
        .await
    {
        eprintln!(
            "warning: failed to terminate connections to {}: {err}",
            config.name
        );
    }

    if let Err(err) = connection
        .execute(&*format!(r#"drop database if exists "{}";"#, config.name))
        .await
    {
        eprintln!("warning: failed to drop database {}: {err}", config.name);
    }
}
