use std::io::BufReader;

use cdc_config::shared::ServerTlsConfig;
use rustls::ServerConfig;
use secrecy::ExposeSecret;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsSetupError {
    #[error("failed to read PEM material: {0}")]
    Pem(#[from] std::io::Error),

    #[error("the certificate chain contains no certificate")]
    NoCertificates,

    #[error("no private key found in the configured PEM")]
    NoPrivateKey,

    #[error("invalid certificate or key: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Builds the rustls configuration terminating TLS for the webhook listener.
pub fn load_server_config(config: &ServerTlsConfig) -> Result<ServerConfig, TlsSetupError> {
    let mut cert_reader = BufReader::new(config.cert_chain_pem.as_bytes());
    let cert_chain = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;
    if cert_chain.is_empty() {
        return Err(TlsSetupError::NoCertificates);
    }

    let mut key_reader = BufReader::new(config.private_key_pem.expose_secret().as_bytes());
    let private_key =
        rustls_pemfile::private_key(&mut key_reader)?.ok_or(TlsSetupError::NoPrivateKey)?;

    let server_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, private_key)?;

    Ok(server_config)
}
