use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::shared::ValidationError;

/// HTTP listener settings of the webhook service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Serves HTTPS when present, plain HTTP otherwise.
    #[serde(default)]
    pub tls: Option<ServerTlsConfig>,
}

fn default_max_body_bytes() -> usize {
    50 << 20
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_body_bytes == 0 {
            return Err(ValidationError::Zero("server.max_body_bytes"));
        }
        if let Some(tls) = &self.tls {
            tls.validate()?;
        }

        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// PEM material used to terminate TLS.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerTlsConfig {
    /// PEM encoded certificate chain, leaf first.
    pub cert_chain_pem: String,
    /// PEM encoded private key. Redacted in debug output.
    pub private_key_pem: SecretString,
}

impl ServerTlsConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cert_chain_pem.trim().is_empty() {
            return Err(ValidationError::EmptyServerTlsMaterial("cert_chain_pem"));
        }
        if self.private_key_pem.expose_secret().trim().is_empty() {
            return Err(ValidationError::EmptyServerTlsMaterial("private_key_pem"));
        }

        Ok(())
    }
}
