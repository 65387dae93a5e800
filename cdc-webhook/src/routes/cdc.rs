use actix_web::{
    HttpResponse, Responder, ResponseError,
    http::{StatusCode, header::ContentType},
    web::{self, Bytes, Data, Path},
};
use cdc::error::{CdcError, ErrorKind};
use cdc::sink::{ChangeBatch, ChangeSink};
use cdc::types::{PrimaryKeyColumns, WebhookEnvelope};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::routes::ErrorMessage;

#[derive(Debug, Error)]
pub enum ChangesError {
    #[error("missing primary-key columns")]
    MissingPrimaryKey,

    #[error("invalid primary-key columns: {0}")]
    InvalidPrimaryKey(#[source] CdcError),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("failed to apply changes: {0}")]
    Apply(#[source] CdcError),

    #[error("only POST is accepted on change endpoints")]
    MethodNotAllowed,
}

impl ResponseError for ChangesError {
    fn status_code(&self) -> StatusCode {
        match self {
            ChangesError::MissingPrimaryKey
            | ChangesError::InvalidPrimaryKey(_)
            | ChangesError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            ChangesError::Apply(err) if err.kind() == ErrorKind::MalformedEvent => {
                StatusCode::BAD_REQUEST
            }
            ChangesError::Apply(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ChangesError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_message = ErrorMessage {
            error: self.to_string(),
        };
        let body = serde_json::to_string(&error_message)
            .unwrap_or_else(|_| r#"{"error":"internal server error"}"#.to_string());
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(body)
    }
}

/// Acknowledgement of a fully applied batch.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChangesAck {
    pub status: String,
    pub applied: usize,
    /// Events dropped because their key did not match the primary-key columns.
    pub skipped: usize,
}

/// Receives one changefeed webhook batch.
///
/// `pk_columns` lists the primary-key columns of the target tables, comma separated and in the
/// order of the events' key values.
pub async fn receive_changes(
    sink: Data<ChangeSink>,
    pk_columns: Path<String>,
    body: Bytes,
) -> Result<impl Responder, ChangesError> {
    let primary_key =
        PrimaryKeyColumns::parse(&pk_columns).map_err(ChangesError::InvalidPrimaryKey)?;
    let envelope = WebhookEnvelope::from_slice(&body).map_err(ChangesError::InvalidJson)?;

    if let Some(length) = envelope.length
        && length != envelope.payload.len() as u64
    {
        warn!(
            declared = length,
            received = envelope.payload.len(),
            "payload length does not match the declared length"
        );
    }
    if envelope.is_resolved_only() {
        debug!(resolved = ?envelope.resolved, "received resolved timestamp");
    }

    let batch = ChangeBatch {
        primary_key,
        events: envelope.payload,
        payload_bytes: body.len() as u64,
        received_at_secs: chrono::Utc::now().timestamp(),
    };
    let outcome = sink.process(batch).await.map_err(ChangesError::Apply)?;

    Ok(HttpResponse::Ok().json(ChangesAck {
        status: "ok".to_string(),
        applied: outcome.applied,
        skipped: outcome.skipped,
    }))
}

pub async fn missing_primary_key() -> Result<HttpResponse, ChangesError> {
    Err(ChangesError::MissingPrimaryKey)
}

pub async fn method_not_allowed() -> Result<HttpResponse, ChangesError> {
    Err(ChangesError::MethodNotAllowed)
}

/// Registers the change endpoints. Methods other than POST answer 405.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/cdc/{pk_columns}")
            .route(web::post().to(receive_changes))
            .default_service(web::to(method_not_allowed)),
    )
    .service(
        web::resource(["/cdc", "/cdc/"])
            .route(web::post().to(missing_primary_key))
            .default_service(web::to(method_not_allowed)),
    );
}
