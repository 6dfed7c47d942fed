//! Inbound webhook receiver.
//!
//! `POST /webhooks/inbound` – the consuming side of the wire contract.
//! Responds 200 for both first delivery and deduplicated replay, 400 for
//! malformed headers or a stale timestamp, 401 for a signature mismatch.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use hookrelay_core::verifier::{InboundError, InboundOutcome, InboundWebhook};
use hookrelay_sdk::signature::{
    DELIVERY_ID_HEADER, EVENT_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
use serde::Serialize;

use crate::state::AppState;

/// Acknowledgement returned for accepted (or replayed) webhooks.
#[derive(Serialize)]
struct InboundAck {
    received: bool,
    duplicate: bool,
}

/// Errors that can occur while receiving a webhook.
#[derive(Debug, thiserror::Error)]
pub enum InboundApiError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("invalid {0} header")]
    InvalidHeader(&'static str),
    #[error(transparent)]
    Verify(#[from] InboundError),
}

impl IntoResponse for InboundApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            InboundApiError::MissingHeader(_) | InboundApiError::InvalidHeader(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            InboundApiError::Verify(e) => match e {
                InboundError::MalformedSignature
                | InboundError::MalformedTimestamp
                | InboundError::StaleTimestamp => (StatusCode::BAD_REQUEST, e.to_string()),
                InboundError::SignatureMismatch => (StatusCode::UNAUTHORIZED, e.to_string()),
                InboundError::Store(inner) => {
                    tracing::error!(error = %inner, "Inbound webhook store error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal server error".to_string(),
                    )
                }
            },
        };
        (status, message).into_response()
    }
}

fn required_header(headers: &HeaderMap, name: &'static str) -> Result<String, InboundApiError> {
    headers
        .get(name)
        .ok_or(InboundApiError::MissingHeader(name))?
        .to_str()
        .map(ToOwned::to_owned)
        .map_err(|_| InboundApiError::InvalidHeader(name))
}

/// `POST /webhooks/inbound` – verify, deduplicate, and acknowledge.
pub async fn receive_webhook(
    state: axum::extract::State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, InboundApiError> {
    let State(state) = state;
    let webhook = InboundWebhook {
        delivery_id: required_header(&headers, DELIVERY_ID_HEADER)?,
        event: required_header(&headers, EVENT_HEADER)?,
        timestamp: required_header(&headers, TIMESTAMP_HEADER)?,
        signature: required_header(&headers, SIGNATURE_HEADER)?,
        body: body.to_vec(),
    };

    match state.verifier.verify(&webhook).await? {
        InboundOutcome::Accepted => {
            // The side effect itself belongs to the embedding business
            // logic; the engine's contract ends at verified-and-recorded.
            tracing::info!(
                delivery_id = %webhook.delivery_id,
                event = %webhook.event,
                "Inbound webhook accepted"
            );
            Ok(Json(InboundAck {
                received: true,
                duplicate: false,
            }))
        }
        InboundOutcome::Duplicate => Ok(Json(InboundAck {
            received: true,
            duplicate: true,
        })),
    }
}
