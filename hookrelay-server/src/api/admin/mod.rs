//! Admin API handlers.
//!
//! These endpoints are called by operators and require the
//! `Hookrelay-Admin-Authorization` header with the plaintext admin secret.
//!
//! # Endpoints
//!
//! - `POST  /endpoints`                      – register an endpoint (returns the secret once)
//! - `GET   /endpoints`                      – list endpoints (secrets omitted)
//! - `PATCH /endpoints/{id}`                 – partial update
//! - `POST  /endpoints/{id}/rotate-secret`   – rotate the secret (returns it once)
//! - `GET   /deliveries`                     – list deliveries (filterable, cursor-paginated)
//! - `GET   /deliveries/{id}`                – one delivery with its attempt logs
//! - `POST  /deliveries/{id}/requeue`        – clone a dead delivery into a fresh pending row
//! - `GET   /dead-letters`                   – the dead-letter view

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};

use crate::state::AppState;

mod create_endpoint;
mod get_delivery;
mod list_dead_letters;
mod list_deliveries;
mod list_endpoints;
mod requeue_delivery;
mod rotate_secret;
mod update_endpoint;

/// Build the Admin API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/endpoints",
            post(create_endpoint::create_endpoint).get(list_endpoints::list_endpoints),
        )
        .route("/endpoints/{id}", patch(update_endpoint::update_endpoint))
        .route(
            "/endpoints/{id}/rotate-secret",
            post(rotate_secret::rotate_secret),
        )
        .route("/deliveries", get(list_deliveries::list_deliveries))
        .route("/deliveries/{id}", get(get_delivery::get_delivery))
        .route(
            "/deliveries/{id}/requeue",
            post(requeue_delivery::requeue_delivery),
        )
        .route("/dead-letters", get(list_dead_letters::list_dead_letters))
}

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Errors that can occur in Admin API handlers.
#[derive(Debug)]
pub(crate) enum AdminApiError {
    Database(hookrelay_core::store::StoreError),
    NotFound,
    Validation(String),
    Conflict(&'static str),
}

impl From<hookrelay_core::store::StoreError> for AdminApiError {
    fn from(e: hookrelay_core::store::StoreError) -> Self {
        AdminApiError::Database(e)
    }
}

impl IntoResponse for AdminApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AdminApiError::Database(e) => {
                tracing::error!(error = %e, "Admin API database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            AdminApiError::NotFound => {
                (StatusCode::NOT_FOUND, "resource not found").into_response()
            }
            AdminApiError::Validation(message) => {
                (StatusCode::BAD_REQUEST, message).into_response()
            }
            AdminApiError::Conflict(message) => {
                (StatusCode::CONFLICT, message).into_response()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

use hookrelay_core::entities::delivery::{AttemptLog, WebhookDelivery};
use hookrelay_core::entities::endpoint::WebhookEndpoint;
use hookrelay_sdk::objects::{AttemptLogResponse, DeliveryResponse, EndpointResponse};

pub(crate) fn endpoint_to_response(e: &WebhookEndpoint) -> EndpointResponse {
    EndpointResponse {
        id: e.id,
        url: e.url.clone(),
        enabled: e.enabled,
        events: e.events.clone(),
        created_at: e.created_at.unix_timestamp(),
        updated_at: e.updated_at.unix_timestamp(),
    }
}

pub(crate) fn delivery_to_response(d: &WebhookDelivery) -> DeliveryResponse {
    DeliveryResponse {
        id: d.id,
        endpoint_id: d.endpoint_id,
        event: d.event.clone(),
        payload: d.payload.clone(),
        status: d.status.into(),
        attempts: d.attempts,
        max_attempts: d.max_attempts,
        last_error: d.last_error.clone(),
        last_status_code: d.last_status_code,
        last_attempt_at: d.last_attempt_at.map(|t| t.unix_timestamp()),
        next_attempt: d.next_attempt.unix_timestamp(),
        delivered_at: d.delivered_at.map(|t| t.unix_timestamp()),
        created_at: d.created_at.unix_timestamp(),
    }
}

pub(crate) fn attempt_to_response(a: &AttemptLog) -> AttemptLogResponse {
    AttemptLogResponse {
        attempt_number: a.attempt_number,
        started_at: a.started_at.unix_timestamp(),
        status: a.status.into(),
        status_code: a.status_code,
        error: a.error.clone(),
    }
}
