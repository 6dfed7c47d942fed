use axum::{Json, http::StatusCode, response::IntoResponse};
use hookrelay_core::entities::endpoint::{EndpointInsert, validate_endpoint_url};
use hookrelay_sdk::objects::{CreateEndpointRequest, CreateEndpointResponse, EventKind};
use hookrelay_sdk::secret::generate_endpoint_secret;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::{AdminApiError, endpoint_to_response};

/// `POST /endpoints` – register a new endpoint.
///
/// The response is the only place the endpoint secret ever appears.
pub async fn create_endpoint(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Json(request): Json<CreateEndpointRequest>,
) -> Result<impl IntoResponse, AdminApiError> {
    let url = validate_endpoint_url(&request.url)
        .map_err(|e| AdminApiError::Validation(e.to_string()))?;
    let events = EventKind::parse_set(&request.events)
        .map_err(|e| AdminApiError::Validation(e.to_string()))?;

    let secret = generate_endpoint_secret();
    let endpoint = state
        .store
        .create_endpoint(EndpointInsert {
            url,
            secret: secret.clone(),
            events,
        })
        .await?;

    tracing::info!(endpoint_id = %endpoint.id, url = %endpoint.url, "Endpoint registered");

    Ok((
        StatusCode::CREATED,
        Json(CreateEndpointResponse {
            endpoint: endpoint_to_response(&endpoint),
            secret,
        }),
    ))
}
