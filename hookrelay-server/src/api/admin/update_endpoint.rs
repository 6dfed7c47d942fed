use axum::{Json, extract::Path, response::IntoResponse};
use hookrelay_core::entities::endpoint::{EndpointUpdate, validate_endpoint_url};
use hookrelay_sdk::objects::{EventKind, UpdateEndpointRequest};
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::{AdminApiError, endpoint_to_response};

/// `PATCH /endpoints/{id}` – partial update; at least one field required.
pub async fn update_endpoint(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateEndpointRequest>,
) -> Result<impl IntoResponse, AdminApiError> {
    if request.is_empty() {
        return Err(AdminApiError::Validation(
            "update must set at least one of url, enabled, events".to_string(),
        ));
    }

    let url = request
        .url
        .as_deref()
        .map(validate_endpoint_url)
        .transpose()
        .map_err(|e| AdminApiError::Validation(e.to_string()))?;
    let events = request
        .events
        .as_deref()
        .map(EventKind::parse_set)
        .transpose()
        .map_err(|e| AdminApiError::Validation(e.to_string()))?;

    let endpoint = state
        .store
        .update_endpoint(
            id,
            EndpointUpdate {
                url,
                enabled: request.enabled,
                events,
            },
        )
        .await?
        .ok_or(AdminApiError::NotFound)?;

    Ok(Json(endpoint_to_response(&endpoint)))
}
