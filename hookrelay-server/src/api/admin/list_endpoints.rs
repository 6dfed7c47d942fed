use axum::{Json, response::IntoResponse};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::{AdminApiError, endpoint_to_response};

/// `GET /endpoints` – list registered endpoints, secrets omitted.
pub async fn list_endpoints(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
) -> Result<impl IntoResponse, AdminApiError> {
    let endpoints = state.store.list_endpoints().await?;
    let response: Vec<_> = endpoints.iter().map(endpoint_to_response).collect();
    Ok(Json(response))
}
