use axum::{Json, extract::Path, response::IntoResponse};
use hookrelay_sdk::objects::DeliveryDetailResponse;
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::{AdminApiError, attempt_to_response, delivery_to_response};

/// `GET /deliveries/{id}` – one delivery with its ordered attempt logs.
pub async fn get_delivery(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AdminApiError> {
    let delivery = state
        .store
        .get_delivery(id)
        .await?
        .ok_or(AdminApiError::NotFound)?;
    let attempts = state.store.list_attempts(id).await?;

    Ok(Json(DeliveryDetailResponse {
        delivery: delivery_to_response(&delivery),
        attempts: attempts.iter().map(attempt_to_response).collect(),
    }))
}
