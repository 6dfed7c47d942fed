use axum::{Json, extract::Path, http::StatusCode, response::IntoResponse};
use hookrelay_core::entities::DeliveryStatus;
use hookrelay_core::entities::delivery::NewDelivery;
use hookrelay_sdk::objects::RequeueResponse;
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `POST /deliveries/{id}/requeue` – clone a dead-lettered delivery into
/// a fresh pending row.
///
/// The dead row itself stays immutable; the clone starts with a zeroed
/// attempt counter and is picked up by the dispatcher on its next tick.
pub async fn requeue_delivery(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AdminApiError> {
    let delivery = state
        .store
        .get_delivery(id)
        .await?
        .ok_or(AdminApiError::NotFound)?;
    if delivery.status != DeliveryStatus::Dead {
        return Err(AdminApiError::Conflict("delivery is not dead-lettered"));
    }

    let requeued_id = Uuid::now_v7();
    state
        .store
        .insert_deliveries(vec![NewDelivery {
            id: requeued_id,
            endpoint_id: delivery.endpoint_id,
            event: delivery.event.clone(),
            payload: delivery.payload.clone(),
            max_attempts: delivery.max_attempts,
        }])
        .await?;

    tracing::info!(
        dead_delivery_id = %id,
        requeued_delivery_id = %requeued_id,
        "Dead-lettered delivery requeued"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(RequeueResponse { id: requeued_id }),
    ))
}
