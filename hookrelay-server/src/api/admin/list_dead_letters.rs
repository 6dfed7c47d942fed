use axum::{Json, extract::Query, response::IntoResponse};
use hookrelay_core::entities::DeliveryStatus;
use hookrelay_core::store::DeliveryFilter;
use hookrelay_sdk::objects::{DeliveryPage, ListDeliveriesQuery, clamp_limit};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::{AdminApiError, delivery_to_response};

/// `GET /dead-letters` – deliveries that exhausted their retry budget,
/// for manual remediation. Same filters and pagination as `/deliveries`,
/// pinned to the dead status.
pub async fn list_dead_letters(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Query(query): Query<ListDeliveriesQuery>,
) -> Result<impl IntoResponse, AdminApiError> {
    let limit = clamp_limit(query.limit);
    let items = state
        .store
        .list_deliveries(DeliveryFilter {
            status: Some(DeliveryStatus::Dead),
            endpoint_id: query.endpoint_id,
            event_contains: query.event,
            cursor: query.cursor,
            limit,
        })
        .await?;

    let next_cursor = (items.len() as i64 == limit)
        .then(|| items.last().map(|d| d.id))
        .flatten();
    Ok(Json(DeliveryPage {
        items: items.iter().map(delivery_to_response).collect(),
        next_cursor,
    }))
}
