use axum::{Json, extract::Query, response::IntoResponse};
use hookrelay_core::store::DeliveryFilter;
use hookrelay_sdk::objects::{DeliveryPage, ListDeliveriesQuery, clamp_limit};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::{AdminApiError, delivery_to_response};

/// `GET /deliveries` – list deliveries with filters and cursor pagination.
pub async fn list_deliveries(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Query(query): Query<ListDeliveriesQuery>,
) -> Result<impl IntoResponse, AdminApiError> {
    let limit = clamp_limit(query.limit);
    let items = state
        .store
        .list_deliveries(DeliveryFilter {
            status: query.status.map(Into::into),
            endpoint_id: query.endpoint_id,
            event_contains: query.event,
            cursor: query.cursor,
            limit,
        })
        .await?;

    // A full page means there may be more; the cursor is the smallest id
    // returned (ids descend).
    let next_cursor = (items.len() as i64 == limit)
        .then(|| items.last().map(|d| d.id))
        .flatten();
    Ok(Json(DeliveryPage {
        items: items.iter().map(delivery_to_response).collect(),
        next_cursor,
    }))
}
