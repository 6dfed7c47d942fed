//! Delivery and attempt log types for the admin API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::EventKind;

/// Delivery status for API responses.
///
/// This is the API/DTO version without sqlx::Type. For database
/// operations, use the version in `hookrelay-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Dead,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Processing => write!(f, "processing"),
            DeliveryStatus::Success => write!(f, "success"),
            DeliveryStatus::Failed => write!(f, "failed"),
            DeliveryStatus::Dead => write!(f, "dead"),
        }
    }
}

/// Outcome of a single send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Success,
    Failed,
}

/// One delivery row as exposed by the admin API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResponse {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub event: EventKind,
    pub payload: serde_json::Value,
    pub status: DeliveryStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub last_status_code: Option<i32>,
    pub last_attempt_at: Option<i64>,
    pub next_attempt: i64,
    pub delivered_at: Option<i64>,
    pub created_at: i64,
}

/// One attempt log row as exposed by the admin API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptLogResponse {
    pub attempt_number: i32,
    pub started_at: i64,
    pub status: AttemptStatus,
    pub status_code: Option<i32>,
    pub error: Option<String>,
}

/// A delivery together with its ordered attempt history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryDetailResponse {
    pub delivery: DeliveryResponse,
    pub attempts: Vec<AttemptLogResponse>,
}

/// Query parameters for listing deliveries.
///
/// Pagination is cursor-based: pass the smallest `id` of the previous page
/// as `cursor` to fetch the next page (ids descend, v7 UUIDs are
/// time-ordered).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListDeliveriesQuery {
    pub status: Option<DeliveryStatus>,
    pub endpoint_id: Option<Uuid>,
    /// Substring match on the event kind.
    pub event: Option<String>,
    pub cursor: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Response to requeueing a dead-lettered delivery: the id of the fresh
/// pending clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequeueResponse {
    pub id: Uuid,
}

/// One page of deliveries plus the cursor for the next page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPage {
    pub items: Vec<DeliveryResponse>,
    pub next_cursor: Option<Uuid>,
}

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

/// Clamp a requested page size to safe bounds.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(None), 20);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-5)), 1);
        assert_eq!(clamp_limit(Some(1000)), 100);
        assert_eq!(clamp_limit(Some(42)), 42);
    }
}
