use hookrelay_sdk::objects::EventKind;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{AttemptStatus, DeliveryStatus};

/// One attempt-tracked unit: "this event must reach this endpoint".
///
/// Created by the fan-out step with a snapshot of the subscription set;
/// later endpoint changes never retroactively affect existing rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub event: EventKind,
    pub payload: serde_json::Value,
    pub status: DeliveryStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub last_status_code: Option<i32>,
    pub last_attempt_at: Option<OffsetDateTime>,
    pub next_attempt: OffsetDateTime,
    pub delivered_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Data for inserting one delivery row.
///
/// The caller mints the (v7) id so a fan-out batch can be written in a
/// single statement.
#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub event: EventKind,
    pub payload: serde_json::Value,
    pub max_attempts: i32,
}

/// Append-only audit record of one send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptLog {
    pub id: i64,
    pub delivery_id: Uuid,
    pub attempt_number: i32,
    pub started_at: OffsetDateTime,
    pub status: AttemptStatus,
    pub status_code: Option<i32>,
    pub error: Option<String>,
}
