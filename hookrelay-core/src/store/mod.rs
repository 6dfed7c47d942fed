//! Durable storage for endpoints, deliveries, attempt logs, and inbound
//! idempotency records.
//!
//! The engine consumes storage through the [`WebhookStore`] trait so the
//! dispatcher, publisher, and verifier stay independent of the backing
//! store. [`postgres::PgWebhookStore`] is the production implementation;
//! [`memory::MemoryWebhookStore`] backs tests and embedded use.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use hookrelay_sdk::objects::EventKind;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::entities::delivery::{AttemptLog, NewDelivery, WebhookDelivery};
use crate::entities::endpoint::{EndpointInsert, EndpointUpdate, WebhookEndpoint};
use crate::entities::DeliveryStatus;

pub use memory::MemoryWebhookStore;
pub use postgres::PgWebhookStore;

/// Errors surfaced by storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Webhook tables are absent; checked once at store construction.
    #[error("webhook schema not migrated; run with --migrate first")]
    SchemaNotMigrated,
}

/// Filter and cursor for delivery listings.
///
/// Pages descend by id; `cursor` is the smallest id of the previous page.
#[derive(Debug, Clone)]
pub struct DeliveryFilter {
    pub status: Option<DeliveryStatus>,
    pub endpoint_id: Option<Uuid>,
    /// Substring match on the event kind.
    pub event_contains: Option<String>,
    pub cursor: Option<Uuid>,
    pub limit: i64,
}

impl Default for DeliveryFilter {
    fn default() -> Self {
        Self {
            status: None,
            endpoint_id: None,
            event_contains: None,
            cursor: None,
            limit: 20,
        }
    }
}

/// Per-attempt data recorded against a claimed delivery.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub attempt_number: i32,
    pub started_at: OffsetDateTime,
    pub status_code: Option<i32>,
    pub error: Option<String>,
}

/// Storage backend for the webhook delivery engine.
#[async_trait]
pub trait WebhookStore: Send + Sync {
    // -- Endpoint registry --------------------------------------------------

    async fn create_endpoint(&self, insert: EndpointInsert)
    -> Result<WebhookEndpoint, StoreError>;

    async fn get_endpoint(&self, id: Uuid) -> Result<Option<WebhookEndpoint>, StoreError>;

    async fn list_endpoints(&self) -> Result<Vec<WebhookEndpoint>, StoreError>;

    /// Partial update; `None` when the endpoint does not exist.
    async fn update_endpoint(
        &self,
        id: Uuid,
        update: EndpointUpdate,
    ) -> Result<Option<WebhookEndpoint>, StoreError>;

    /// Replace the endpoint secret, invalidating the old one immediately.
    async fn rotate_secret(
        &self,
        id: Uuid,
        new_secret: String,
    ) -> Result<Option<WebhookEndpoint>, StoreError>;

    /// Enabled endpoints subscribed to `event` (fan-out resolution).
    async fn subscribed_endpoints(
        &self,
        event: &EventKind,
    ) -> Result<Vec<WebhookEndpoint>, StoreError>;

    // -- Delivery queue -----------------------------------------------------

    /// Insert a fan-out batch in one atomic statement.
    async fn insert_deliveries(&self, rows: Vec<NewDelivery>) -> Result<u64, StoreError>;

    /// Atomically claim up to `batch` due `Pending`/`Failed` rows, oldest
    /// `next_attempt` first, moving them to `Processing`.
    ///
    /// The claim is a conditional update guarded by the prior status and
    /// the `next_attempt` condition, so concurrent dispatchers never claim
    /// the same row twice.
    async fn claim_due(
        &self,
        batch: i64,
        now: OffsetDateTime,
    ) -> Result<Vec<WebhookDelivery>, StoreError>;

    /// Record a successful attempt: the delivery becomes terminal
    /// `Success` and an attempt log row is appended.
    async fn record_success(
        &self,
        delivery_id: Uuid,
        attempt: AttemptRecord,
    ) -> Result<(), StoreError>;

    /// Record a failed attempt. With `Some(next_attempt)` the delivery
    /// returns to `Failed` and is retried then; with `None` the retry
    /// budget is exhausted and it dead-letters. Appends an attempt log.
    async fn record_failure(
        &self,
        delivery_id: Uuid,
        attempt: AttemptRecord,
        next_attempt: Option<OffsetDateTime>,
    ) -> Result<(), StoreError>;

    /// Return rows stuck in `Processing` since before `stuck_since` to
    /// `Failed`, due immediately. Recovers deliveries stranded by a
    /// crashed worker.
    async fn reclaim_stuck(
        &self,
        stuck_since: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Result<u64, StoreError>;

    // -- Introspection ------------------------------------------------------

    async fn get_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>, StoreError>;

    async fn list_deliveries(
        &self,
        filter: DeliveryFilter,
    ) -> Result<Vec<WebhookDelivery>, StoreError>;

    /// Attempt logs for one delivery, ordered by attempt number.
    async fn list_attempts(&self, delivery_id: Uuid) -> Result<Vec<AttemptLog>, StoreError>;

    // -- Inbound idempotency ------------------------------------------------

    /// Record an inbound delivery id. Returns `false` when the id was
    /// already present, meaning the side effect has already been applied.
    async fn mark_processed(
        &self,
        remote_id: &str,
        event: &str,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError>;
}
