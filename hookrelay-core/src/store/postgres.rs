//! Postgres-backed [`WebhookStore`].

use hookrelay_sdk::objects::EventKind;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::entities::delivery::{AttemptLog, NewDelivery, WebhookDelivery};
use crate::entities::endpoint::{EndpointInsert, EndpointUpdate, WebhookEndpoint};
use crate::entities::{AttemptStatus, DeliveryStatus};

use super::{AttemptRecord, DeliveryFilter, StoreError, WebhookStore};

const ENDPOINT_COLUMNS: &str = "id, url, secret, enabled, events, created_at, updated_at";
const DELIVERY_COLUMNS: &str = "id, endpoint_id, event, payload, status, attempts, max_attempts, \
     last_error, last_status_code, last_attempt_at, next_attempt, delivered_at, \
     created_at, updated_at";

/// The production store. Construct it with [`PgWebhookStore::connect`],
/// which probes for the webhook schema exactly once instead of sniffing
/// per-query errors later.
#[derive(Clone)]
pub struct PgWebhookStore {
    pool: PgPool,
}

impl PgWebhookStore {
    pub async fn connect(pool: PgPool) -> Result<Self, StoreError> {
        let present: Option<String> =
            sqlx::query_scalar("SELECT to_regclass('webhook_deliveries')::text")
                .fetch_one(&pool)
                .await?;
        if present.is_none() {
            return Err(StoreError::SchemaNotMigrated);
        }
        Ok(Self { pool })
    }
}

// -- Row types --------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct EndpointRow {
    id: Uuid,
    url: String,
    secret: String,
    enabled: bool,
    events: Vec<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<EndpointRow> for WebhookEndpoint {
    fn from(row: EndpointRow) -> Self {
        WebhookEndpoint {
            id: row.id,
            url: row.url,
            secret: row.secret,
            enabled: row.enabled,
            // Rows were validated on write; anything unparseable is skipped.
            events: row
                .events
                .iter()
                .filter_map(|e| EventKind::parse(e).ok())
                .collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DeliveryRow {
    id: Uuid,
    endpoint_id: Uuid,
    event: String,
    payload: serde_json::Value,
    status: DeliveryStatus,
    attempts: i32,
    max_attempts: i32,
    last_error: Option<String>,
    last_status_code: Option<i32>,
    last_attempt_at: Option<OffsetDateTime>,
    next_attempt: OffsetDateTime,
    delivered_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<DeliveryRow> for WebhookDelivery {
    type Error = StoreError;

    fn try_from(row: DeliveryRow) -> Result<Self, StoreError> {
        let event = EventKind::parse(&row.event)
            .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))?;
        Ok(WebhookDelivery {
            id: row.id,
            endpoint_id: row.endpoint_id,
            event,
            payload: row.payload,
            status: row.status,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            last_error: row.last_error,
            last_status_code: row.last_status_code,
            last_attempt_at: row.last_attempt_at,
            next_attempt: row.next_attempt,
            delivered_at: row.delivered_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AttemptLogRow {
    id: i64,
    delivery_id: Uuid,
    attempt_number: i32,
    started_at: OffsetDateTime,
    status: AttemptStatus,
    status_code: Option<i32>,
    error: Option<String>,
}

impl From<AttemptLogRow> for AttemptLog {
    fn from(row: AttemptLogRow) -> Self {
        AttemptLog {
            id: row.id,
            delivery_id: row.delivery_id,
            attempt_number: row.attempt_number,
            started_at: row.started_at,
            status: row.status,
            status_code: row.status_code,
            error: row.error,
        }
    }
}

fn event_strings(events: &[EventKind]) -> Vec<String> {
    events.iter().map(|e| e.as_str().to_owned()).collect()
}

// -- Store implementation ---------------------------------------------------

#[async_trait::async_trait]
impl WebhookStore for PgWebhookStore {
    #[tracing::instrument(skip_all, err, name = "SQL:CreateEndpoint")]
    async fn create_endpoint(
        &self,
        insert: EndpointInsert,
    ) -> Result<WebhookEndpoint, StoreError> {
        let row: EndpointRow = sqlx::query_as(&format!(
            "INSERT INTO webhook_endpoints (id, url, secret, enabled, events) \
             VALUES ($1, $2, $3, true, $4) \
             RETURNING {ENDPOINT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&insert.url)
        .bind(&insert.secret)
        .bind(event_strings(&insert.events))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    #[tracing::instrument(skip_all, err, name = "SQL:GetEndpoint")]
    async fn get_endpoint(&self, id: Uuid) -> Result<Option<WebhookEndpoint>, StoreError> {
        let row: Option<EndpointRow> = sqlx::query_as(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM webhook_endpoints WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    #[tracing::instrument(skip_all, err, name = "SQL:ListEndpoints")]
    async fn list_endpoints(&self) -> Result<Vec<WebhookEndpoint>, StoreError> {
        let rows: Vec<EndpointRow> = sqlx::query_as(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM webhook_endpoints ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(skip_all, err, name = "SQL:UpdateEndpoint")]
    async fn update_endpoint(
        &self,
        id: Uuid,
        update: EndpointUpdate,
    ) -> Result<Option<WebhookEndpoint>, StoreError> {
        let mut builder =
            sqlx::QueryBuilder::new("UPDATE webhook_endpoints SET updated_at = now()");
        if let Some(url) = update.url {
            builder.push(", url = ").push_bind(url);
        }
        if let Some(enabled) = update.enabled {
            builder.push(", enabled = ").push_bind(enabled);
        }
        if let Some(events) = update.events {
            builder.push(", events = ").push_bind(event_strings(&events));
        }
        builder.push(" WHERE id = ").push_bind(id);
        builder.push(&format!(" RETURNING {ENDPOINT_COLUMNS}"));

        let row: Option<EndpointRow> = builder
            .build_query_as()
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    #[tracing::instrument(skip_all, err, name = "SQL:RotateEndpointSecret")]
    async fn rotate_secret(
        &self,
        id: Uuid,
        new_secret: String,
    ) -> Result<Option<WebhookEndpoint>, StoreError> {
        let row: Option<EndpointRow> = sqlx::query_as(&format!(
            "UPDATE webhook_endpoints SET secret = $2, updated_at = now() \
             WHERE id = $1 \
             RETURNING {ENDPOINT_COLUMNS}"
        ))
        .bind(id)
        .bind(new_secret)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    #[tracing::instrument(skip_all, err, name = "SQL:SubscribedEndpoints")]
    async fn subscribed_endpoints(
        &self,
        event: &EventKind,
    ) -> Result<Vec<WebhookEndpoint>, StoreError> {
        let rows: Vec<EndpointRow> = sqlx::query_as(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM webhook_endpoints \
             WHERE enabled AND $1 = ANY(events)"
        ))
        .bind(event.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(skip_all, err, name = "SQL:InsertDeliveries")]
    async fn insert_deliveries(&self, rows: Vec<NewDelivery>) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut builder = sqlx::QueryBuilder::new(
            "INSERT INTO webhook_deliveries (id, endpoint_id, event, payload, max_attempts) ",
        );
        builder.push_values(rows, |mut b, row| {
            b.push_bind(row.id)
                .push_bind(row.endpoint_id)
                .push_bind(row.event.as_str().to_owned())
                .push_bind(row.payload)
                .push_bind(row.max_attempts);
        });

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip_all, err, name = "SQL:ClaimDueDeliveries")]
    async fn claim_due(
        &self,
        batch: i64,
        now: OffsetDateTime,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        // SKIP LOCKED keeps concurrent dispatchers from claiming the same
        // rows; the status guard keeps the claim conditional.
        let rows: Vec<DeliveryRow> = sqlx::query_as(
            "UPDATE webhook_deliveries AS d \
             SET status = 'processing', last_attempt_at = $1, updated_at = $1 \
             WHERE d.id IN ( \
                 SELECT id FROM webhook_deliveries \
                 WHERE status IN ('pending', 'failed') AND next_attempt <= $1 \
                 ORDER BY next_attempt ASC \
                 LIMIT $2 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING d.id, d.endpoint_id, d.event, d.payload, d.status, d.attempts, \
                       d.max_attempts, d.last_error, d.last_status_code, d.last_attempt_at, \
                       d.next_attempt, d.delivered_at, d.created_at, d.updated_at",
        )
        .bind(now)
        .bind(batch)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[tracing::instrument(skip_all, err, name = "SQL:RecordDeliverySuccess")]
    async fn record_success(
        &self,
        delivery_id: Uuid,
        attempt: AttemptRecord,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE webhook_deliveries \
             SET status = 'success', attempts = $2, last_status_code = $3, \
                 last_error = NULL, delivered_at = $4, updated_at = $4 \
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(delivery_id)
        .bind(attempt.attempt_number)
        .bind(attempt.status_code)
        .bind(OffsetDateTime::now_utc())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 1 {
            sqlx::query(
                "INSERT INTO webhook_attempt_logs \
                 (delivery_id, attempt_number, started_at, status, status_code) \
                 VALUES ($1, $2, $3, 'success', $4)",
            )
            .bind(delivery_id)
            .bind(attempt.attempt_number)
            .bind(attempt.started_at)
            .bind(attempt.status_code)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip_all, err, name = "SQL:RecordDeliveryFailure")]
    async fn record_failure(
        &self,
        delivery_id: Uuid,
        attempt: AttemptRecord,
        next_attempt: Option<OffsetDateTime>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = match next_attempt {
            Some(at) => {
                sqlx::query(
                    "UPDATE webhook_deliveries \
                     SET status = 'failed', attempts = LEAST($2, max_attempts), \
                         last_status_code = $3, last_error = $4, \
                         next_attempt = $5, updated_at = $6 \
                     WHERE id = $1 AND status = 'processing'",
                )
                .bind(delivery_id)
                .bind(attempt.attempt_number)
                .bind(attempt.status_code)
                .bind(&attempt.error)
                .bind(at)
                .bind(OffsetDateTime::now_utc())
                .execute(&mut *tx)
                .await?
                .rows_affected()
            }
            None => {
                sqlx::query(
                    "UPDATE webhook_deliveries \
                     SET status = 'dead', attempts = LEAST($2, max_attempts), \
                         last_status_code = $3, last_error = $4, updated_at = $5 \
                     WHERE id = $1 AND status = 'processing'",
                )
                .bind(delivery_id)
                .bind(attempt.attempt_number)
                .bind(attempt.status_code)
                .bind(&attempt.error)
                .bind(OffsetDateTime::now_utc())
                .execute(&mut *tx)
                .await?
                .rows_affected()
            }
        };

        if updated == 1 {
            sqlx::query(
                "INSERT INTO webhook_attempt_logs \
                 (delivery_id, attempt_number, started_at, status, status_code, error) \
                 VALUES ($1, $2, $3, 'failed', $4, $5)",
            )
            .bind(delivery_id)
            .bind(attempt.attempt_number)
            .bind(attempt.started_at)
            .bind(attempt.status_code)
            .bind(&attempt.error)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip_all, err, name = "SQL:ReclaimStuckDeliveries")]
    async fn reclaim_stuck(
        &self,
        stuck_since: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE webhook_deliveries \
             SET status = 'failed', next_attempt = $2, updated_at = $2 \
             WHERE status = 'processing' AND last_attempt_at < $1",
        )
        .bind(stuck_since)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip_all, err, name = "SQL:GetDelivery")]
    async fn get_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>, StoreError> {
        let row: Option<DeliveryRow> = sqlx::query_as(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    #[tracing::instrument(skip_all, err, name = "SQL:ListDeliveries")]
    async fn list_deliveries(
        &self,
        filter: DeliveryFilter,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        let mut builder = sqlx::QueryBuilder::new(format!(
            "SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries WHERE true"
        ));
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(endpoint_id) = filter.endpoint_id {
            builder.push(" AND endpoint_id = ").push_bind(endpoint_id);
        }
        if let Some(pattern) = filter.event_contains {
            builder
                .push(" AND event ILIKE ")
                .push_bind(format!("%{pattern}%"));
        }
        if let Some(cursor) = filter.cursor {
            builder.push(" AND id < ").push_bind(cursor);
        }
        builder.push(" ORDER BY id DESC LIMIT ").push_bind(filter.limit);

        let rows: Vec<DeliveryRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[tracing::instrument(skip_all, err, name = "SQL:ListAttemptLogs")]
    async fn list_attempts(&self, delivery_id: Uuid) -> Result<Vec<AttemptLog>, StoreError> {
        let rows: Vec<AttemptLogRow> = sqlx::query_as(
            "SELECT id, delivery_id, attempt_number, started_at, status, status_code, error \
             FROM webhook_attempt_logs \
             WHERE delivery_id = $1 \
             ORDER BY attempt_number ASC",
        )
        .bind(delivery_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(skip_all, err, name = "SQL:MarkInboundProcessed")]
    async fn mark_processed(
        &self,
        remote_id: &str,
        event: &str,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        // The primary key makes replay detection durable across restarts
        // and visible to every instance.
        let result = sqlx::query(
            "INSERT INTO processed_webhooks (remote_id, event, received_at) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (remote_id) DO NOTHING",
        )
        .bind(remote_id)
        .bind(event)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
