//! In-memory store for tests and embedded use.

use std::collections::{HashMap, HashSet};

use hookrelay_sdk::objects::EventKind;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entities::delivery::{AttemptLog, NewDelivery, WebhookDelivery};
use crate::entities::endpoint::{EndpointInsert, EndpointUpdate, WebhookEndpoint};
use crate::entities::{AttemptStatus, DeliveryStatus};

use super::{AttemptRecord, DeliveryFilter, StoreError, WebhookStore};

#[derive(Default)]
struct Inner {
    endpoints: HashMap<Uuid, WebhookEndpoint>,
    deliveries: HashMap<Uuid, WebhookDelivery>,
    attempts: Vec<AttemptLog>,
    processed: HashSet<String>,
    next_attempt_id: i64,
}

/// A [`WebhookStore`] backed by process memory.
///
/// A single lock over all tables keeps the claim and record operations
/// atomic, matching the transactional Postgres implementation.
#[derive(Default)]
pub struct MemoryWebhookStore {
    inner: RwLock<Inner>,
}

impl MemoryWebhookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl WebhookStore for MemoryWebhookStore {
    async fn create_endpoint(
        &self,
        insert: EndpointInsert,
    ) -> Result<WebhookEndpoint, StoreError> {
        let now = OffsetDateTime::now_utc();
        let endpoint = WebhookEndpoint {
            id: Uuid::new_v4(),
            url: insert.url,
            secret: insert.secret,
            enabled: true,
            events: insert.events,
            created_at: now,
            updated_at: now,
        };
        let mut inner = self.inner.write().await;
        inner.endpoints.insert(endpoint.id, endpoint.clone());
        Ok(endpoint)
    }

    async fn get_endpoint(&self, id: Uuid) -> Result<Option<WebhookEndpoint>, StoreError> {
        Ok(self.inner.read().await.endpoints.get(&id).cloned())
    }

    async fn list_endpoints(&self) -> Result<Vec<WebhookEndpoint>, StoreError> {
        let inner = self.inner.read().await;
        let mut endpoints: Vec<_> = inner.endpoints.values().cloned().collect();
        endpoints.sort_by_key(|e| e.created_at);
        Ok(endpoints)
    }

    async fn update_endpoint(
        &self,
        id: Uuid,
        update: EndpointUpdate,
    ) -> Result<Option<WebhookEndpoint>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(endpoint) = inner.endpoints.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(url) = update.url {
            endpoint.url = url;
        }
        if let Some(enabled) = update.enabled {
            endpoint.enabled = enabled;
        }
        if let Some(events) = update.events {
            endpoint.events = events;
        }
        endpoint.updated_at = OffsetDateTime::now_utc();
        Ok(Some(endpoint.clone()))
    }

    async fn rotate_secret(
        &self,
        id: Uuid,
        new_secret: String,
    ) -> Result<Option<WebhookEndpoint>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(endpoint) = inner.endpoints.get_mut(&id) else {
            return Ok(None);
        };
        endpoint.secret = new_secret;
        endpoint.updated_at = OffsetDateTime::now_utc();
        Ok(Some(endpoint.clone()))
    }

    async fn subscribed_endpoints(
        &self,
        event: &EventKind,
    ) -> Result<Vec<WebhookEndpoint>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .endpoints
            .values()
            .filter(|e| e.subscribes_to(event))
            .cloned()
            .collect())
    }

    async fn insert_deliveries(&self, rows: Vec<NewDelivery>) -> Result<u64, StoreError> {
        let now = OffsetDateTime::now_utc();
        let mut inner = self.inner.write().await;
        let count = rows.len() as u64;
        for row in rows {
            let delivery = WebhookDelivery {
                id: row.id,
                endpoint_id: row.endpoint_id,
                event: row.event,
                payload: row.payload,
                status: DeliveryStatus::Pending,
                attempts: 0,
                max_attempts: row.max_attempts,
                last_error: None,
                last_status_code: None,
                last_attempt_at: None,
                next_attempt: now,
                delivered_at: None,
                created_at: now,
                updated_at: now,
            };
            inner.deliveries.insert(delivery.id, delivery);
        }
        Ok(count)
    }

    async fn claim_due(
        &self,
        batch: i64,
        now: OffsetDateTime,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        let mut inner = self.inner.write().await;
        let mut due: Vec<(OffsetDateTime, Uuid)> = inner
            .deliveries
            .values()
            .filter(|d| {
                matches!(d.status, DeliveryStatus::Pending | DeliveryStatus::Failed)
                    && d.next_attempt <= now
            })
            .map(|d| (d.next_attempt, d.id))
            .collect();
        // Oldest due rows first, same order the SQL claim uses.
        due.sort();
        due.truncate(batch.max(0) as usize);

        let mut claimed = Vec::with_capacity(due.len());
        for (_, id) in due {
            if let Some(delivery) = inner.deliveries.get_mut(&id) {
                delivery.status = DeliveryStatus::Processing;
                delivery.last_attempt_at = Some(now);
                delivery.updated_at = now;
                claimed.push(delivery.clone());
            }
        }
        Ok(claimed)
    }

    async fn record_success(
        &self,
        delivery_id: Uuid,
        attempt: AttemptRecord,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let log_id = {
            inner.next_attempt_id += 1;
            inner.next_attempt_id
        };
        let Some(delivery) = inner.deliveries.get_mut(&delivery_id) else {
            return Ok(());
        };
        // Only a claimed row can complete; terminal rows stay immutable.
        if delivery.status != DeliveryStatus::Processing {
            return Ok(());
        }
        let now = OffsetDateTime::now_utc();
        delivery.status = DeliveryStatus::Success;
        delivery.attempts = attempt.attempt_number;
        delivery.last_status_code = attempt.status_code;
        delivery.last_error = None;
        delivery.delivered_at = Some(now);
        delivery.updated_at = now;
        inner.attempts.push(AttemptLog {
            id: log_id,
            delivery_id,
            attempt_number: attempt.attempt_number,
            started_at: attempt.started_at,
            status: AttemptStatus::Success,
            status_code: attempt.status_code,
            error: None,
        });
        Ok(())
    }

    async fn record_failure(
        &self,
        delivery_id: Uuid,
        attempt: AttemptRecord,
        next_attempt: Option<OffsetDateTime>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let log_id = {
            inner.next_attempt_id += 1;
            inner.next_attempt_id
        };
        let Some(delivery) = inner.deliveries.get_mut(&delivery_id) else {
            return Ok(());
        };
        if delivery.status != DeliveryStatus::Processing {
            return Ok(());
        }
        let now = OffsetDateTime::now_utc();
        delivery.attempts = attempt.attempt_number.min(delivery.max_attempts);
        delivery.last_status_code = attempt.status_code;
        delivery.last_error = attempt.error.clone();
        delivery.updated_at = now;
        match next_attempt {
            Some(at) => {
                delivery.status = DeliveryStatus::Failed;
                delivery.next_attempt = at;
            }
            None => {
                delivery.status = DeliveryStatus::Dead;
            }
        }
        inner.attempts.push(AttemptLog {
            id: log_id,
            delivery_id,
            attempt_number: attempt.attempt_number,
            started_at: attempt.started_at,
            status: AttemptStatus::Failed,
            status_code: attempt.status_code,
            error: attempt.error,
        });
        Ok(())
    }

    async fn reclaim_stuck(
        &self,
        stuck_since: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let mut reclaimed = 0;
        for delivery in inner.deliveries.values_mut() {
            if delivery.status == DeliveryStatus::Processing
                && delivery.last_attempt_at.is_some_and(|at| at < stuck_since)
            {
                delivery.status = DeliveryStatus::Failed;
                delivery.next_attempt = now;
                delivery.updated_at = now;
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }

    async fn get_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>, StoreError> {
        Ok(self.inner.read().await.deliveries.get(&id).cloned())
    }

    async fn list_deliveries(
        &self,
        filter: DeliveryFilter,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<_> = inner
            .deliveries
            .values()
            .filter(|d| filter.status.is_none_or(|s| d.status == s))
            .filter(|d| filter.endpoint_id.is_none_or(|id| d.endpoint_id == id))
            .filter(|d| {
                filter
                    .event_contains
                    .as_deref()
                    .is_none_or(|pat| d.event.as_str().contains(pat))
            })
            .filter(|d| filter.cursor.is_none_or(|cursor| d.id < cursor))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        rows.truncate(filter.limit.max(0) as usize);
        Ok(rows)
    }

    async fn list_attempts(&self, delivery_id: Uuid) -> Result<Vec<AttemptLog>, StoreError> {
        let inner = self.inner.read().await;
        let mut logs: Vec<_> = inner
            .attempts
            .iter()
            .filter(|a| a.delivery_id == delivery_id)
            .cloned()
            .collect();
        logs.sort_by_key(|a| a.attempt_number);
        Ok(logs)
    }

    async fn mark_processed(
        &self,
        remote_id: &str,
        _event: &str,
        _now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner.processed.insert(remote_id.to_owned()))
    }
}
