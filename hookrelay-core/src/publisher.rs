//! Event fan-out: the producer-facing face of the delivery engine.

use std::convert::Infallible;
use std::sync::Arc;

use hookrelay_sdk::objects::EventKind;
use kanau::processor::Processor;
use tracing::{debug, error};
use uuid::Uuid;

use crate::entities::delivery::NewDelivery;
use crate::store::{StoreError, WebhookStore};

/// Default retry budget for newly enqueued deliveries.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Message form of [`EventPublisher::enqueue_event`].
#[derive(Debug, Clone)]
pub struct PublishEvent {
    pub event: EventKind,
    pub payload: serde_json::Value,
}

/// Turns one domain event into per-endpoint delivery rows.
///
/// The fan-out snapshot is taken here: endpoints matched at enqueue time
/// get a row each, and later subscription changes never affect rows that
/// already exist.
#[derive(Clone)]
pub struct EventPublisher {
    store: Arc<dyn WebhookStore>,
    max_attempts: i32,
}

impl EventPublisher {
    pub fn new(store: Arc<dyn WebhookStore>) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Fan an event out to every enabled endpoint subscribed to it.
    ///
    /// Best-effort by contract: storage failures are logged and swallowed
    /// so the caller's business transaction never observes them.
    pub async fn enqueue_event(&self, event: EventKind, payload: serde_json::Value) {
        if let Err(e) = self.try_enqueue(&event, payload).await {
            error!(error = %e, event = %event, "Failed to enqueue webhook deliveries");
        }
    }

    async fn try_enqueue(
        &self,
        event: &EventKind,
        payload: serde_json::Value,
    ) -> Result<(), StoreError> {
        let endpoints = self.store.subscribed_endpoints(event).await?;
        if endpoints.is_empty() {
            debug!(event = %event, "No endpoints subscribed, skipping fan-out");
            return Ok(());
        }

        let rows: Vec<NewDelivery> = endpoints
            .into_iter()
            .map(|endpoint| NewDelivery {
                id: Uuid::now_v7(),
                endpoint_id: endpoint.id,
                event: event.clone(),
                payload: payload.clone(),
                max_attempts: self.max_attempts,
            })
            .collect();

        let created = self.store.insert_deliveries(rows).await?;
        debug!(event = %event, deliveries = created, "Fanned out event");
        Ok(())
    }
}

impl Processor<PublishEvent> for EventPublisher {
    type Output = ();
    type Error = Infallible;

    async fn process(&self, message: PublishEvent) -> Result<(), Infallible> {
        self.enqueue_event(message.event, message.payload).await;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::DeliveryStatus;
    use crate::entities::endpoint::{EndpointInsert, EndpointUpdate, WebhookEndpoint};
    use crate::store::{AttemptRecord, DeliveryFilter, MemoryWebhookStore};
    use time::OffsetDateTime;

    async fn register(
        store: &MemoryWebhookStore,
        events: &[&str],
        enabled: bool,
    ) -> WebhookEndpoint {
        let endpoint = store
            .create_endpoint(EndpointInsert {
                url: "https://example.com/hooks".to_string(),
                secret: "whsec_test".to_string(),
                events: events
                    .iter()
                    .map(|e| EventKind::parse(e).unwrap())
                    .collect(),
            })
            .await
            .unwrap();
        if !enabled {
            store
                .update_endpoint(
                    endpoint.id,
                    EndpointUpdate {
                        enabled: Some(false),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        endpoint
    }

    #[tokio::test]
    async fn fan_out_creates_one_pending_row_per_subscriber() {
        let store = Arc::new(MemoryWebhookStore::new());
        register(&store, &["job.created"], true).await;
        register(&store, &["job.created", "bid.placed"], true).await;
        register(&store, &["bid.placed"], true).await; // not subscribed
        register(&store, &["job.created"], false).await; // disabled

        let publisher = EventPublisher::new(store.clone());
        publisher
            .enqueue_event(
                EventKind::parse("job.created").unwrap(),
                serde_json::json!({"jobId": 1}),
            )
            .await;

        let rows = store
            .list_deliveries(DeliveryFilter {
                limit: 100,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.status, DeliveryStatus::Pending);
            assert_eq!(row.attempts, 0);
            assert_eq!(row.max_attempts, DEFAULT_MAX_ATTEMPTS);
            assert_eq!(row.event.as_str(), "job.created");
        }
    }

    #[tokio::test]
    async fn no_subscribers_is_a_no_op() {
        let store = Arc::new(MemoryWebhookStore::new());
        let publisher = EventPublisher::new(store.clone());
        publisher
            .enqueue_event(
                EventKind::parse("job.created").unwrap(),
                serde_json::json!({}),
            )
            .await;
        let rows = store
            .list_deliveries(DeliveryFilter::default())
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    /// A store whose every operation fails, for exercising the
    /// swallow-errors contract.
    struct BrokenStore;

    #[async_trait::async_trait]
    impl WebhookStore for BrokenStore {
        async fn create_endpoint(
            &self,
            _: EndpointInsert,
        ) -> Result<WebhookEndpoint, StoreError> {
            Err(StoreError::SchemaNotMigrated)
        }
        async fn get_endpoint(
            &self,
            _: Uuid,
        ) -> Result<Option<WebhookEndpoint>, StoreError> {
            Err(StoreError::SchemaNotMigrated)
        }
        async fn list_endpoints(&self) -> Result<Vec<WebhookEndpoint>, StoreError> {
            Err(StoreError::SchemaNotMigrated)
        }
        async fn update_endpoint(
            &self,
            _: Uuid,
            _: EndpointUpdate,
        ) -> Result<Option<WebhookEndpoint>, StoreError> {
            Err(StoreError::SchemaNotMigrated)
        }
        async fn rotate_secret(
            &self,
            _: Uuid,
            _: String,
        ) -> Result<Option<WebhookEndpoint>, StoreError> {
            Err(StoreError::SchemaNotMigrated)
        }
        async fn subscribed_endpoints(
            &self,
            _: &EventKind,
        ) -> Result<Vec<WebhookEndpoint>, StoreError> {
            Err(StoreError::SchemaNotMigrated)
        }
        async fn insert_deliveries(
            &self,
            _: Vec<NewDelivery>,
        ) -> Result<u64, StoreError> {
            Err(StoreError::SchemaNotMigrated)
        }
        async fn claim_due(
            &self,
            _: i64,
            _: OffsetDateTime,
        ) -> Result<Vec<crate::entities::delivery::WebhookDelivery>, StoreError> {
            Err(StoreError::SchemaNotMigrated)
        }
        async fn record_success(
            &self,
            _: Uuid,
            _: AttemptRecord,
        ) -> Result<(), StoreError> {
            Err(StoreError::SchemaNotMigrated)
        }
        async fn record_failure(
            &self,
            _: Uuid,
            _: AttemptRecord,
            _: Option<OffsetDateTime>,
        ) -> Result<(), StoreError> {
            Err(StoreError::SchemaNotMigrated)
        }
        async fn reclaim_stuck(
            &self,
            _: OffsetDateTime,
            _: OffsetDateTime,
        ) -> Result<u64, StoreError> {
            Err(StoreError::SchemaNotMigrated)
        }
        async fn get_delivery(
            &self,
            _: Uuid,
        ) -> Result<Option<crate::entities::delivery::WebhookDelivery>, StoreError> {
            Err(StoreError::SchemaNotMigrated)
        }
        async fn list_deliveries(
            &self,
            _: DeliveryFilter,
        ) -> Result<Vec<crate::entities::delivery::WebhookDelivery>, StoreError> {
            Err(StoreError::SchemaNotMigrated)
        }
        async fn list_attempts(
            &self,
            _: Uuid,
        ) -> Result<Vec<crate::entities::delivery::AttemptLog>, StoreError> {
            Err(StoreError::SchemaNotMigrated)
        }
        async fn mark_processed(
            &self,
            _: &str,
            _: &str,
            _: OffsetDateTime,
        ) -> Result<bool, StoreError> {
            Err(StoreError::SchemaNotMigrated)
        }
    }

    #[tokio::test]
    async fn storage_failure_never_reaches_the_caller() {
        let publisher = EventPublisher::new(Arc::new(BrokenStore));
        // Returns normally; the error is logged and swallowed.
        publisher
            .enqueue_event(
                EventKind::parse("job.created").unwrap(),
                serde_json::json!({"jobId": 1}),
            )
            .await;
    }
}
