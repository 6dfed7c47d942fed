//! WebhookDispatcher processor.
//!
//! The WebhookDispatcher is responsible for:
//! - Claiming due deliveries from the store on a fixed-interval tick
//! - Signing the exact outbound bytes and POSTing them to the endpoint
//! - Recording outcomes and scheduling retries with exponential backoff
//! - Dead-lettering deliveries that exhaust their retry budget
//! - Reclaiming rows stranded in `processing` by a crashed worker
//!
//! The loop runs decoupled from request handling and stops cooperatively
//! via a `watch` shutdown channel; in-flight sends it abandons are picked
//! up again by the liveness sweep.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use hookrelay_sdk::signature;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::entities::delivery::WebhookDelivery;
use crate::entities::endpoint::WebhookEndpoint;
use crate::store::{AttemptRecord, WebhookStore};
use crate::utils::backoff::retry_backoff;

/// Tuning for the dispatcher loop.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Interval between polling ticks.
    pub poll_interval: Duration,
    /// Maximum deliveries claimed per tick.
    pub batch_size: i64,
    /// Concurrent sends within one tick.
    pub concurrency: usize,
    /// Hard timeout per outbound request; exceeding it is a failed attempt.
    pub request_timeout: Duration,
    /// Base delay of the exponential retry schedule.
    pub backoff_base: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            batch_size: 32,
            concurrency: 8,
            request_timeout: Duration::from_secs(5),
            backoff_base: Duration::from_secs(30),
        }
    }
}

/// Outcome details of one failed send.
struct SendFailure {
    status_code: Option<i32>,
    message: String,
}

/// WebhookDispatcher drives claimed deliveries to their endpoints.
pub struct WebhookDispatcher {
    store: Arc<dyn WebhookStore>,
    http_client: reqwest::Client,
    config: DispatcherConfig,
}

impl WebhookDispatcher {
    pub fn new(store: Arc<dyn WebhookStore>, config: DispatcherConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            store,
            http_client,
            config,
        }
    }

    /// Run the dispatcher until shutdown is signaled.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("WebhookDispatcher started");

        loop {
            tokio::select! {
                biased;

                // Check for shutdown; a dropped sender counts as one.
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("WebhookDispatcher received shutdown signal");
                        break;
                    }
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {
                    self.tick().await;
                }
            }
        }

        info!("WebhookDispatcher shutdown complete");
    }

    /// One polling cycle: sweep stuck rows, claim a due batch, send it
    /// with bounded concurrency.
    pub async fn tick(&self) {
        let now = OffsetDateTime::now_utc();

        let stuck_since = now - self.config.request_timeout * 2;
        match self.store.reclaim_stuck(stuck_since, now).await {
            Ok(0) => {}
            Ok(reclaimed) => {
                warn!(reclaimed, "Reclaimed deliveries stuck in processing");
            }
            Err(e) => {
                error!(error = %e, "Failed to reclaim stuck deliveries");
            }
        }

        let batch = match self.store.claim_due(self.config.batch_size, now).await {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, "Failed to claim due deliveries");
                return;
            }
        };
        if batch.is_empty() {
            return;
        }
        debug!(claimed = batch.len(), "Claimed due deliveries");

        futures_util::stream::iter(batch)
            .for_each_concurrent(self.config.concurrency, |delivery| self.deliver(delivery))
            .await;
    }

    /// Send one claimed delivery and record its outcome.
    ///
    /// Every failure is recorded against this delivery alone; nothing
    /// here aborts the rest of the batch.
    async fn deliver(&self, delivery: WebhookDelivery) {
        let started_at = OffsetDateTime::now_utc();
        let attempt_number = delivery.attempts + 1;

        // The endpoint is fetched per send so a rotated secret takes
        // effect immediately.
        let endpoint = match self.store.get_endpoint(delivery.endpoint_id).await {
            Ok(Some(endpoint)) => endpoint,
            Ok(None) => {
                self.record_failure(
                    &delivery,
                    attempt_number,
                    started_at,
                    None,
                    "endpoint no longer exists".to_string(),
                )
                .await;
                return;
            }
            Err(e) => {
                // Leave the row in processing; the liveness sweep will
                // reclaim it once the store recovers.
                error!(
                    delivery_id = %delivery.id,
                    error = %e,
                    "Failed to load endpoint for delivery"
                );
                return;
            }
        };

        let body = match serde_json::to_vec(&delivery.payload) {
            Ok(body) => body,
            Err(e) => {
                self.record_failure(
                    &delivery,
                    attempt_number,
                    started_at,
                    None,
                    format!("payload serialization error: {e}"),
                )
                .await;
                return;
            }
        };

        match self.send(&endpoint, &delivery, &body).await {
            Ok(status_code) => {
                let record = AttemptRecord {
                    attempt_number,
                    started_at,
                    status_code: Some(status_code),
                    error: None,
                };
                if let Err(e) = self.store.record_success(delivery.id, record).await {
                    error!(
                        delivery_id = %delivery.id,
                        error = %e,
                        "Failed to record delivery success"
                    );
                    return;
                }
                info!(
                    delivery_id = %delivery.id,
                    endpoint_id = %endpoint.id,
                    attempt = attempt_number,
                    "Webhook delivered"
                );
            }
            Err(failure) => {
                self.record_failure(
                    &delivery,
                    attempt_number,
                    started_at,
                    failure.status_code,
                    failure.message,
                )
                .await;
            }
        }
    }

    /// Sign and POST the payload bytes to the endpoint.
    async fn send(
        &self,
        endpoint: &WebhookEndpoint,
        delivery: &WebhookDelivery,
        body: &[u8],
    ) -> Result<i32, SendFailure> {
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        let signature_value = signature::sign(
            endpoint.secret.as_bytes(),
            timestamp,
            delivery.event.as_str(),
            body,
        );

        let response = self
            .http_client
            .post(&endpoint.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(signature::DELIVERY_ID_HEADER, delivery.id.to_string())
            .header(signature::EVENT_HEADER, delivery.event.as_str())
            .header(signature::TIMESTAMP_HEADER, timestamp.to_string())
            .header(signature::SIGNATURE_HEADER, signature_value)
            .body(body.to_vec())
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                Ok(i32::from(response.status().as_u16()))
            }
            Ok(response) => Err(SendFailure {
                status_code: Some(i32::from(response.status().as_u16())),
                message: format!("endpoint returned status {}", response.status()),
            }),
            Err(e) if e.is_timeout() => Err(SendFailure {
                status_code: None,
                message: format!(
                    "request timed out after {:?}",
                    self.config.request_timeout
                ),
            }),
            Err(e) => Err(SendFailure {
                status_code: None,
                message: format!("request error: {e}"),
            }),
        }
    }

    /// Record a failed attempt: back to `failed` with the next retry
    /// time, or `dead` once the budget is exhausted.
    async fn record_failure(
        &self,
        delivery: &WebhookDelivery,
        attempt_number: i32,
        started_at: OffsetDateTime,
        status_code: Option<i32>,
        message: String,
    ) {
        let next_attempt = if attempt_number >= delivery.max_attempts {
            None
        } else {
            let delay = retry_backoff(self.config.backoff_base, attempt_number as u32);
            Some(OffsetDateTime::now_utc() + delay)
        };

        match next_attempt {
            Some(_) => warn!(
                delivery_id = %delivery.id,
                attempt = attempt_number,
                error = %message,
                "Webhook delivery failed, will retry"
            ),
            None => warn!(
                delivery_id = %delivery.id,
                attempts = attempt_number,
                error = %message,
                "Webhook delivery dead-lettered"
            ),
        }

        let record = AttemptRecord {
            attempt_number,
            started_at,
            status_code,
            error: Some(message),
        };
        if let Err(e) = self
            .store
            .record_failure(delivery.id, record, next_attempt)
            .await
        {
            error!(
                delivery_id = %delivery.id,
                error = %e,
                "Failed to record delivery failure"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::entities::endpoint::EndpointInsert;
    use crate::entities::{AttemptStatus, DeliveryStatus};
    use crate::publisher::EventPublisher;
    use crate::store::{DeliveryFilter, MemoryWebhookStore};
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use hookrelay_sdk::objects::EventKind;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    #[derive(Clone)]
    struct CapturedRequest {
        headers: HashMap<String, String>,
        body: Vec<u8>,
    }

    #[derive(Clone, Default)]
    struct ScriptedEndpoint {
        script: Arc<Mutex<VecDeque<u16>>>,
        requests: Arc<Mutex<Vec<CapturedRequest>>>,
    }

    impl ScriptedEndpoint {
        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request(&self, index: usize) -> CapturedRequest {
            self.requests.lock().unwrap()[index].clone()
        }
    }

    async fn scripted_handler(
        State(state): State<ScriptedEndpoint>,
        headers: HeaderMap,
        body: Bytes,
    ) -> StatusCode {
        let mut captured = HashMap::new();
        for name in [
            signature::DELIVERY_ID_HEADER,
            signature::EVENT_HEADER,
            signature::TIMESTAMP_HEADER,
            signature::SIGNATURE_HEADER,
        ] {
            if let Some(value) = headers.get(name) {
                captured.insert(name.to_string(), value.to_str().unwrap().to_string());
            }
        }
        state.requests.lock().unwrap().push(CapturedRequest {
            headers: captured,
            body: body.to_vec(),
        });
        let code = state.script.lock().unwrap().pop_front().unwrap_or(500);
        StatusCode::from_u16(code).unwrap()
    }

    /// Spawn a local endpoint that answers with the scripted status codes
    /// in order (then 500s) and captures every request.
    async fn spawn_endpoint(script: Vec<u16>) -> (String, ScriptedEndpoint) {
        let state = ScriptedEndpoint {
            script: Arc::new(Mutex::new(script.into())),
            requests: Arc::default(),
        };
        let app = Router::new()
            .route("/hooks", post(scripted_handler))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/hooks"), state)
    }

    fn test_config() -> DispatcherConfig {
        DispatcherConfig {
            // Zero base so retried rows are due again on the next tick.
            backoff_base: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    async fn setup(
        url: &str,
        secret: &str,
    ) -> (Arc<MemoryWebhookStore>, WebhookDispatcher, uuid::Uuid) {
        let store = Arc::new(MemoryWebhookStore::new());
        let endpoint = store
            .create_endpoint(EndpointInsert {
                url: url.to_string(),
                secret: secret.to_string(),
                events: vec![EventKind::parse("job.created").unwrap()],
            })
            .await
            .unwrap();
        let dispatcher = WebhookDispatcher::new(store.clone(), test_config());
        (store, dispatcher, endpoint.id)
    }

    async fn enqueue_one(store: &Arc<MemoryWebhookStore>) -> uuid::Uuid {
        let publisher = EventPublisher::new(store.clone() as Arc<dyn WebhookStore>);
        publisher
            .enqueue_event(
                EventKind::parse("job.created").unwrap(),
                serde_json::json!({"jobId": 1}),
            )
            .await;
        let rows = store
            .list_deliveries(DeliveryFilter::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, DeliveryStatus::Pending);
        rows[0].id
    }

    #[tokio::test]
    async fn delivers_with_a_verifiable_signature() {
        let (url, endpoint_state) = spawn_endpoint(vec![200]).await;
        let (store, dispatcher, _) = setup(&url, "whsec_fixed").await;
        let delivery_id = enqueue_one(&store).await;

        dispatcher.tick().await;

        let delivery = store.get_delivery(delivery_id).await.unwrap().unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Success);
        assert_eq!(delivery.attempts, 1);
        assert_eq!(delivery.last_status_code, Some(200));
        assert!(delivery.delivered_at.is_some());

        // The receiver side of the contract: recompute the HMAC over the
        // exact bytes received.
        let request = endpoint_state.request(0);
        assert_eq!(
            request.headers[signature::DELIVERY_ID_HEADER],
            delivery_id.to_string()
        );
        assert_eq!(request.headers[signature::EVENT_HEADER], "job.created");
        let timestamp: i64 = request.headers[signature::TIMESTAMP_HEADER]
            .parse()
            .unwrap();
        let raw_signature =
            signature::parse_signature_header(&request.headers[signature::SIGNATURE_HEADER])
                .unwrap();
        signature::verify(
            b"whsec_fixed",
            timestamp,
            "job.created",
            &request.body,
            &raw_signature,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn retries_until_the_endpoint_recovers() {
        // 500 on attempts 1-2, 200 on attempt 3.
        let (url, endpoint_state) = spawn_endpoint(vec![500, 500, 200]).await;
        let (store, dispatcher, _) = setup(&url, "whsec_fixed").await;
        let delivery_id = enqueue_one(&store).await;

        for _ in 0..3 {
            dispatcher.tick().await;
        }

        let delivery = store.get_delivery(delivery_id).await.unwrap().unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Success);
        assert_eq!(delivery.attempts, 3);
        assert_eq!(endpoint_state.request_count(), 3);

        let logs = store.list_attempts(delivery_id).await.unwrap();
        assert_eq!(logs.len(), 3);
        assert_eq!(
            logs.iter().map(|l| l.attempt_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(logs[0].status, AttemptStatus::Failed);
        assert_eq!(logs[0].status_code, Some(500));
        assert_eq!(logs[2].status, AttemptStatus::Success);
        assert_eq!(logs[2].status_code, Some(200));
    }

    #[tokio::test]
    async fn dead_letters_after_exhausting_the_budget() {
        // Empty script: the endpoint answers 500 forever.
        let (url, endpoint_state) = spawn_endpoint(vec![]).await;
        let (store, dispatcher, _) = setup(&url, "whsec_fixed").await;
        let delivery_id = enqueue_one(&store).await;

        for _ in 0..6 {
            dispatcher.tick().await;
        }

        let delivery = store.get_delivery(delivery_id).await.unwrap().unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Dead);
        assert_eq!(delivery.attempts, 5);
        // No sends past the budget: the dead row is never claimed again.
        assert_eq!(endpoint_state.request_count(), 5);
        assert_eq!(store.list_attempts(delivery_id).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn one_unreachable_endpoint_does_not_block_the_batch() {
        let (good_url, endpoint_state) = spawn_endpoint(vec![200]).await;
        let store = Arc::new(MemoryWebhookStore::new());
        let bad = store
            .create_endpoint(EndpointInsert {
                // Discard port: connection refused immediately.
                url: "http://127.0.0.1:9/hooks".to_string(),
                secret: "whsec_bad".to_string(),
                events: vec![EventKind::parse("job.created").unwrap()],
            })
            .await
            .unwrap();
        let good = store
            .create_endpoint(EndpointInsert {
                url: good_url,
                secret: "whsec_good".to_string(),
                events: vec![EventKind::parse("job.created").unwrap()],
            })
            .await
            .unwrap();

        let publisher = EventPublisher::new(store.clone() as Arc<dyn WebhookStore>);
        publisher
            .enqueue_event(
                EventKind::parse("job.created").unwrap(),
                serde_json::json!({"jobId": 2}),
            )
            .await;

        let dispatcher = WebhookDispatcher::new(store.clone(), test_config());
        dispatcher.tick().await;

        let rows = store
            .list_deliveries(DeliveryFilter {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        let good_row = rows.iter().find(|d| d.endpoint_id == good.id).unwrap();
        let bad_row = rows.iter().find(|d| d.endpoint_id == bad.id).unwrap();
        assert_eq!(good_row.status, DeliveryStatus::Success);
        assert_eq!(bad_row.status, DeliveryStatus::Failed);
        assert_eq!(bad_row.attempts, 1);
        assert!(bad_row.last_error.is_some());
        assert_eq!(endpoint_state.request_count(), 1);
    }

    #[tokio::test]
    async fn reads_the_rotated_secret_at_send_time() {
        let (url, endpoint_state) = spawn_endpoint(vec![200]).await;
        let (store, dispatcher, endpoint_id) = setup(&url, "whsec_old").await;
        enqueue_one(&store).await;

        // Rotation between enqueue and send: the send must use the new
        // secret, never a cached one.
        store
            .rotate_secret(endpoint_id, "whsec_new".to_string())
            .await
            .unwrap();
        dispatcher.tick().await;

        let request = endpoint_state.request(0);
        let timestamp: i64 = request.headers[signature::TIMESTAMP_HEADER]
            .parse()
            .unwrap();
        let raw_signature =
            signature::parse_signature_header(&request.headers[signature::SIGNATURE_HEADER])
                .unwrap();
        assert!(
            signature::verify(
                b"whsec_old",
                timestamp,
                "job.created",
                &request.body,
                &raw_signature
            )
            .is_err()
        );
        signature::verify(
            b"whsec_new",
            timestamp,
            "job.created",
            &request.body,
            &raw_signature,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn shuts_down_cooperatively() {
        let store = Arc::new(MemoryWebhookStore::new());
        let dispatcher = WebhookDispatcher::new(store, test_config());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(dispatcher.run(shutdown_rx));
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("dispatcher did not stop in time")
            .unwrap();
    }
}
