//! Inbound webhook verification.
//!
//! The symmetric counterpart to the dispatcher's signer: when this system
//! consumes webhooks from an external source, every request is checked
//! for header shape, timestamp freshness, and a constant-time HMAC match
//! over the raw body bytes, then deduplicated against the durable
//! processed-record table.

use std::sync::Arc;

use hookrelay_sdk::signature::{self, DEFAULT_TOLERANCE};
use kanau::processor::Processor;
use time::OffsetDateTime;
use tracing::debug;

use crate::store::{StoreError, WebhookStore};

/// Raw material of an inbound webhook request: the four contract headers
/// plus the body bytes exactly as received.
#[derive(Debug, Clone)]
pub struct InboundWebhook {
    pub delivery_id: String,
    pub event: String,
    pub timestamp: String,
    pub signature: String,
    pub body: Vec<u8>,
}

/// Verification outcome for an authentic inbound webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// First sighting of this delivery id; apply the side effect.
    Accepted,
    /// Replay of an already-processed id; report success, skip the side
    /// effect.
    Duplicate,
}

/// Errors from inbound verification.
///
/// Malformed input and stale timestamps are the caller's fault (400);
/// a signature mismatch is an authentication failure (401).
#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("invalid signature header format")]
    MalformedSignature,
    #[error("invalid timestamp header")]
    MalformedTimestamp,
    #[error("timestamp outside the allowed window")]
    StaleTimestamp,
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validates and deduplicates inbound webhooks.
pub struct InboundVerifier {
    store: Arc<dyn WebhookStore>,
    secret: Box<[u8]>,
    tolerance: i64,
}

impl InboundVerifier {
    pub fn new(store: Arc<dyn WebhookStore>, secret: impl Into<Box<[u8]>>) -> Self {
        Self {
            store,
            secret: secret.into(),
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: i64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Verify one inbound webhook and record its delivery id.
    ///
    /// Check order matters for the response codes: format first, then
    /// freshness, then the HMAC, and the idempotency lookup only after
    /// the request has proven authentic.
    pub async fn verify(&self, webhook: &InboundWebhook) -> Result<InboundOutcome, InboundError> {
        let raw_signature = signature::parse_signature_header(&webhook.signature)
            .map_err(|_| InboundError::MalformedSignature)?;
        let timestamp: i64 = webhook
            .timestamp
            .parse()
            .map_err(|_| InboundError::MalformedTimestamp)?;
        signature::check_timestamp(timestamp, self.tolerance)
            .map_err(|_| InboundError::StaleTimestamp)?;
        signature::verify(
            &self.secret,
            timestamp,
            &webhook.event,
            &webhook.body,
            &raw_signature,
        )
        .map_err(|_| InboundError::SignatureMismatch)?;

        let fresh = self
            .store
            .mark_processed(&webhook.delivery_id, &webhook.event, OffsetDateTime::now_utc())
            .await?;
        if fresh {
            Ok(InboundOutcome::Accepted)
        } else {
            debug!(
                delivery_id = %webhook.delivery_id,
                "Duplicate inbound webhook, side effect skipped"
            );
            Ok(InboundOutcome::Duplicate)
        }
    }
}

impl Processor<InboundWebhook> for InboundVerifier {
    type Output = InboundOutcome;
    type Error = InboundError;

    async fn process(&self, webhook: InboundWebhook) -> Result<InboundOutcome, InboundError> {
        self.verify(&webhook).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryWebhookStore;

    const SECRET: &[u8] = b"whsec_inbound";

    fn signed_webhook(delivery_id: &str, body: &[u8]) -> InboundWebhook {
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        InboundWebhook {
            delivery_id: delivery_id.to_string(),
            event: "job.created".to_string(),
            timestamp: timestamp.to_string(),
            signature: signature::sign(SECRET, timestamp, "job.created", body),
            body: body.to_vec(),
        }
    }

    fn verifier() -> InboundVerifier {
        InboundVerifier::new(Arc::new(MemoryWebhookStore::new()), SECRET)
    }

    #[tokio::test]
    async fn accepts_once_then_dedups() {
        let verifier = verifier();
        let webhook = signed_webhook("d-1", br#"{"jobId":1}"#);

        assert_eq!(
            verifier.verify(&webhook).await.unwrap(),
            InboundOutcome::Accepted
        );
        // Same delivery id again: still success, side effect not reapplied.
        assert_eq!(
            verifier.verify(&webhook).await.unwrap(),
            InboundOutcome::Duplicate
        );

        let other = signed_webhook("d-2", br#"{"jobId":1}"#);
        assert_eq!(
            verifier.verify(&other).await.unwrap(),
            InboundOutcome::Accepted
        );
    }

    #[tokio::test]
    async fn rejects_malformed_signature_header() {
        let verifier = verifier();
        let mut webhook = signed_webhook("d-1", b"{}");
        webhook.signature = "not-a-signature".to_string();
        assert!(matches!(
            verifier.verify(&webhook).await,
            Err(InboundError::MalformedSignature)
        ));
    }

    #[tokio::test]
    async fn rejects_non_numeric_timestamp() {
        let verifier = verifier();
        let mut webhook = signed_webhook("d-1", b"{}");
        webhook.timestamp = "soon".to_string();
        assert!(matches!(
            verifier.verify(&webhook).await,
            Err(InboundError::MalformedTimestamp)
        ));
    }

    #[tokio::test]
    async fn rejects_stale_timestamp() {
        let verifier = verifier();
        let body = b"{}";
        let stale = OffsetDateTime::now_utc().unix_timestamp() - DEFAULT_TOLERANCE - 30;
        let webhook = InboundWebhook {
            delivery_id: "d-1".to_string(),
            event: "job.created".to_string(),
            timestamp: stale.to_string(),
            signature: signature::sign(SECRET, stale, "job.created", body),
            body: body.to_vec(),
        };
        assert!(matches!(
            verifier.verify(&webhook).await,
            Err(InboundError::StaleTimestamp)
        ));
    }

    #[tokio::test]
    async fn rejects_tampered_body() {
        let verifier = verifier();
        let mut webhook = signed_webhook("d-1", br#"{"jobId":1}"#);
        webhook.body = br#"{"jobId":2}"#.to_vec();
        assert!(matches!(
            verifier.verify(&webhook).await,
            Err(InboundError::SignatureMismatch)
        ));
    }

    #[tokio::test]
    async fn rejects_wrong_secret() {
        let store: Arc<dyn WebhookStore> = Arc::new(MemoryWebhookStore::new());
        let verifier = InboundVerifier::new(store, &b"whsec_other"[..]);
        let webhook = signed_webhook("d-1", b"{}");
        assert!(matches!(
            verifier.verify(&webhook).await,
            Err(InboundError::SignatureMismatch)
        ));
    }
}
