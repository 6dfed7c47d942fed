//! Webhook verification helper for consumers.
//!
//! Convenience wrapper for services that receive Hookrelay webhooks:
//! checks header format, timestamp freshness, and the HMAC over the raw
//! body bytes. Idempotent replay suppression is the consumer's job – use
//! the delivery id as the dedup key.

use crate::signature::{self, SignatureError};

/// An inbound webhook whose signature and freshness have been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedWebhook {
    /// The sender's delivery id; use it as the idempotency key.
    pub delivery_id: String,
    pub event: String,
    pub timestamp: i64,
}

/// Verify an incoming Hookrelay webhook.
///
/// * `delivery_id`, `event`, `timestamp`, `signature` – values of the
///   corresponding request headers.
/// * `body` – the raw request body bytes, exactly as received.
/// * `secret` – the shared HMAC secret.
pub fn verify_webhook(
    delivery_id: &str,
    event: &str,
    timestamp: &str,
    signature_header: &str,
    body: &[u8],
    secret: &[u8],
    tolerance: i64,
) -> Result<VerifiedWebhook, SignatureError> {
    let raw_signature = signature::parse_signature_header(signature_header)?;
    let timestamp: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::InvalidFormat)?;
    signature::check_timestamp(timestamp, tolerance)?;
    signature::verify(secret, timestamp, event, body, &raw_signature)?;
    Ok(VerifiedWebhook {
        delivery_id: delivery_id.to_owned(),
        event: event.to_owned(),
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{DEFAULT_TOLERANCE, sign};

    #[test]
    fn verifies_a_freshly_signed_webhook() {
        let secret = b"whsec_shared";
        let body = br#"{"jobId":7}"#;
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let header = sign(secret, now, "job.created", body);

        let verified = verify_webhook(
            "d-1",
            "job.created",
            &now.to_string(),
            &header,
            body,
            secret,
            DEFAULT_TOLERANCE,
        )
        .unwrap();
        assert_eq!(verified.delivery_id, "d-1");
        assert_eq!(verified.timestamp, now);
    }

    #[test]
    fn rejects_non_numeric_timestamp() {
        let secret = b"whsec_shared";
        let header = sign(secret, 0, "job.created", b"{}");
        let result = verify_webhook(
            "d-1",
            "job.created",
            "yesterday",
            &header,
            b"{}",
            secret,
            DEFAULT_TOLERANCE,
        );
        assert!(matches!(result, Err(SignatureError::InvalidFormat)));
    }
}
