//! Signature algorithm and verification for Hookrelay webhooks.
//!
//! Every webhook leaving (or entering) the system is signed with
//! HMAC-SHA256 over a canonical, version-tagged byte sequence:
//!
//! ```text
//! "v1." + {unix_timestamp_seconds} + "." + {event} + "." + {raw_json_body}
//! ```
//!
//! The signature travels in the `Hookrelay-Signature` header as
//! `v1={64 lowercase hex chars}`, alongside headers carrying the delivery
//! id, event name, and timestamp. Receivers must recompute the HMAC over
//! the exact bytes read off the wire, since re-serializing the body can
//! reorder JSON keys and change the digest.

/// Header name for the HMAC signature (`v1={hex}`).
pub const SIGNATURE_HEADER: &str = "Hookrelay-Signature";

/// Header name carrying the delivery id (the receiver's idempotency key).
pub const DELIVERY_ID_HEADER: &str = "Hookrelay-Delivery-Id";

/// Header name carrying the event kind.
pub const EVENT_HEADER: &str = "Hookrelay-Event";

/// Header name carrying the unix timestamp (integer seconds).
pub const TIMESTAMP_HEADER: &str = "Hookrelay-Timestamp";

/// Header name for admin API authentication (plaintext admin secret).
pub const ADMIN_AUTH_HEADER: &str = "Hookrelay-Admin-Authorization";

/// Scheme tag prefixing both the canonical string and the header value.
pub const SIGNATURE_SCHEME: &str = "v1";

/// Default maximum clock skew between sender and receiver (seconds).
pub const DEFAULT_TOLERANCE: i64 = 5 * 60;

/// Hex length of an HMAC-SHA256 signature.
const SIGNATURE_HEX_LEN: usize = 64;

/// Errors produced by signature operations.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid signature header format")]
    InvalidFormat,
    #[error("invalid signature")]
    SignatureMismatch,
    #[error("timestamp outside the allowed window")]
    Stale,
}

impl From<ring::error::Unspecified> for SignatureError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

/// Assemble the canonical byte sequence the HMAC is computed over.
pub fn canonical_message(timestamp: i64, event: &str, body: &[u8]) -> Vec<u8> {
    let timestamp = timestamp.to_string();
    let mut message = Vec::with_capacity(
        SIGNATURE_SCHEME.len() + timestamp.len() + event.len() + body.len() + 3,
    );
    message.extend_from_slice(SIGNATURE_SCHEME.as_bytes());
    message.push(b'.');
    message.extend_from_slice(timestamp.as_bytes());
    message.push(b'.');
    message.extend_from_slice(event.as_bytes());
    message.push(b'.');
    message.extend_from_slice(body);
    message
}

/// Sign a webhook body, returning the full `Hookrelay-Signature` header
/// value (`v1={hex}`).
pub fn sign(secret: &[u8], timestamp: i64, event: &str, body: &[u8]) -> String {
    let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret);
    let tag = ring::hmac::sign(&key, &canonical_message(timestamp, event, body));
    format!("{SIGNATURE_SCHEME}={}", hex::encode(tag.as_ref()))
}

/// Parse a `Hookrelay-Signature` header value into raw signature bytes.
///
/// The value must match `v1={64 lowercase hex chars}` exactly.
pub fn parse_signature_header(value: &str) -> Result<Vec<u8>, SignatureError> {
    let hex_part = value
        .strip_prefix(SIGNATURE_SCHEME)
        .and_then(|rest| rest.strip_prefix('='))
        .ok_or(SignatureError::InvalidFormat)?;
    if hex_part.len() != SIGNATURE_HEX_LEN
        || !hex_part
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    {
        return Err(SignatureError::InvalidFormat);
    }
    hex::decode(hex_part).map_err(|_| SignatureError::InvalidFormat)
}

/// Verify raw signature bytes against the canonical message.
///
/// The comparison is constant-time via `ring::hmac::verify`.
pub fn verify(
    secret: &[u8],
    timestamp: i64,
    event: &str,
    body: &[u8],
    signature: &[u8],
) -> Result<(), SignatureError> {
    let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret);
    ring::hmac::verify(&key, &canonical_message(timestamp, event, body), signature)?;
    Ok(())
}

/// Check that a timestamp is within `tolerance` seconds of the current
/// time, in either direction. Exactly at the boundary is accepted.
pub fn check_timestamp(timestamp: i64, tolerance: i64) -> Result<(), SignatureError> {
    check_timestamp_at(
        timestamp,
        tolerance,
        time::OffsetDateTime::now_utc().unix_timestamp(),
    )
}

/// [`check_timestamp`] against an explicit `now`.
pub fn check_timestamp_at(timestamp: i64, tolerance: i64, now: i64) -> Result<(), SignatureError> {
    if (now - timestamp).abs() > tolerance {
        return Err(SignatureError::Stale);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"whsec_test_secret";
    const BODY: &[u8] = br#"{"jobId":1,"title":"fix the roof"}"#;

    #[test]
    fn sign_verify_round_trip() {
        let header = sign(SECRET, 1_700_000_000, "job.created", BODY);
        let raw = parse_signature_header(&header).unwrap();
        assert!(verify(SECRET, 1_700_000_000, "job.created", BODY, &raw).is_ok());
    }

    #[test]
    fn mutating_any_input_invalidates() {
        let header = sign(SECRET, 1_700_000_000, "job.created", BODY);
        let raw = parse_signature_header(&header).unwrap();

        let mut mutated_body = BODY.to_vec();
        mutated_body[0] ^= 1;
        assert!(verify(SECRET, 1_700_000_000, "job.created", &mutated_body, &raw).is_err());
        assert!(verify(SECRET, 1_700_000_001, "job.created", BODY, &raw).is_err());
        assert!(verify(SECRET, 1_700_000_000, "job.updated", BODY, &raw).is_err());
        assert!(verify(b"other-secret", 1_700_000_000, "job.created", BODY, &raw).is_err());
    }

    #[test]
    fn rotated_secret_invalidates_old_signature() {
        let header = sign(b"old-secret", 1_700_000_000, "job.created", BODY);
        let raw = parse_signature_header(&header).unwrap();
        assert!(verify(b"new-secret", 1_700_000_000, "job.created", BODY, &raw).is_err());
    }

    #[test]
    fn header_format_is_strict() {
        assert!(parse_signature_header("v1=").is_err());
        assert!(parse_signature_header(&format!("v2={}", "a".repeat(64))).is_err());
        assert!(parse_signature_header(&format!("v1={}", "a".repeat(63))).is_err());
        assert!(parse_signature_header(&format!("v1={}", "A".repeat(64))).is_err());
        assert!(parse_signature_header(&format!("v1={}", "g".repeat(64))).is_err());
        assert!(parse_signature_header(&format!("v1={}", "a".repeat(64))).is_ok());
    }

    #[test]
    fn timestamp_window() {
        let now = 1_700_000_000;
        // Exactly at the tolerance boundary is accepted.
        assert!(check_timestamp_at(now - DEFAULT_TOLERANCE, DEFAULT_TOLERANCE, now).is_ok());
        assert!(check_timestamp_at(now + DEFAULT_TOLERANCE, DEFAULT_TOLERANCE, now).is_ok());
        // One second past it is not.
        assert!(check_timestamp_at(now - DEFAULT_TOLERANCE - 1, DEFAULT_TOLERANCE, now).is_err());
        assert!(check_timestamp_at(now + DEFAULT_TOLERANCE + 1, DEFAULT_TOLERANCE, now).is_err());
    }
}
