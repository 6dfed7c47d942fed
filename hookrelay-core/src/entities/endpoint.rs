use hookrelay_sdk::objects::{EventKind, EventKindError};
use time::OffsetDateTime;
use uuid::Uuid;

/// A registered webhook destination.
///
/// The `secret` field is store-internal: it is handed to the signer at
/// send time and returned to the operator exactly once at creation or
/// rotation, never by any read API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEndpoint {
    pub id: Uuid,
    pub url: String,
    pub secret: String,
    pub enabled: bool,
    pub events: Vec<EventKind>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl WebhookEndpoint {
    /// Subscription check used by the fan-out step.
    pub fn subscribes_to(&self, event: &EventKind) -> bool {
        self.enabled && self.events.contains(event)
    }
}

/// Data for inserting a new endpoint.
#[derive(Debug, Clone)]
pub struct EndpointInsert {
    pub url: String,
    pub secret: String,
    pub events: Vec<EventKind>,
}

/// Partial update for an endpoint. Fields left `None` are untouched.
#[derive(Debug, Clone, Default)]
pub struct EndpointUpdate {
    pub url: Option<String>,
    pub enabled: Option<bool>,
    pub events: Option<Vec<EventKind>>,
}

impl EndpointUpdate {
    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.enabled.is_none() && self.events.is_none()
    }
}

/// Errors from endpoint input validation.
#[derive(Debug, thiserror::Error)]
pub enum EndpointValidationError {
    #[error("url must not be empty")]
    EmptyUrl,
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    Events(#[from] EventKindError),
}

/// Validate and normalize an endpoint URL.
pub fn validate_endpoint_url(raw: &str) -> Result<String, EndpointValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EndpointValidationError::EmptyUrl);
    }
    let parsed = url::Url::parse(trimmed)?;
    Ok(parsed.into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn endpoint(enabled: bool, events: &[&str]) -> WebhookEndpoint {
        let now = OffsetDateTime::now_utc();
        WebhookEndpoint {
            id: Uuid::new_v4(),
            url: "https://example.com/hooks".to_string(),
            secret: "whsec_x".to_string(),
            enabled,
            events: events.iter().map(|e| EventKind::parse(e).unwrap()).collect(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn subscription_requires_enabled_and_membership() {
        let kind = EventKind::parse("job.created").unwrap();
        assert!(endpoint(true, &["job.created", "bid.placed"]).subscribes_to(&kind));
        assert!(!endpoint(false, &["job.created"]).subscribes_to(&kind));
        assert!(!endpoint(true, &["bid.placed"]).subscribes_to(&kind));
    }

    #[test]
    fn url_validation() {
        assert!(matches!(
            validate_endpoint_url("  "),
            Err(EndpointValidationError::EmptyUrl)
        ));
        assert!(validate_endpoint_url("not a url").is_err());
        assert_eq!(
            validate_endpoint_url("https://example.com/hooks").unwrap(),
            "https://example.com/hooks"
        );
    }
}
