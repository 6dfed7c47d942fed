//! Validated event kind tags.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Maximum length of a single event kind.
pub const MAX_EVENT_KIND_LEN: usize = 100;

/// Maximum number of event kinds an endpoint may subscribe to.
pub const MAX_EVENT_KINDS_PER_ENDPOINT: usize = 50;

/// A validated event kind such as `job.created` or `bid.accepted`.
///
/// Event kinds are free-form dotted names chosen by the producing business
/// code; the only structural requirements are non-emptiness and a length
/// bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CompactString", into = "CompactString")]
pub struct EventKind(CompactString);

/// Errors from event kind validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventKindError {
    #[error("event kind must not be empty")]
    Empty,
    #[error("event kind exceeds {MAX_EVENT_KIND_LEN} characters")]
    TooLong,
    #[error("an endpoint may subscribe to at most {MAX_EVENT_KINDS_PER_ENDPOINT} event kinds")]
    TooMany,
}

impl EventKind {
    /// Validate and construct an event kind.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, EventKindError> {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            return Err(EventKindError::Empty);
        }
        if raw.len() > MAX_EVENT_KIND_LEN {
            return Err(EventKindError::TooLong);
        }
        Ok(Self(CompactString::from(raw)))
    }

    /// Validate a subscription list: every entry parsed, duplicates
    /// removed (first occurrence wins), count capped.
    pub fn parse_set(raw: &[String]) -> Result<Vec<Self>, EventKindError> {
        let mut kinds: Vec<Self> = Vec::with_capacity(raw.len().min(MAX_EVENT_KINDS_PER_ENDPOINT));
        for entry in raw {
            let kind = Self::parse(entry)?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        if kinds.len() > MAX_EVENT_KINDS_PER_ENDPOINT {
            return Err(EventKindError::TooMany);
        }
        Ok(kinds)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<CompactString> for EventKind {
    type Error = EventKindError;

    fn try_from(value: CompactString) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<EventKind> for CompactString {
    fn from(value: EventKind) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_oversized() {
        assert_eq!(EventKind::parse(""), Err(EventKindError::Empty));
        assert_eq!(EventKind::parse("   "), Err(EventKindError::Empty));
        assert_eq!(
            EventKind::parse("x".repeat(MAX_EVENT_KIND_LEN + 1)),
            Err(EventKindError::TooLong)
        );
        assert!(EventKind::parse("x".repeat(MAX_EVENT_KIND_LEN)).is_ok());
    }

    #[test]
    fn parse_set_dedups_and_caps() {
        let raw = vec![
            "job.created".to_string(),
            "job.created".to_string(),
            "bid.placed".to_string(),
        ];
        let kinds = EventKind::parse_set(&raw).unwrap();
        assert_eq!(kinds.len(), 2);
        assert_eq!(kinds[0].as_str(), "job.created");

        let too_many: Vec<String> = (0..=MAX_EVENT_KINDS_PER_ENDPOINT)
            .map(|i| format!("event.{i}"))
            .collect();
        assert_eq!(EventKind::parse_set(&too_many), Err(EventKindError::TooMany));
    }
}
