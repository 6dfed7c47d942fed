//! Endpoint registry request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::EventKind;

/// Request body for creating an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEndpointRequest {
    pub url: String,
    pub events: Vec<String>,
}

/// Endpoint representation for read APIs.
///
/// Deliberately has no `secret` field: after the response that minted it,
/// the secret is never exposed again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointResponse {
    pub id: Uuid,
    pub url: String,
    pub enabled: bool,
    pub events: Vec<EventKind>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Response to endpoint creation: the endpoint plus the one-time secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEndpointResponse {
    pub endpoint: EndpointResponse,
    pub secret: String,
}

/// Partial update for an endpoint. At least one field must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEndpointRequest {
    pub url: Option<String>,
    pub enabled: Option<bool>,
    pub events: Option<Vec<String>>,
}

impl UpdateEndpointRequest {
    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.enabled.is_none() && self.events.is_none()
    }
}

/// Response to a secret rotation: the new secret, returned once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotateSecretResponse {
    pub id: Uuid,
    pub secret: String,
}
