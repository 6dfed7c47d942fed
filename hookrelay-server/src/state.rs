//! Application state shared across all request handlers.

use hookrelay_core::store::WebhookStore;
use hookrelay_core::verifier::InboundVerifier;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Storage backend for endpoints, deliveries, and processed records.
    pub store: Arc<dyn WebhookStore>,
    /// Inbound webhook verifier.
    pub verifier: Arc<InboundVerifier>,
    /// Argon2 PHC hash of the admin secret.
    pub admin_secret_hash: Arc<str>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn WebhookStore>,
        verifier: Arc<InboundVerifier>,
        admin_secret_hash: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            store,
            verifier,
            admin_secret_hash: admin_secret_hash.into(),
        }
    }
}
