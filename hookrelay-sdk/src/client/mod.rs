//! Consumer-side helpers.

pub mod webhook;

pub use webhook::{VerifiedWebhook, verify_webhook};
