//! Background processors for the delivery engine.
//!
//! - `WebhookDispatcher`: claims due deliveries, signs and sends them,
//!   schedules retries, dead-letters exhausted rows, and reclaims rows
//!   stranded by crashed workers.

pub mod dispatcher;

pub use dispatcher::{DispatcherConfig, WebhookDispatcher};
