//! SDK for Hookrelay, a headless webhook delivery engine.
//!
//! Defines the wire contract shared by the server and its consumers:
//! header names, the canonical HMAC-SHA256 signing scheme, endpoint secret
//! generation, and the admin API request/response objects.

#![forbid(unsafe_code)]

pub mod client;
pub mod objects;
pub mod secret;
pub mod signature;
