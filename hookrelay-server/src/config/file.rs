//! TOML file configuration structures.
//!
//! These structs directly map to the `hookrelay-config.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub inbound: InboundConfig,
    #[serde(default)]
    pub dispatcher: DispatcherSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().expect("valid default address")
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// The admin secret. If this is plaintext (doesn't start with `$argon2`),
    /// it will be hashed and the config file will be rewritten.
    pub secret: String,
}

/// Inbound webhook verification section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundConfig {
    /// Shared HMAC secret of the external source whose webhooks we consume.
    pub secret: String,
    /// Maximum clock skew accepted on inbound timestamps, in seconds.
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: i64,
}

fn default_tolerance_secs() -> i64 {
    300
}

/// Dispatcher tuning section. Every field has a sensible default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherSection {
    pub poll_interval_secs: u64,
    pub batch_size: i64,
    pub concurrency: usize,
    pub request_timeout_secs: u64,
    pub backoff_base_secs: u64,
}

impl Default for DispatcherSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3,
            batch_size: 32,
            concurrency: 8,
            request_timeout_secs: 5,
            backoff_base_secs: 30,
        }
    }
}

impl FileConfig {
    /// Check if the admin secret is already hashed (argon2 format).
    pub fn is_admin_secret_hashed(&self) -> bool {
        self.admin.secret.starts_with("$argon2")
    }
}
