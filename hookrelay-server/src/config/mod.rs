//! Configuration module for hookrelay-server.
//!
//! Handles loading configuration from the TOML file, CLI arguments, and
//! environment variables. Also handles admin secret hashing.

pub mod file;

use crate::config::file::FileConfig;
use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHasher};
use hookrelay_core::processors::DispatcherConfig;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("password hashing error: {0}")]
    HashError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub listen: SocketAddr,
    /// Argon2 PHC hash the admin auth extractor verifies against.
    pub admin_secret_hash: String,
    pub inbound_secret: String,
    pub inbound_tolerance: i64,
    pub dispatcher: DispatcherConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Hash the admin secret if it's plaintext (and rewrite the file)
    /// 5. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        self.validate(&file_config)?;

        let secret_hash = if file_config.is_admin_secret_hashed() {
            file_config.admin.secret.clone()
        } else {
            let hash = self.hash_secret(&file_config.admin.secret)?;
            file_config.admin.secret = hash.clone();
            self.rewrite_config(&file_config)?;
            tracing::info!("Admin secret hashed and config file updated");
            hash
        };

        let dispatcher = &file_config.dispatcher;
        Ok(LoadedConfig {
            listen: file_config.server.listen,
            admin_secret_hash: secret_hash,
            inbound_secret: file_config.inbound.secret,
            inbound_tolerance: file_config.inbound.tolerance_secs,
            dispatcher: DispatcherConfig {
                poll_interval: Duration::from_secs(dispatcher.poll_interval_secs),
                batch_size: dispatcher.batch_size,
                concurrency: dispatcher.concurrency,
                request_timeout: Duration::from_secs(dispatcher.request_timeout_secs),
                backoff_base: Duration::from_secs(dispatcher.backoff_base_secs),
            },
        })
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        if config.admin.secret.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "admin secret must not be empty".to_string(),
            ));
        }
        if config.inbound.secret.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "inbound secret must not be empty".to_string(),
            ));
        }
        if config.inbound.tolerance_secs <= 0 {
            return Err(ConfigError::ValidationError(
                "inbound tolerance must be positive".to_string(),
            ));
        }
        if config.dispatcher.batch_size <= 0 || config.dispatcher.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "dispatcher batch size and concurrency must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn hash_secret(&self, secret: &str) -> Result<String, ConfigError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| ConfigError::HashError(e.to_string()))?;
        Ok(hash.to_string())
    }

    fn rewrite_config(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let serialized = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, serialized)?;
        Ok(())
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
