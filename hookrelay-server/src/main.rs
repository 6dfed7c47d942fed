//! Hookrelay Server
//!
//! A headless webhook delivery engine: signed outbound callbacks with
//! retries and dead-lettering, plus the symmetric inbound verification path.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use hookrelay_core::processors::WebhookDispatcher;
use hookrelay_core::store::{PgWebhookStore, WebhookStore};
use hookrelay_core::verifier::InboundVerifier;
use server::{build_router, run_server};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Hookrelay - headless webhook delivery engine
#[derive(Parser, Debug)]
#[command(name = "hookrelay-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./hookrelay-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting hookrelay-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = ConfigLoader::new(&args.config, args.listen);
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    // Run migrations if requested
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    // One-time schema capability check; fails fast instead of sniffing
    // per-query errors later.
    let store = PgWebhookStore::connect(db_pool.clone()).await.map_err(|e| {
        tracing::error!("Storage initialization failed: {}", e);
        e
    })?;
    let store: Arc<dyn WebhookStore> = Arc::new(store);

    let verifier = Arc::new(
        InboundVerifier::new(store.clone(), loaded_config.inbound_secret.into_bytes())
            .with_tolerance(loaded_config.inbound_tolerance),
    );

    // The dispatcher runs decoupled from the request path and is stopped
    // via the shutdown channel after the HTTP server drains.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher = WebhookDispatcher::new(store.clone(), loaded_config.dispatcher.clone());
    let dispatcher_handle = tokio::spawn(dispatcher.run(shutdown_rx));

    // Create application state and build the router
    let state = AppState::new(store, verifier, loaded_config.admin_secret_hash.as_str());
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", loaded_config.listen);
    let result = run_server(router, loaded_config.listen).await;

    // Stop the dispatcher and wait for in-flight sends
    let _ = shutdown_tx.send(true);
    let _ = dispatcher_handle.await;

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
