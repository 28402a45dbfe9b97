//! Border Service - Stripe sync handlers and HTTP API
//!
//! This is the main entry point for the border service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use border_service::{create_router, dispatch, AppState, ServiceConfig};
use border_store::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,border=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Border Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        schema_version = %config.schema_version,
        currency = %config.currency,
        stripe_configured = %config.stripe_api_key.is_some(),
        auth_signature_required = %config.auth_webhook_secret.is_some(),
        "Service configuration loaded"
    );

    let store = open_store(&config)?;

    let state = AppState::new(Arc::clone(&store), config.clone())?;

    // Start the write-trigger dispatcher before accepting writes
    let _dispatcher = dispatch::spawn(Arc::clone(&state.triggers), store.as_ref());
    tracing::info!("Trigger dispatcher started");

    let app = create_router(state);

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "rocksdb-backend")]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    Ok(Arc::new(border_store::RocksStore::open(&config.data_dir)?))
}

#[cfg(not(feature = "rocksdb-backend"))]
fn open_store(_config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::warn!("Built without rocksdb-backend - records are kept in memory only");
    Ok(Arc::new(border_store::MemoryStore::new()))
}
