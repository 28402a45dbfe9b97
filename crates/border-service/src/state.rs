//! Application state.

use std::sync::Arc;

use border_core::SchemaVersion;
use border_store::Store;

use crate::config::ServiceConfig;
use crate::payments::PaymentProvider;
use crate::stripe::{StripeClient, StripeError};
use crate::triggers::Triggers;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Schema version every route reads and writes.
    pub version: SchemaVersion,

    /// Trigger handlers, shared with the dispatcher.
    pub triggers: Arc<Triggers>,
}

impl AppState {
    /// Create the application state backed by Stripe.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Configuration` if no Stripe key is configured or
    /// the schema version is invalid.
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Result<Self, StripeError> {
        let api_key = config
            .stripe_api_key
            .clone()
            .ok_or_else(|| StripeError::Configuration("STRIPE_API_KEY is not set".into()))?;

        let mut client = StripeClient::new(api_key)?;
        if let Some(base) = &config.stripe_api_base {
            tracing::info!(stripe_api_base = %base, "Using custom Stripe API base");
            client = client.with_base_url(base);
        }

        Self::with_payments(store, config, Arc::new(client))
    }

    /// Create the application state with any payment provider.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Configuration` if the schema version is invalid.
    pub fn with_payments(
        store: Arc<dyn Store>,
        config: ServiceConfig,
        payments: Arc<dyn PaymentProvider>,
    ) -> Result<Self, StripeError> {
        let version = SchemaVersion::new(config.schema_version.clone()).map_err(|e| {
            StripeError::Configuration(format!("invalid SCHEMA_VERSION: {e}"))
        })?;

        let triggers = Arc::new(Triggers::new(
            Arc::clone(&store),
            payments,
            version.clone(),
            config.currency.clone(),
        ));

        Ok(Self {
            store,
            config,
            version,
            triggers,
        })
    }
}
