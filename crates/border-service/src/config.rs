//! Service configuration.

use serde::Deserialize;
use std::path::Path;

use border_core::path::DEFAULT_SCHEMA_VERSION;

/// Settlement currency used when `CURRENCY` is not set.
pub const DEFAULT_CURRENCY: &str = "JPY";

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/border").
    pub data_dir: String,

    /// Schema version prefix for every record path (default: "v1").
    pub schema_version: String,

    /// Currency for every charge (default: "JPY").
    pub currency: String,

    /// Stripe secret key.
    pub stripe_api_key: Option<String>,

    /// Override for the Stripe API base URL.
    pub stripe_api_base: Option<String>,

    /// Shared secret for identity-provider event signatures (optional).
    pub auth_webhook_secret: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/border".into()),
            schema_version: std::env::var("SCHEMA_VERSION")
                .unwrap_or_else(|_| DEFAULT_SCHEMA_VERSION.into()),
            currency: std::env::var("CURRENCY").unwrap_or_else(|_| DEFAULT_CURRENCY.into()),
            stripe_api_key: load_stripe_secrets(),
            stripe_api_base: std::env::var("STRIPE_API_BASE").ok(),
            auth_webhook_secret: std::env::var("AUTH_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }
}

/// Load the Stripe key from file or environment.
fn load_stripe_secrets() -> Option<String> {
    let secret_paths = [
        ".secrets/stripe.json",
        "border/.secrets/stripe.json",
        "../.secrets/stripe.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return Some(secrets.api_key);
        }
    }

    tracing::debug!("Stripe secrets file not found, using environment variables");
    std::env::var("STRIPE_API_KEY").ok()
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/border".into(),
            schema_version: DEFAULT_SCHEMA_VERSION.into(),
            currency: DEFAULT_CURRENCY.into(),
            stripe_api_key: None,
            stripe_api_base: None,
            auth_webhook_secret: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}
