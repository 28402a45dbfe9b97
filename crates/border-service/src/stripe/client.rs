//! Stripe API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use border_core::UserId;

use super::types::{Card, Charge, ChargeRequest, Customer, DeletedCustomer, StripeErrorResponse};
use crate::payments::PaymentProvider;

/// Error type for Stripe operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned a typed error.
    #[error("Stripe API error: {error_type} - {message}")]
    Api {
        /// Error type (`card_error`, `invalid_request_error`, ...).
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// Stripe answered with an error status and no readable error body.
    #[error("Stripe returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StripeError {
    /// Whether Stripe classified the failure with a typed reason.
    ///
    /// Only classified errors carry messages that may be shown to end users.
    #[must_use]
    pub fn is_classified(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    /// Message safe to show to end users, if any.
    #[must_use]
    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::Api { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl StripeClient {
    /// Stripe API base URL.
    pub const BASE_URL: &'static str = "https://api.stripe.com/v1";

    /// Create a new Stripe client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Stripe secret API key (`sk_test_...` or `sk_live_...`)
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, StripeError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(StripeError::Configuration("Stripe API key is empty".into()));
        }

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: Self::BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API base (e.g. a local mock).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Create a new Stripe customer with no payment method.
    ///
    /// # Arguments
    ///
    /// * `user_id` - Our account ID (stored as metadata)
    pub async fn create_customer(&self, user_id: &UserId) -> Result<Customer, StripeError> {
        let params = [("metadata[userID]", user_id.as_str())];

        let response = self
            .client
            .post(format!("{}/customers", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Delete a customer.
    pub async fn delete_customer(&self, customer_id: &str) -> Result<DeletedCustomer, StripeError> {
        let response = self
            .client
            .delete(format!("{}/customers/{}", self.base_url, customer_id))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Attach a one-time card token to a customer.
    ///
    /// # Arguments
    ///
    /// * `customer_id` - Stripe customer ID
    /// * `token` - Card token created client-side (`tok_...`)
    pub async fn create_source(&self, customer_id: &str, token: &str) -> Result<Card, StripeError> {
        let response = self
            .client
            .post(format!("{}/customers/{}/sources", self.base_url, customer_id))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&[("source", token)])
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Create a charge.
    ///
    /// Stripe returns the original result for any retry carrying the same
    /// `idempotency_key`, so a logical charge is created at most once.
    pub async fn create_charge(
        &self,
        request: &ChargeRequest,
        idempotency_key: &str,
    ) -> Result<Charge, StripeError> {
        tracing::debug!(
            customer = %request.customer,
            amount = request.amount,
            currency = %request.currency,
            idempotency_key = %idempotency_key,
            "Creating Stripe charge"
        );

        let response = self
            .client
            .post(format!("{}/charges", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .header("Idempotency-Key", idempotency_key)
            .form(&request.to_form())
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<StripeErrorResponse, _> = response.json().await;

        match error_body {
            Ok(stripe_error) => Err(StripeError::Api {
                message: stripe_error
                    .error
                    .message
                    .unwrap_or_else(|| stripe_error.error.error_type.clone()),
                error_type: stripe_error.error.error_type,
                code: stripe_error.error.code,
            }),
            Err(_) => Err(StripeError::Status {
                status: status.as_u16(),
            }),
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_customer(&self, user_id: &UserId) -> Result<Customer, StripeError> {
        StripeClient::create_customer(self, user_id).await
    }

    async fn delete_customer(&self, customer_id: &str) -> Result<DeletedCustomer, StripeError> {
        StripeClient::delete_customer(self, customer_id).await
    }

    async fn attach_source(&self, customer_id: &str, token: &str) -> Result<Card, StripeError> {
        self.create_source(customer_id, token).await
    }

    async fn create_charge(
        &self,
        request: &ChargeRequest,
        idempotency_key: &str,
    ) -> Result<Charge, StripeError> {
        StripeClient::create_charge(self, request, idempotency_key).await
    }
}
