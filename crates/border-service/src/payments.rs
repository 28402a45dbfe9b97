//! Payment provider seam.
//!
//! Trigger handlers talk to the payment processor only through
//! [`PaymentProvider`], so tests can substitute a recording fake for Stripe.

use async_trait::async_trait;

use border_core::UserId;

use crate::stripe::{Card, Charge, ChargeRequest, Customer, DeletedCustomer, StripeError};

/// Remote operations the handlers need from the payment processor.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a customer with no payment method.
    async fn create_customer(&self, user_id: &UserId) -> Result<Customer, StripeError>;

    /// Delete a customer.
    async fn delete_customer(&self, customer_id: &str) -> Result<DeletedCustomer, StripeError>;

    /// Exchange a one-time token for a card stored on the customer.
    async fn attach_source(&self, customer_id: &str, token: &str) -> Result<Card, StripeError>;

    /// Create a charge, deduplicated by `idempotency_key`.
    async fn create_charge(
        &self,
        request: &ChargeRequest,
        idempotency_key: &str,
    ) -> Result<Charge, StripeError>;
}
