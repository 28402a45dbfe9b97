//! Stripe API types.

use serde::Deserialize;

use border_core::{CardDetails, ChargeResult};

/// Stripe customer object.
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    /// Stripe customer ID.
    pub id: String,
    /// Object type (always "customer").
    #[serde(default)]
    pub object: Option<String>,
    /// Metadata attached to the customer.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
}

/// Response to a customer deletion.
#[derive(Debug, Clone, Deserialize)]
pub struct DeletedCustomer {
    /// Stripe customer ID.
    pub id: String,
    /// Whether the customer was deleted.
    #[serde(default)]
    pub deleted: bool,
}

/// Stripe card object, returned when a token is attached to a customer.
#[derive(Debug, Clone, Deserialize)]
pub struct Card {
    /// Card ID.
    pub id: String,
    /// Object type (always "card").
    #[serde(default)]
    pub object: Option<String>,
    /// Card brand.
    #[serde(default)]
    pub brand: Option<String>,
    /// Issuing country.
    #[serde(default)]
    pub country: Option<String>,
    /// Customer the card belongs to.
    #[serde(default)]
    pub customer: Option<String>,
    /// CVC check result.
    #[serde(default)]
    pub cvc_check: Option<String>,
    /// Expiry month.
    #[serde(default)]
    pub exp_month: Option<u32>,
    /// Expiry year.
    #[serde(default)]
    pub exp_year: Option<u32>,
    /// Card fingerprint.
    #[serde(default)]
    pub fingerprint: Option<String>,
    /// Funding type.
    #[serde(default)]
    pub funding: Option<String>,
    /// Last four digits.
    #[serde(default)]
    pub last4: Option<String>,
}

impl From<&Card> for CardDetails {
    fn from(card: &Card) -> Self {
        Self {
            card_id: card.id.clone(),
            brand: card.brand.clone(),
            country: card.country.clone(),
            stripe_customer_id: card.customer.clone(),
            cvc_check: card.cvc_check.clone(),
            exp_month: card.exp_month,
            exp_year: card.exp_year,
            fingerprint: card.fingerprint.clone(),
            funding: card.funding.clone(),
            last4: card.last4.clone(),
            object: card.object.clone(),
        }
    }
}

/// Stripe charge object.
#[derive(Debug, Clone, Deserialize)]
pub struct Charge {
    /// Charge ID.
    pub id: String,
    /// Object type (always "charge").
    #[serde(default)]
    pub object: Option<String>,
    /// Amount in the smallest currency unit.
    #[serde(default)]
    pub amount: i64,
    /// Currency.
    #[serde(default)]
    pub currency: Option<String>,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Whether the charge succeeded.
    #[serde(default)]
    pub paid: bool,
    /// Whether the charge was captured.
    #[serde(default)]
    pub captured: bool,
    /// Status (succeeded, pending, failed).
    #[serde(default)]
    pub status: Option<String>,
    /// Failure message, if any.
    #[serde(default)]
    pub failure_message: Option<String>,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
}

impl From<&Charge> for ChargeResult {
    fn from(charge: &Charge) -> Self {
        Self {
            id: charge.id.clone(),
            object: charge.object.clone(),
            currency: charge.currency.clone(),
            paid: charge.paid,
            captured: charge.captured,
            status: charge.status.clone(),
            created: charge.created,
        }
    }
}

/// Parameters for creating a charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    /// Amount in the smallest currency unit.
    pub amount: i64,
    /// Settlement currency.
    pub currency: String,
    /// Stripe customer ID.
    pub customer: String,
    /// Card to charge instead of the customer's default source.
    pub source: Option<String>,
}

impl ChargeRequest {
    /// Form-encoded parameters for the charges endpoint.
    #[must_use]
    pub fn to_form(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("amount", self.amount.to_string()),
            ("currency", self.currency.clone()),
            ("customer", self.customer.clone()),
        ];
        if let Some(source) = &self.source {
            params.push(("source", source.clone()));
        }
        params
    }
}

/// Stripe API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorDetail,
}

/// Stripe error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    #[serde(default)]
    pub message: Option<String>,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Parameter that caused the error.
    #[serde(default)]
    pub param: Option<String>,
}
