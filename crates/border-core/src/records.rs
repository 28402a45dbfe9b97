//! Record types stored in the realtime database.
//!
//! Records are read leniently: unknown fields are ignored and every field a
//! client may omit is optional. Handlers write individual fields through the
//! store's `update` so that fields they do not own are left untouched.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::ids::{RecordKey, UserId};

/// Processing state written before an external call.
///
/// A record in `Pending` is owned by an in-flight invocation; concurrent
/// triggers on the same record skip it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    /// External call in flight.
    Pending,
    /// External call succeeded and its result was written.
    Done,
    /// External call failed and an `error` was written.
    Failed,
}

impl ProcessingState {
    /// JSON value of this state, as stored.
    #[must_use]
    pub fn to_value(self) -> Value {
        Value::String(
            match self {
                Self::Pending => "pending",
                Self::Done => "done",
                Self::Failed => "failed",
            }
            .to_string(),
        )
    }
}

/// `/{version}/user/{userID}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Key of the linked customer record.
    #[serde(rename = "customerID", default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<RecordKey>,
    /// `Pending` while a customer is being provisioned for this user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ProcessingState>,
}

/// `/{version}/customer/{key}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// Creation time in milliseconds since the Unix epoch.
    #[serde(rename = "_createdAt")]
    pub created_at: i64,
    /// Last update time in milliseconds since the Unix epoch.
    #[serde(rename = "_updatedAt")]
    pub updated_at: i64,
    /// Owning user.
    #[serde(rename = "userID")]
    pub user_id: UserId,
    /// Remote customer id at the payment provider.
    #[serde(rename = "stripeCustomerID")]
    pub stripe_customer_id: String,
}

impl CustomerRecord {
    /// Create a customer record stamped with the current time.
    #[must_use]
    pub fn new(user_id: UserId, stripe_customer_id: impl Into<String>) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            created_at: now,
            updated_at: now,
            user_id,
            stripe_customer_id: stripe_customer_id.into(),
        }
    }
}

/// `/{version}/source/{sourceID}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Owning user.
    #[serde(rename = "userID", default)]
    pub user_id: Option<UserId>,
    /// One-time card token awaiting exchange.
    #[serde(default)]
    pub token: Option<String>,
    /// Token most recently claimed for exchange.
    #[serde(rename = "attemptedToken", default)]
    pub attempted_token: Option<String>,
    /// Remote card id, set once the token has been exchanged.
    #[serde(rename = "cardID", default)]
    pub card_id: Option<String>,
    /// User-facing error from the last exchange attempt.
    #[serde(default)]
    pub error: Option<String>,
    /// Processing state of the last exchange attempt.
    #[serde(default)]
    pub state: Option<ProcessingState>,
}

impl SourceRecord {
    /// Whether `token` holds a token no invocation has claimed yet.
    #[must_use]
    pub fn needs_link(&self) -> bool {
        self.token.is_some() && self.attempted_token != self.token
    }
}

/// Card metadata written onto a source record after a successful exchange.
///
/// The fields are stored as siblings of `token`, not nested under a sub-key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
    /// Remote card id.
    #[serde(rename = "cardID")]
    pub card_id: String,
    /// Card brand (e.g. "Visa").
    pub brand: Option<String>,
    /// Two-letter issuing country.
    pub country: Option<String>,
    /// Remote customer the card is attached to.
    #[serde(rename = "stripeCustomerID")]
    pub stripe_customer_id: Option<String>,
    /// Result of the CVC check.
    pub cvc_check: Option<String>,
    /// Expiry month.
    pub exp_month: Option<u32>,
    /// Expiry year.
    pub exp_year: Option<u32>,
    /// Card fingerprint.
    pub fingerprint: Option<String>,
    /// Funding type (credit, debit, prepaid, unknown).
    pub funding: Option<String>,
    /// Last four digits.
    pub last4: Option<String>,
    /// Provider object type.
    pub object: Option<String>,
}

impl CardDetails {
    /// Fields to merge into the source record.
    ///
    /// # Errors
    ///
    /// Returns an error if the details cannot be converted to JSON.
    pub fn to_fields(&self) -> Result<Map<String, Value>> {
        into_fields(self)
    }
}

/// `/{version}/charge/{chargeID}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRecord {
    /// Amount in the smallest currency unit.
    #[serde(default)]
    pub amount: Option<i64>,
    /// Optional source to charge instead of the customer's default.
    #[serde(rename = "sourceID", default)]
    pub source_id: Option<RecordKey>,
    /// Customer record to charge.
    #[serde(rename = "customerID", default)]
    pub customer_id: Option<RecordKey>,
    /// Remote charge id, set after a successful charge.
    #[serde(default)]
    pub id: Option<String>,
    /// User-facing error from a failed charge.
    #[serde(default)]
    pub error: Option<String>,
    /// Processing state.
    #[serde(default)]
    pub state: Option<ProcessingState>,
}

/// Result fields written onto a charge record after a successful charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeResult {
    /// Remote charge id.
    pub id: String,
    /// Provider object type.
    pub object: Option<String>,
    /// Settlement currency.
    pub currency: Option<String>,
    /// Whether the charge was paid.
    pub paid: bool,
    /// Whether the charge was captured.
    pub captured: bool,
    /// Provider charge status (succeeded, pending, failed).
    pub status: Option<String>,
    /// Provider creation time (Unix seconds).
    pub created: i64,
}

impl ChargeResult {
    /// Fields to merge into the charge record.
    ///
    /// # Errors
    ///
    /// Returns an error if the result cannot be converted to JSON.
    pub fn to_fields(&self) -> Result<Map<String, Value>> {
        into_fields(self)
    }
}

fn into_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}
