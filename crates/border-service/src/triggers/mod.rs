//! Trigger handlers that keep the record tree in sync with Stripe.
//!
//! Each handler runs one sequential chain: read records, make one payment
//! call, write the result back. Lookups along a chain of record references
//! fail with an explicit [`HandlerError`] instead of dereferencing a missing
//! record.
//!
//! - [`Triggers::provision_customer`] - account created / `createCustomer`
//! - [`Triggers::deprovision_customer`] - account deleted
//! - [`Triggers::link_payment_source`] - `source/{sourceID}/token` written
//! - [`Triggers::process_charge`] - `charge/{chargeID}` written

pub mod charges;
pub mod customers;
pub mod sources;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use border_core::{
    Collection, CustomerRecord, ProcessingState, RecordKey, RecordPath, SchemaVersion, UserId,
    UserRecord,
};
use border_store::{Store, StoreError, StoreExt};

use crate::payments::PaymentProvider;
use crate::stripe::StripeError;

/// Message stored for failures that must not be shown verbatim.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred, developers have been alerted";

/// Errors raised inside a handler chain.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A referenced record does not exist.
    #[error("{collection} not found: {key}")]
    NotFound {
        /// Collection that was read.
        collection: Collection,
        /// Key that was read.
        key: String,
    },

    /// A record exists but does not reference the next record in the chain.
    #[error("{collection}/{key} has no {field}")]
    MissingLink {
        /// Collection of the record missing the reference.
        collection: Collection,
        /// Key of the record missing the reference.
        key: String,
        /// Name of the missing field.
        field: &'static str,
    },

    /// Another invocation holds the record's pending claim.
    #[error("{collection}/{key} is already being processed")]
    InProgress {
        /// Collection of the claimed record.
        collection: Collection,
        /// Key of the claimed record.
        key: String,
    },

    /// A record has a shape the handler cannot use.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Payment provider failure.
    #[error(transparent)]
    Payment(#[from] StripeError),
}

/// Completion signal returned to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The trigger did not apply; nothing was called or written.
    Skipped(&'static str),
    /// The payment call succeeded and its result was written.
    Completed,
    /// The payment call failed and the given message was written to `error`.
    Captured(String),
}

/// Message to store in a record's `error` field.
///
/// Classified provider errors are passed through; everything else is masked.
#[must_use]
pub fn user_facing_message(error: &HandlerError) -> String {
    match error {
        HandlerError::Payment(err) => err
            .user_message()
            .map_or_else(|| GENERIC_ERROR_MESSAGE.to_string(), ToString::to_string),
        _ => GENERIC_ERROR_MESSAGE.to_string(),
    }
}

/// Shared context for all trigger handlers.
pub struct Triggers {
    store: Arc<dyn Store>,
    payments: Arc<dyn PaymentProvider>,
    version: SchemaVersion,
    currency: String,
}

impl Triggers {
    /// Create the handler context.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        payments: Arc<dyn PaymentProvider>,
        version: SchemaVersion,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            store,
            payments,
            version,
            currency: currency.into(),
        }
    }

    /// Schema version the handlers read and write.
    #[must_use]
    pub fn version(&self) -> &SchemaVersion {
        &self.version
    }

    fn path(&self, collection: Collection, key: &RecordKey) -> RecordPath {
        self.version.record(collection, key)
    }

    /// Read a record that must exist.
    fn require<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &RecordKey,
    ) -> Result<T, HandlerError> {
        self.store
            .get_as(&self.path(collection, key))?
            .ok_or_else(|| HandlerError::NotFound {
                collection,
                key: key.to_string(),
            })
    }

    /// Resolve `user/{userID}` → `customer/{customerID}`.
    fn customer_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<(RecordKey, CustomerRecord), HandlerError> {
        let user_key = RecordKey::from(user_id);
        let user: UserRecord = self.require(Collection::User, &user_key)?;
        let customer_key = user.customer_id.ok_or_else(|| HandlerError::MissingLink {
            collection: Collection::User,
            key: user_key.to_string(),
            field: "customerID",
        })?;
        let customer = self.require(Collection::Customer, &customer_key)?;
        Ok((customer_key, customer))
    }

    /// Write the failure marker for a captured error.
    fn capture_failure(
        &self,
        path: &RecordPath,
        error: &HandlerError,
    ) -> Result<Outcome, HandlerError> {
        let (message, fields) = failure_fields(path, error);
        self.store.update(path, fields)?;
        Ok(Outcome::Captured(message))
    }
}

/// Log the raw error and build the `error`/`state` fields that record it.
fn failure_fields(path: &RecordPath, error: &HandlerError) -> (String, Map<String, Value>) {
    tracing::error!(path = %path, error = ?error, "Payment operation failed");

    let message = user_facing_message(error);
    let mut fields = Map::new();
    fields.insert("error".into(), Value::String(message.clone()));
    fields.insert("state".into(), ProcessingState::Failed.to_value());
    (message, fields)
}
