//! Charging customers for charge-request records.

use serde_json::{Map, Value};

use border_core::{
    ChargeRecord, ChargeResult, Collection, CustomerRecord, ProcessingState, RecordKey,
    RecordPath, SourceRecord,
};
use border_store::Mutation;

use super::{HandlerError, Outcome, Triggers};
use crate::stripe::{Charge, ChargeRequest};

/// A write to `charge/{chargeID}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeWrite {
    /// Path parameter of the written charge.
    pub charge_id: Option<RecordKey>,
    /// Record value after the write; `None` when the record was deleted.
    pub charge: Option<Value>,
}

impl Triggers {
    /// Submit a charge request to the payment provider.
    ///
    /// The record's `chargeID` is the idempotency key. Records that already
    /// carry `id`, `error` or `state` are never submitted again.
    ///
    /// # Errors
    ///
    /// Returns an error only if the result could not be written back.
    pub async fn process_charge(&self, write: ChargeWrite) -> Result<Outcome, HandlerError> {
        let Some(charge_id) = write.charge_id else {
            return Ok(Outcome::Skipped("missing chargeID"));
        };
        let Some(value) = write.charge else {
            return Ok(Outcome::Skipped("charge deleted"));
        };
        let path = self.path(Collection::Charge, &charge_id);

        if value.as_object().is_some_and(has_settled_fields) {
            return Ok(Outcome::Skipped("charge already processed"));
        }
        if !value.get("customerID").is_some_and(is_present) {
            return Ok(Outcome::Skipped("missing customerID"));
        }

        let charge: ChargeRecord = match serde_json::from_value(value) {
            Ok(charge) => charge,
            Err(e) => {
                return self.capture_failure(&path, &HandlerError::InvalidRecord(e.to_string()));
            }
        };
        let Some(customer_key) = charge.customer_id.clone() else {
            return Ok(Outcome::Skipped("missing customerID"));
        };

        if !self.claim_charge(&path)? {
            return Ok(Outcome::Skipped("charge already processed"));
        }

        match self.submit_charge(&charge_id, &charge, &customer_key).await {
            Ok(response) => {
                tracing::info!(
                    charge_id = %charge_id,
                    stripe_charge_id = %response.id,
                    status = ?response.status,
                    paid = response.paid,
                    "Charge created"
                );

                let mut fields = ChargeResult::from(&response)
                    .to_fields()
                    .map_err(|e| HandlerError::InvalidRecord(e.to_string()))?;
                fields.insert("state".into(), ProcessingState::Done.to_value());
                self.store.update(&path, fields)?;
                Ok(Outcome::Completed)
            }
            Err(err) => self.capture_failure(&path, &err),
        }
    }

    /// Charge records that have not been claimed or resolved.
    ///
    /// # Errors
    ///
    /// Returns an error if the charge collection cannot be read.
    pub fn unprocessed_charges(&self) -> Result<Vec<ChargeWrite>, HandlerError> {
        let charges = self.store.list(&self.version, Collection::Charge)?;
        Ok(charges
            .into_iter()
            .filter(|(_, value)| value.as_object().is_some_and(|f| !has_settled_fields(f)))
            .map(|(key, value)| ChargeWrite {
                charge_id: Some(key),
                charge: Some(value),
            })
            .collect())
    }

    /// Resolve the customer and optional card, then create the charge.
    async fn submit_charge(
        &self,
        charge_id: &RecordKey,
        charge: &ChargeRecord,
        customer_key: &RecordKey,
    ) -> Result<Charge, HandlerError> {
        let customer: CustomerRecord = self.require(Collection::Customer, customer_key)?;
        let amount = charge.amount.ok_or_else(|| {
            HandlerError::InvalidRecord(format!("charge {charge_id} has no amount"))
        })?;

        let mut request = ChargeRequest {
            amount,
            currency: self.currency.clone(),
            customer: customer.stripe_customer_id,
            source: None,
        };

        if let Some(source_id) = &charge.source_id {
            let source: SourceRecord = self.require(Collection::Source, source_id)?;
            let card_id = source.card_id.ok_or_else(|| HandlerError::MissingLink {
                collection: Collection::Source,
                key: source_id.to_string(),
                field: "cardID",
            })?;
            request.source = Some(card_id);
        }

        Ok(self
            .payments
            .create_charge(&request, charge_id.as_str())
            .await?)
    }

    /// Mark the charge pending if it is still unprocessed.
    fn claim_charge(&self, path: &RecordPath) -> Result<bool, HandlerError> {
        let committed = self.store.transaction(path, &mut |current| {
            let Some(Value::Object(fields)) = current else {
                return Mutation::Abort;
            };
            if has_settled_fields(fields) {
                return Mutation::Abort;
            }

            let mut next: Map<String, Value> = fields.clone();
            next.insert("state".into(), ProcessingState::Pending.to_value());
            Mutation::Put(Value::Object(next))
        })?;
        Ok(committed)
    }
}

/// Raw check for the fields that make a charge record immutable.
fn has_settled_fields(fields: &Map<String, Value>) -> bool {
    ["id", "error", "state"]
        .iter()
        .any(|field| fields.get(*field).is_some_and(|v| !v.is_null()))
}

/// A reference field counts as missing when null or empty.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}
