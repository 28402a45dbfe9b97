//! Exchanging card tokens for stored cards.

use serde_json::{Map, Value};

use border_core::{CardDetails, Collection, ProcessingState, RecordKey, RecordPath, SourceRecord};
use border_store::Mutation;

use super::{failure_fields, HandlerError, Outcome, Triggers};
use crate::stripe::Card;

/// A write to `source/{sourceID}/token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenWrite {
    /// Path parameter of the written source.
    pub source_id: Option<RecordKey>,
    /// Token value after the write; `None` when the token was cleared.
    pub token: Option<String>,
}

impl Triggers {
    /// Attach a newly written card token to the owner's remote customer.
    ///
    /// The source is claimed by writing the token to `attemptedToken` with
    /// `state: pending`. A token written while an earlier one is in flight
    /// takes over the claim, and the earlier result is discarded.
    ///
    /// On success the card metadata is merged into the source record next to
    /// the token. On failure the user-facing message is written to
    /// `source/{sourceID}/error`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the result could not be written back.
    pub async fn link_payment_source(&self, write: TokenWrite) -> Result<Outcome, HandlerError> {
        let Some(token) = write.token else {
            return Ok(Outcome::Skipped("token cleared"));
        };
        let Some(source_id) = write.source_id else {
            return Ok(Outcome::Skipped("missing sourceID"));
        };
        let path = self.path(Collection::Source, &source_id);

        if !self.claim_source(&path, &token)? {
            return Ok(Outcome::Skipped("token already claimed"));
        }

        let (outcome, fields) = match self.attach_token(&source_id, &token).await {
            Ok(card) => {
                let mut fields = CardDetails::from(&card)
                    .to_fields()
                    .map_err(|e| HandlerError::InvalidRecord(e.to_string()))?;
                fields.insert("state".into(), ProcessingState::Done.to_value());
                fields.insert("error".into(), Value::Null);

                tracing::info!(
                    source_id = %source_id,
                    card_id = %card.id,
                    "Payment source linked"
                );
                (Outcome::Completed, fields)
            }
            Err(err) => {
                let (message, fields) = failure_fields(&path, &err);
                (Outcome::Captured(message), fields)
            }
        };

        if self.finish_source(&path, &token, fields)? {
            Ok(outcome)
        } else {
            tracing::info!(
                source_id = %source_id,
                "Source changed while linking, result discarded"
            );
            Ok(Outcome::Skipped("source changed while linking"))
        }
    }

    /// Sources holding a token that no invocation has claimed.
    ///
    /// # Errors
    ///
    /// Returns an error if the source collection cannot be read.
    pub fn unlinked_tokens(&self) -> Result<Vec<TokenWrite>, HandlerError> {
        let sources = self.store.list(&self.version, Collection::Source)?;
        Ok(sources
            .into_iter()
            .filter_map(|(key, value)| {
                let source: SourceRecord = serde_json::from_value(value).ok()?;
                source.needs_link().then(|| TokenWrite {
                    source_id: Some(key),
                    token: source.token,
                })
            })
            .collect())
    }

    /// Resolve `source` → `user` → `customer` and attach the token.
    async fn attach_token(&self, source_id: &RecordKey, token: &str) -> Result<Card, HandlerError> {
        let source: SourceRecord = self.require(Collection::Source, source_id)?;
        let user_id = source.user_id.ok_or_else(|| HandlerError::MissingLink {
            collection: Collection::Source,
            key: source_id.to_string(),
            field: "userID",
        })?;
        let (_, customer) = self.customer_for_user(&user_id)?;

        Ok(self
            .payments
            .attach_source(&customer.stripe_customer_id, token)
            .await?)
    }

    /// Mark the source pending for `token` if it still holds that token and
    /// no invocation has claimed it yet.
    fn claim_source(&self, path: &RecordPath, token: &str) -> Result<bool, HandlerError> {
        let committed = self.store.transaction(path, &mut |current| {
            let Some(fields) = holding_token(current, token) else {
                return Mutation::Abort;
            };
            if fields.get("attemptedToken").and_then(Value::as_str) == Some(token) {
                return Mutation::Abort;
            }

            let mut next = fields.clone();
            next.insert("attemptedToken".into(), Value::String(token.to_string()));
            next.insert("state".into(), ProcessingState::Pending.to_value());
            Mutation::Put(Value::Object(next))
        })?;
        Ok(committed)
    }

    /// Merge the result if the source still holds and claims `token`.
    fn finish_source(
        &self,
        path: &RecordPath,
        token: &str,
        result: Map<String, Value>,
    ) -> Result<bool, HandlerError> {
        let mut result = Some(result);
        let committed = self.store.transaction(path, &mut |current| {
            let Some(fields) = holding_token(current, token) else {
                return Mutation::Abort;
            };
            if fields.get("attemptedToken").and_then(Value::as_str) != Some(token) {
                return Mutation::Abort;
            }
            let Some(result) = result.take() else {
                return Mutation::Abort;
            };

            let mut next = fields.clone();
            for (field, value) in result {
                if value.is_null() {
                    next.remove(&field);
                } else {
                    next.insert(field, value);
                }
            }
            Mutation::Put(Value::Object(next))
        })?;
        Ok(committed)
    }
}

/// The record's fields, if it is a source whose `token` is `token`.
fn holding_token<'a>(current: Option<&'a Value>, token: &str) -> Option<&'a Map<String, Value>> {
    let fields = current?.as_object()?;
    (fields.get("token").and_then(Value::as_str) == Some(token)).then_some(fields)
}
