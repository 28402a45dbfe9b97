//! Write-trigger dispatch.
//!
//! The dispatcher follows the store's change feed and turns record changes
//! into handler invocations:
//!
//! - `source/{sourceID}` whose `token` changed → [`Triggers::link_payment_source`]
//! - any `charge/{chargeID}` change → [`Triggers::process_charge`]
//!
//! Each invocation runs as its own task; its outcome is logged and dropped.
//! If the dispatcher falls behind the feed, it rescans the `source` and
//! `charge` collections for records that were never handled.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use border_core::{Collection, SchemaVersion};
use border_store::{Change, Store};

use crate::triggers::charges::ChargeWrite;
use crate::triggers::sources::TokenWrite;
use crate::triggers::{HandlerError, Outcome, Triggers};

/// A handler invocation derived from a record change.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerEvent {
    /// `source/{sourceID}/token` was written.
    TokenWritten(TokenWrite),
    /// `charge/{chargeID}` was written.
    ChargeWritten(ChargeWrite),
}

/// Map a change to the trigger it fires, if any.
#[must_use]
pub fn route(version: &SchemaVersion, change: &Change) -> Option<TriggerEvent> {
    if &change.path.version != version {
        return None;
    }

    match change.path.collection {
        Collection::Source if change.field_changed("token") => {
            let token = change
                .field_after("token")
                .and_then(Value::as_str)
                .map(ToString::to_string);
            Some(TriggerEvent::TokenWritten(TokenWrite {
                source_id: Some(change.path.key.clone()),
                token,
            }))
        }
        Collection::Charge => Some(TriggerEvent::ChargeWritten(ChargeWrite {
            charge_id: Some(change.path.key.clone()),
            charge: change.after.clone(),
        })),
        _ => None,
    }
}

/// Start dispatching store changes to the trigger handlers.
///
/// The returned task ends when the store's change feed closes.
pub fn spawn(triggers: Arc<Triggers>, store: &dyn Store) -> JoinHandle<()> {
    let mut changes = store.subscribe();

    tokio::spawn(async move {
        loop {
            let change = match changes.recv().await {
                Ok(change) => change,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Trigger dispatcher lagged, rescanning records");
                    match rescan(&triggers) {
                        Ok(events) => {
                            for event in events {
                                dispatch(&triggers, event);
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "Rescan after lag failed"),
                    }
                    continue;
                }
                Err(RecvError::Closed) => {
                    tracing::info!("Change feed closed, stopping trigger dispatcher");
                    break;
                }
            };

            if let Some(event) = route(triggers.version(), &change) {
                tracing::debug!(path = %change.path, "Dispatching trigger");
                dispatch(&triggers, event);
            }
        }
    })
}

/// Events for every record whose trigger may have been missed.
///
/// Handlers claim records before acting, so events for records already in
/// flight are skipped when they run.
///
/// # Errors
///
/// Returns an error if a collection cannot be read.
pub fn rescan(triggers: &Triggers) -> Result<Vec<TriggerEvent>, HandlerError> {
    let tokens = triggers.unlinked_tokens()?;
    let charges = triggers.unprocessed_charges()?;
    tracing::info!(
        tokens = tokens.len(),
        charges = charges.len(),
        "Rescanned unprocessed records"
    );

    Ok(tokens
        .into_iter()
        .map(TriggerEvent::TokenWritten)
        .chain(charges.into_iter().map(TriggerEvent::ChargeWritten))
        .collect())
}

fn dispatch(triggers: &Arc<Triggers>, event: TriggerEvent) {
    let triggers = Arc::clone(triggers);
    tokio::spawn(async move { run(&triggers, event).await });
}

/// Run one invocation and log its completion signal.
async fn run(triggers: &Triggers, event: TriggerEvent) {
    let (trigger, result): (&str, Result<Outcome, HandlerError>) = match event {
        TriggerEvent::TokenWritten(write) => {
            ("link_payment_source", triggers.link_payment_source(write).await)
        }
        TriggerEvent::ChargeWritten(write) => {
            ("process_charge", triggers.process_charge(write).await)
        }
    };

    match result {
        Ok(Outcome::Skipped(reason)) => {
            tracing::debug!(trigger, reason, "Trigger skipped");
        }
        Ok(Outcome::Completed) => tracing::info!(trigger, "Trigger completed"),
        Ok(Outcome::Captured(message)) => {
            tracing::warn!(trigger, error = %message, "Trigger failure recorded");
        }
        Err(e) => tracing::error!(trigger, error = %e, "Trigger failed"),
    }
}
