//! Account lifecycle events from the identity provider.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use border_core::{Collection, RecordKey, UserId};

use crate::crypto::verify_signature;
use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the hex HMAC-SHA256 of the request body.
pub const SIGNATURE_HEADER: &str = "x-border-signature";

/// Lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AuthEventType {
    /// An account was created.
    #[serde(rename = "user.created")]
    UserCreated,
    /// An account was deleted.
    #[serde(rename = "user.deleted")]
    UserDeleted,
}

/// Lifecycle event payload.
#[derive(Debug, Deserialize)]
pub struct AuthEvent {
    /// Event kind.
    #[serde(rename = "type")]
    pub event_type: AuthEventType,
    /// Account identifier.
    pub uid: UserId,
}

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct AuthEventResponse {
    /// Whether the event was processed.
    pub received: bool,
}

/// Handle an account lifecycle event.
///
/// `user.created` provisions the payment customer. `user.deleted` deletes
/// the remote customer and then the local user record.
pub async fn auth_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AuthEventResponse>, ApiError> {
    if let Some(secret) = &state.config.auth_webhook_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest("Missing event signature".into()))?;

        if !verify_signature(secret, &body, signature) {
            tracing::warn!("Invalid auth event signature");
            return Err(ApiError::BadRequest("Invalid event signature".into()));
        }
    } else {
        tracing::debug!("AUTH_WEBHOOK_SECRET not configured - skipping signature verification");
    }

    let event: AuthEvent =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(event_type = ?event.event_type, user_id = %event.uid, "Received auth event");

    match event.event_type {
        AuthEventType::UserCreated => {
            state.triggers.provision_customer(&event.uid).await?;
        }
        AuthEventType::UserDeleted => {
            state.triggers.deprovision_customer(&event.uid).await?;

            let user_path = state
                .version
                .record(Collection::User, &RecordKey::from(&event.uid));
            state.store.delete(&user_path)?;
            tracing::info!(user_id = %event.uid, "User record deleted");
        }
    }

    Ok(Json(AuthEventResponse { received: true }))
}
