//! The `createCustomer` HTTP entry point.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use border_core::UserId;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for `createCustomer`.
#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    /// Account to provision.
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
}

/// Response body for `createCustomer`.
#[derive(Debug, Serialize)]
pub struct CreateCustomerResponse {
    /// Always `true`; failures use an error status instead.
    pub result: bool,
}

/// Provision the payment customer for a user.
///
/// Only `POST` is accepted (403 with no body otherwise), and the body must
/// carry `userID` (400 with no body otherwise). The 200 response is sent
/// after the customer record and the user link are written.
pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    method: Method,
    body: Bytes,
) -> Response {
    if method != Method::POST {
        return StatusCode::FORBIDDEN.into_response();
    }

    let Some(user_id) = parse_user_id(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match state.triggers.provision_customer(&user_id).await {
        Ok(customer_key) => {
            tracing::info!(user_id = %user_id, customer_key = %customer_key, "createCustomer succeeded");
            Json(CreateCustomerResponse { result: true }).into_response()
        }
        Err(e) => {
            tracing::error!(user_id = %user_id, error = ?e, "createCustomer failed");
            ApiError::from(e).into_response()
        }
    }
}

fn parse_user_id(body: &[u8]) -> Option<UserId> {
    let request: CreateCustomerRequest = serde_json::from_slice(body).ok()?;
    UserId::new(request.user_id?).ok()
}
