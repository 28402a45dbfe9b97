//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{any, get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{auth_events, customers, db, health};
use crate::state::AppState;

/// Maximum concurrent requests for `/v1` endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `/createCustomer` - Provision a customer (`POST` only)
///
/// ## Identity provider (signature verification)
/// - `POST /v1/auth/events` - Account created / deleted
///
/// ## Record tree (rate limited)
/// - `GET|POST /v1/db/:collection` - List / push
/// - `GET|PUT|PATCH|DELETE /v1/db/:collection/:key`
/// - `PUT /v1/db/:collection/:key/:field`
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let api_routes = Router::new()
        .route("/auth/events", post(auth_events::auth_event))
        .route(
            "/db/:collection",
            get(db::list_records).post(db::push_record),
        )
        .route(
            "/db/:collection/:key",
            get(db::get_record)
                .put(db::put_record)
                .patch(db::patch_record)
                .delete(db::delete_record),
        )
        .route("/db/:collection/:key/:field", put(db::put_field))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        .route("/health", get(health::health))
        .route("/createCustomer", any(customers::create_customer))
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
