//! Border service: keeps the realtime record tree in sync with Stripe.
//!
//! This crate provides:
//!
//! - The four trigger handlers ([`triggers`])
//! - The dispatcher turning store changes into trigger invocations ([`dispatch`])
//! - The HTTP surface: `createCustomer`, identity-provider events, and
//!   record-tree access ([`routes`])
//!
//! # Failure Reporting
//!
//! Payment failures are logged in full. Only errors Stripe classified with a
//! typed reason are shown to users; everything else is replaced with
//! [`triggers::GENERIC_ERROR_MESSAGE`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Axum handlers must be async

pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod payments;
pub mod routes;
pub mod state;
pub mod stripe;
pub mod triggers;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use payments::PaymentProvider;
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{StripeClient, StripeError};
pub use triggers::{HandlerError, Outcome, Triggers};
