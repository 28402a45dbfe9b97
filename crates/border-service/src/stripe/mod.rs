//! Stripe integration for customers, cards and charges.
//!
//! Stripe handles:
//! - Customer registration and removal
//! - Exchanging one-time card tokens for stored cards
//! - Idempotent charge creation

pub mod client;
pub mod types;

pub use client::{StripeClient, StripeError};
pub use types::*;
