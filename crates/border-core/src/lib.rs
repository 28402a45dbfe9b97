//! Core types for the border payment sync service.
//!
//! This crate provides the foundational types shared by the store and the
//! service:
//!
//! - **Identifiers**: `UserId`, `RecordKey`
//! - **Layout**: `SchemaVersion`, `Collection`, `RecordPath`
//! - **Records**: `UserRecord`, `CustomerRecord`, `SourceRecord`, `ChargeRecord`
//!
//! # Persisted Layout
//!
//! Every record lives at `/{version}/{collection}/{key}`. Field names are
//! stored in camelCase (`customerID`, `stripeCustomerID`, ...) so that clients
//! reading the database directly see the same shape the handlers write.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod path;
pub mod records;

pub use error::{CoreError, Result};
pub use ids::{IdError, RecordKey, UserId};
pub use path::{Collection, RecordPath, SchemaVersion};
pub use records::{
    CardDetails, ChargeRecord, ChargeResult, CustomerRecord, ProcessingState, SourceRecord,
    UserRecord,
};
