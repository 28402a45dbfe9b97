//! API handlers.

pub mod auth_events;
pub mod customers;
pub mod db;
pub mod health;
