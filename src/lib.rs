//! Paystack payment reconciliation backend
//!
//! Initializes transactions with Paystack, authenticates webhook deliveries
//! and converges webhook, verification and redirect signals for each payment
//! reference into one consistent, idempotent state.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod payments;
