//! Payment processing
//!
//! Gateway integration, webhook authentication and the reconciliation core
//! that converges webhook and verification signals into one payment state.

pub mod models;
pub mod money;
pub mod providers;
pub mod reconciliation;
pub mod reference;
pub mod service;
pub mod signature;
pub mod traits;
pub mod types;

pub use service::{InitiatePayment, PaymentService, WebhookOutcome};
pub use signature::WebhookVerifier;
pub use traits::PaymentGateway;
