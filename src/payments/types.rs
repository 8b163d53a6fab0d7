//! Payment gateway types and data structures
//!
//! Gateway-neutral requests and responses exchanged with a [`PaymentGateway`].
//!
//! [`PaymentGateway`]: crate::payments::traits::PaymentGateway

use serde::{Deserialize, Serialize};

/// Request for initializing a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequest {
    /// Customer email address
    pub email: String,
    /// Amount in smallest currency unit (e.g., kobo for NGN)
    pub amount: i64,
    /// Currency code (NGN, GHS, ZAR, etc.)
    pub currency: String,
    /// Unique reference for this transaction (for idempotency)
    pub reference: String,
    /// Callback URL to redirect after payment
    pub callback_url: Option<String>,
    /// Additional metadata
    pub metadata: Option<serde_json::Value>,
}

/// Checkout artifacts returned by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResponse {
    /// Hosted checkout page
    pub checkout_url: String,
    /// Access code for inline payment forms
    pub access_code: String,
    /// Transaction reference echoed by the gateway
    pub reference: String,
    /// Raw `data` section of the gateway response
    pub raw: serde_json::Value,
}

/// Transaction status as reported by the gateway's verify endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Success,
    Failed,
    Abandoned,
    Reversed,
    /// Still in flight (`pending`, `ongoing`, `processing`, `queued`)
    Pending,
    /// Anything the gateway may add later
    Other(String),
}

impl TransactionStatus {
    pub fn from_gateway(status: &str) -> Self {
        match status {
            "success" => TransactionStatus::Success,
            "failed" => TransactionStatus::Failed,
            "abandoned" => TransactionStatus::Abandoned,
            "reversed" => TransactionStatus::Reversed,
            "pending" | "ongoing" | "processing" | "queued" => TransactionStatus::Pending,
            other => TransactionStatus::Other(other.to_string()),
        }
    }
}

/// Result of a verify-by-reference lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedTransaction {
    pub reference: String,
    pub status: TransactionStatus,
    /// Amount in smallest currency unit
    pub amount: i64,
    pub currency: String,
    /// Gateway's human-readable outcome message
    pub gateway_message: Option<String>,
    pub paid_at: Option<String>,
    pub channel: Option<String>,
    /// Raw `data` section of the gateway response
    pub raw: serde_json::Value,
}
