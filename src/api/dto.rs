//! Request and response bodies of the payments API

use crate::payments::models::{GatewayEvent, Payment, PaymentStatus};
use crate::payments::money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct InitiatePaymentRequest {
    #[serde(default)]
    #[validate(
        length(min = 1, message = "This field is required."),
        email(message = "Enter a valid email address.")
    )]
    pub email: String,

    /// Major units, as a decimal string or number
    #[serde(default)]
    pub amount: Value,

    #[serde(default)]
    #[validate(url(message = "Enter a valid URL."))]
    pub callback_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitiatePaymentResponse {
    pub reference: String,
    pub checkout_url: Option<String>,
    pub access_code: Option<String>,
    /// Major units
    pub amount: String,
    pub customer_email: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&Payment> for InitiatePaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            reference: payment.reference.clone(),
            checkout_url: payment.checkout_url.clone(),
            access_code: payment.access_code.clone(),
            amount: money::format_minor(payment.amount),
            customer_email: payment.customer_email.clone(),
            status: payment.status,
            created_at: payment.created_at,
        }
    }
}

/// List-view representation of a payment
#[derive(Debug, Serialize)]
pub struct PaymentSummary {
    pub id: Uuid,
    pub reference: String,
    pub customer_email: String,
    /// Minor units
    pub amount: i64,
    /// Major units
    pub amount_display: String,
    pub currency: String,
    pub status: PaymentStatus,
    pub status_display: &'static str,
    pub checkout_url: Option<String>,
    pub webhook_received: bool,
    pub webhook_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<&Payment> for PaymentSummary {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id,
            reference: payment.reference.clone(),
            customer_email: payment.customer_email.clone(),
            amount: payment.amount,
            amount_display: money::format_minor(payment.amount),
            currency: payment.currency.clone(),
            status: payment.status,
            status_display: payment.status.display_name(),
            checkout_url: payment.checkout_url.clone(),
            webhook_received: payment.webhook_received,
            webhook_verified: payment.webhook_verified,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
            paid_at: payment.paid_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentListResponse {
    pub count: usize,
    pub results: Vec<PaymentSummary>,
}

/// Full payment record including the audit trail
#[derive(Debug, Serialize)]
pub struct PaymentDetail {
    #[serde(flatten)]
    pub summary: PaymentSummary,
    pub access_code: Option<String>,
    pub gateway_response: Vec<GatewayEvent>,
    pub metadata: Value,
}

impl From<&Payment> for PaymentDetail {
    fn from(payment: &Payment) -> Self {
        Self {
            summary: PaymentSummary::from(payment),
            access_code: payment.access_code.clone(),
            gateway_response: payment.gateway_response.clone(),
            metadata: payment.metadata.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub reference: String,
    pub status: PaymentStatus,
    /// Minor units, as stored
    pub amount: i64,
    pub currency: String,
    pub customer_email: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub verification_data: Value,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub reference: Option<String>,
    pub trxref: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub reference: String,
    pub status: PaymentStatus,
    /// Major units
    pub amount: String,
    pub customer_email: String,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub email: Option<String>,
}
