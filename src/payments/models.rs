//! Payment record and customer profile models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle state of a payment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Cancelled,
    Abandoned,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 6] = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Success,
        PaymentStatus::Failed,
        PaymentStatus::Cancelled,
        PaymentStatus::Abandoned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Abandoned => "abandoned",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Processing => "Processing",
            PaymentStatus::Success => "Success",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Cancelled => "Cancelled",
            PaymentStatus::Abandoned => "Abandoned",
        }
    }

    /// Terminal for the reconciliation engine
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown payment status '{}'", s))
    }
}

/// Why a payment ended up in `failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Gateway reported success for a different amount
    AmountMismatch,
    /// Gateway reported the charge as failed
    GatewayFailed,
    /// The gateway could not be asked
    VerificationUnavailable,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::AmountMismatch => "amount_mismatch",
            FailureKind::GatewayFailed => "gateway_failed",
            FailureKind::VerificationUnavailable => "verification_unavailable",
        }
    }
}

/// Where an audit log entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayEventSource {
    Initialize,
    Webhook,
    Verification,
    VerificationError,
}

/// One raw gateway payload, kept for audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub source: GatewayEventSource,
    pub recorded_at: DateTime<Utc>,
    pub payload: Value,
}

/// One attempted transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub reference: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub customer_email: String,
    pub checkout_url: Option<String>,
    pub access_code: Option<String>,
    pub webhook_received: bool,
    pub webhook_verified: bool,
    /// Append-only
    pub gateway_response: Vec<GatewayEvent>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Build the stored form of a freshly initialized payment
    pub fn from_new(new: NewPayment, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            reference: new.reference,
            amount: new.amount,
            currency: new.currency,
            status: PaymentStatus::Pending,
            customer_email: new.customer_email,
            checkout_url: new.checkout_url,
            access_code: new.access_code,
            webhook_received: false,
            webhook_verified: false,
            gateway_response: new.gateway_response,
            metadata: Value::Object(Map::new()),
            created_at: now,
            updated_at: now,
            paid_at: None,
        }
    }

    pub fn record_gateway_event(
        &mut self,
        source: GatewayEventSource,
        payload: Value,
        at: DateTime<Utc>,
    ) {
        self.gateway_response.push(GatewayEvent {
            source,
            recorded_at: at,
            payload,
        });
    }

    /// Most recent payload recorded from `source`
    pub fn latest_event(&self, source: GatewayEventSource) -> Option<&GatewayEvent> {
        self.gateway_response
            .iter()
            .rev()
            .find(|event| event.source == source)
    }

    pub fn mark_as_paid(&mut self, at: DateTime<Utc>) {
        self.status = PaymentStatus::Success;
        self.paid_at = Some(at);
        self.webhook_verified = true;
    }

    pub fn mark_as_failed(&mut self, kind: FailureKind, reason: impl Into<String>) {
        self.status = PaymentStatus::Failed;
        self.paid_at = None;
        let metadata = self.metadata_mut();
        metadata.insert("failure_reason".to_string(), Value::String(reason.into()));
        metadata.insert(
            "failure_kind".to_string(),
            Value::String(kind.as_str().to_string()),
        );
    }

    /// Withdraw an earlier success; the previous confirmation stays in the audit trail
    pub fn revoke_success(&mut self, kind: FailureKind, reason: impl Into<String>, at: DateTime<Utc>) {
        let reason = reason.into();
        let previous_paid_at = self.paid_at;
        self.mark_as_failed(kind, reason.clone());
        self.webhook_verified = false;
        self.metadata_mut().insert(
            "revoked".to_string(),
            json!({
                "reason": reason,
                "previous_paid_at": previous_paid_at,
                "revoked_at": at,
            }),
        );
    }

    /// Promote a payment failed only for lack of verification
    pub fn recover_as_paid(&mut self, at: DateTime<Utc>) {
        let metadata = self.metadata_mut();
        let reason = metadata.remove("failure_reason");
        let kind = metadata.remove("failure_kind");
        metadata.insert(
            "recovered_from".to_string(),
            json!({
                "failure_kind": kind,
                "failure_reason": reason,
                "recovered_at": at,
            }),
        );
        self.mark_as_paid(at);
    }

    /// Note a signal that was refused because the payment is already terminal
    pub fn record_conflict(&mut self, description: impl Into<String>, at: DateTime<Utc>) {
        let status = self.status;
        let conflicts = self
            .metadata_mut()
            .entry("conflicts")
            .or_insert_with(|| Value::Array(Vec::new()));
        if !conflicts.is_array() {
            *conflicts = Value::Array(Vec::new());
        }
        if let Value::Array(entries) = conflicts {
            entries.push(json!({
                "status": status,
                "description": description.into(),
                "recorded_at": at,
            }));
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.metadata
            .get("failure_kind")
            .cloned()
            .and_then(|kind| serde_json::from_value(kind).ok())
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.metadata.get("failure_reason").and_then(Value::as_str)
    }

    fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        if !self.metadata.is_object() {
            self.metadata = Value::Object(Map::new());
        }
        match &mut self.metadata {
            Value::Object(map) => map,
            _ => unreachable!("metadata was just made an object"),
        }
    }
}

/// Insert form of [`Payment`]
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub reference: String,
    pub amount: i64,
    pub currency: String,
    pub customer_email: String,
    pub checkout_url: Option<String>,
    pub access_code: Option<String>,
    pub gateway_response: Vec<GatewayEvent>,
}

/// Account-level payment status projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfilePaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl ProfilePaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfilePaymentStatus::Pending => "pending",
            ProfilePaymentStatus::Completed => "completed",
            ProfilePaymentStatus::Failed => "failed",
            ProfilePaymentStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for ProfilePaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProfilePaymentStatus::Pending),
            "completed" => Ok(ProfilePaymentStatus::Completed),
            "failed" => Ok(ProfilePaymentStatus::Failed),
            "refunded" => Ok(ProfilePaymentStatus::Refunded),
            other => Err(format!("unknown profile payment status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub email: String,
    pub payment_status: ProfilePaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_payment() -> Payment {
        Payment::from_new(
            NewPayment {
                reference: "PAY_20240122123456_ABC123DEF456".to_string(),
                amount: 10_000,
                currency: "NGN".to_string(),
                customer_email: "a@b.com".to_string(),
                checkout_url: Some("https://pay.example/x".to_string()),
                access_code: Some("ac1".to_string()),
                gateway_response: Vec::new(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in PaymentStatus::ALL {
            assert_eq!(status.as_str().parse::<PaymentStatus>(), Ok(status));
        }
        assert!("paid".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(!PaymentStatus::Processing.is_terminal());
        assert!(PaymentStatus::Success.is_terminal());
        assert!(PaymentStatus::Abandoned.is_terminal());
    }

    #[test]
    fn test_mark_as_paid_sets_paid_at() {
        let mut payment = pending_payment();
        let now = Utc::now();
        payment.mark_as_paid(now);
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.paid_at, Some(now));
        assert!(payment.webhook_verified);
    }

    #[test]
    fn test_mark_as_failed_records_reason() {
        let mut payment = pending_payment();
        payment.mark_as_failed(FailureKind::AmountMismatch, "Amount mismatch: expected 10000, got 9999");
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.failure_kind(), Some(FailureKind::AmountMismatch));
        assert_eq!(
            payment.failure_reason(),
            Some("Amount mismatch: expected 10000, got 9999")
        );
        assert!(payment.paid_at.is_none());
    }

    #[test]
    fn test_revoke_success_clears_paid_at() {
        let mut payment = pending_payment();
        let now = Utc::now();
        payment.mark_as_paid(now);
        payment.revoke_success(FailureKind::AmountMismatch, "Amount mismatch", now);
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert!(payment.paid_at.is_none());
        assert!(!payment.webhook_verified);
        assert!(payment.metadata.get("revoked").is_some());
    }

    #[test]
    fn test_recover_moves_failure_into_history() {
        let mut payment = pending_payment();
        payment.mark_as_failed(FailureKind::VerificationUnavailable, "Verification failed: timeout");
        payment.recover_as_paid(Utc::now());
        assert_eq!(payment.status, PaymentStatus::Success);
        assert!(payment.failure_kind().is_none());
        assert_eq!(
            payment.metadata["recovered_from"]["failure_kind"],
            "verification_unavailable"
        );
    }

    #[test]
    fn test_conflicts_accumulate() {
        let mut payment = pending_payment();
        payment.mark_as_paid(Utc::now());
        payment.record_conflict("gateway reported failed", Utc::now());
        payment.record_conflict("verification unavailable", Utc::now());
        assert_eq!(payment.metadata["conflicts"].as_array().map(Vec::len), Some(2));
        assert_eq!(payment.metadata["conflicts"][0]["status"], "success");
    }

    #[test]
    fn test_gateway_log_is_append_only() {
        let mut payment = pending_payment();
        let now = Utc::now();
        payment.record_gateway_event(GatewayEventSource::Webhook, json!({"n": 1}), now);
        payment.record_gateway_event(GatewayEventSource::Webhook, json!({"n": 2}), now);
        assert_eq!(payment.gateway_response.len(), 2);
        assert_eq!(
            payment.latest_event(GatewayEventSource::Webhook).map(|e| &e.payload),
            Some(&json!({"n": 2}))
        );
    }
}
