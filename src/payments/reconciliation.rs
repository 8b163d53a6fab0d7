//! Payment state reconciliation
//!
//! Pure transition rules applied to a payment held under its row lock. The
//! gateway's verify response is the only input trusted for money movement;
//! webhook bodies merely trigger a re-check.
//!
//! Rules, by what the gateway reports:
//!
//! | gateway            | current state                  | result                          |
//! |--------------------|--------------------------------|---------------------------------|
//! | success, same amt  | pending / processing           | success                         |
//! | success, same amt  | success                        | unchanged                       |
//! | success, same amt  | failed (verification unavail.) | success, audited `recovered_from` |
//! | success, same amt  | other terminal                 | unchanged, conflict recorded    |
//! | success, other amt | success                        | failed, audited `revoked`       |
//! | success, other amt | failed (amount mismatch)       | unchanged                       |
//! | success, other amt | anything else                  | failed (amount mismatch)        |
//! | failed             | pending / processing           | failed (gateway failed)         |
//! | failed             | failed (verification unavail.) | failed (gateway failed)         |
//! | failed             | success                        | unchanged, conflict recorded    |
//! | anything else      | any                            | unchanged                       |

use crate::payments::models::{FailureKind, Payment, PaymentStatus};
use crate::payments::types::{TransactionStatus, VerifiedTransaction};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Webhook event types that trigger reconciliation
pub const SUPPORTED_EVENTS: [&str; 2] = ["charge.success", "charge.failed"];

pub fn is_supported_event(event: &str) -> bool {
    SUPPORTED_EVENTS.contains(&event)
}

/// What a reconciliation step did to the payment's status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Status untouched
    Unchanged,
    /// Moved into `success`; `recovered` when leaving a verification-unavailable failure
    Paid { recovered: bool },
    /// Moved into (or re-classified within) `failed`
    Failed { kind: FailureKind },
    /// An earlier success was withdrawn
    Revoked,
    /// A contradicting signal was refused and recorded in metadata
    Conflict,
}

impl Transition {
    /// Whether the payment entered `success` in this step
    pub fn is_paid(&self) -> bool {
        matches!(self, Transition::Paid { .. })
    }
}

fn is_open(status: PaymentStatus) -> bool {
    !status.is_terminal()
}

/// Apply a successful verify response to `payment`
pub fn apply_verification(
    payment: &mut Payment,
    verified: &VerifiedTransaction,
    now: DateTime<Utc>,
) -> Transition {
    match &verified.status {
        TransactionStatus::Success if verified.amount == payment.amount => {
            confirm_success(payment, now)
        }
        TransactionStatus::Success => reject_amount(payment, verified.amount, now),
        TransactionStatus::Failed => apply_gateway_failure(payment, verified, now),
        other => {
            info!(
                reference = %payment.reference,
                gateway_status = ?other,
                "Gateway status is not final, leaving payment as is"
            );
            Transition::Unchanged
        }
    }
}

/// Apply a verify call that could not be completed
pub fn apply_verification_failure(
    payment: &mut Payment,
    error: &str,
    fail_on_verify_error: bool,
    now: DateTime<Utc>,
) -> Transition {
    if is_open(payment.status) {
        if !fail_on_verify_error {
            warn!(
                reference = %payment.reference,
                error,
                "Verification unavailable, payment left open for retry"
            );
            return Transition::Unchanged;
        }
        warn!(reference = %payment.reference, error, "Verification unavailable, failing payment");
        payment.mark_as_failed(
            FailureKind::VerificationUnavailable,
            format!("Verification failed: {}", error),
        );
        return Transition::Failed {
            kind: FailureKind::VerificationUnavailable,
        };
    }

    payment.record_conflict(format!("Verification unavailable: {}", error), now);
    Transition::Conflict
}

fn confirm_success(payment: &mut Payment, now: DateTime<Utc>) -> Transition {
    match payment.status {
        PaymentStatus::Pending | PaymentStatus::Processing => {
            payment.mark_as_paid(now);
            info!(reference = %payment.reference, amount = payment.amount, "Payment confirmed");
            Transition::Paid { recovered: false }
        }
        PaymentStatus::Success => Transition::Unchanged,
        PaymentStatus::Failed
            if payment.failure_kind() == Some(FailureKind::VerificationUnavailable) =>
        {
            payment.recover_as_paid(now);
            info!(reference = %payment.reference, "Payment recovered after verification outage");
            Transition::Paid { recovered: true }
        }
        status => {
            warn!(
                reference = %payment.reference,
                %status,
                "Gateway reports success for a terminal payment"
            );
            payment.record_conflict(
                format!("Gateway reported success while payment was {}", status),
                now,
            );
            Transition::Conflict
        }
    }
}

fn reject_amount(payment: &mut Payment, observed: i64, now: DateTime<Utc>) -> Transition {
    let reason = format!(
        "Amount mismatch: expected {}, got {}",
        payment.amount, observed
    );
    warn!(
        reference = %payment.reference,
        expected = payment.amount,
        observed,
        "Verified amount does not match stored amount"
    );

    match payment.status {
        PaymentStatus::Success => {
            payment.revoke_success(FailureKind::AmountMismatch, reason, now);
            Transition::Revoked
        }
        PaymentStatus::Failed if payment.failure_kind() == Some(FailureKind::AmountMismatch) => {
            Transition::Unchanged
        }
        _ => {
            payment.mark_as_failed(FailureKind::AmountMismatch, reason);
            Transition::Failed {
                kind: FailureKind::AmountMismatch,
            }
        }
    }
}

fn apply_gateway_failure(
    payment: &mut Payment,
    verified: &VerifiedTransaction,
    now: DateTime<Utc>,
) -> Transition {
    let reason = match verified.gateway_message.as_deref() {
        Some(message) if !message.is_empty() => format!("Payment status: failed ({})", message),
        _ => "Payment status: failed".to_string(),
    };

    match payment.status {
        PaymentStatus::Pending | PaymentStatus::Processing => {
            warn!(reference = %payment.reference, %reason, "Gateway reports payment failed");
            payment.mark_as_failed(FailureKind::GatewayFailed, reason);
            Transition::Failed {
                kind: FailureKind::GatewayFailed,
            }
        }
        PaymentStatus::Failed
            if payment.failure_kind() == Some(FailureKind::VerificationUnavailable) =>
        {
            payment.mark_as_failed(FailureKind::GatewayFailed, reason);
            Transition::Failed {
                kind: FailureKind::GatewayFailed,
            }
        }
        PaymentStatus::Success => {
            warn!(
                reference = %payment.reference,
                "Gateway reports failure for a successful payment"
            );
            payment.record_conflict(format!("Gateway reported failure: {}", reason), now);
            Transition::Conflict
        }
        _ => Transition::Unchanged,
    }
}
