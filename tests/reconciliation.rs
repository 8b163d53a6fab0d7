//! Reconciliation flows through `PaymentService` against the in-process store

mod common;

use common::{charge_event, Harness, ACCESS_CODE, CHECKOUT_URL};
use paystack_reconciler::config::PaymentSettings;
use paystack_reconciler::database::repository::{PaymentStore, ProfileStore};
use paystack_reconciler::payments::models::{
    FailureKind, GatewayEventSource, PaymentStatus, ProfilePaymentStatus,
};
use paystack_reconciler::payments::reconciliation::Transition;
use paystack_reconciler::payments::{InitiatePayment, WebhookOutcome};
use std::time::Duration;

fn initiate(amount: i64) -> InitiatePayment {
    InitiatePayment {
        email: "a@b.com".to_string(),
        amount,
        callback_url: None,
    }
}

fn reconciled(outcome: WebhookOutcome) -> (PaymentStatus, Transition) {
    match outcome {
        WebhookOutcome::Reconciled {
            payment,
            transition,
        } => (payment.status, transition),
        WebhookOutcome::UnknownReference => panic!("expected a known reference"),
    }
}

#[tokio::test]
async fn test_initialize_then_successful_webhook() {
    let h = Harness::new();

    let payment = h.service.initialize(initiate(10_000)).await.unwrap();
    assert_eq!(payment.amount, 10_000);
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.checkout_url.as_deref(), Some(CHECKOUT_URL));
    assert_eq!(payment.access_code.as_deref(), Some(ACCESS_CODE));
    assert!(payment.paid_at.is_none());
    assert!(payment.latest_event(GatewayEventSource::Initialize).is_some());

    let sent = h.gateway.initialize_requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].amount, 10_000);
    assert_eq!(sent[0].reference, payment.reference);

    let profile = h.profiles.find_profile("a@b.com").await.unwrap().unwrap();
    assert_eq!(profile.payment_status, ProfilePaymentStatus::Pending);

    h.gateway.respond("success", 10_000);
    let event = charge_event("charge.success", &payment.reference, 10_000);
    let outcome = h.service.handle_webhook(&payment.reference, event).await.unwrap();
    assert_eq!(
        reconciled(outcome),
        (PaymentStatus::Success, Transition::Paid { recovered: false })
    );

    let stored = h.service.find(&payment.reference).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Success);
    assert!(stored.paid_at.is_some());
    assert!(stored.webhook_received);
    assert!(stored.webhook_verified);
    assert!(stored.latest_event(GatewayEventSource::Webhook).is_some());
    assert!(stored.latest_event(GatewayEventSource::Verification).is_some());

    let profile = h.profiles.find_profile("a@b.com").await.unwrap().unwrap();
    assert_eq!(profile.payment_status, ProfilePaymentStatus::Completed);
}

#[tokio::test]
async fn test_amount_mismatch_fails_payment() {
    let h = Harness::new();
    let payment = h.service.initialize(initiate(10_000)).await.unwrap();

    h.gateway.respond("success", 9_999);
    let event = charge_event("charge.success", &payment.reference, 10_000);
    h.service.handle_webhook(&payment.reference, event).await.unwrap();

    let stored = h.service.find(&payment.reference).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Failed);
    assert!(stored.paid_at.is_none());
    assert!(!stored.webhook_verified);
    assert_eq!(stored.failure_kind(), Some(FailureKind::AmountMismatch));
    assert!(stored.failure_reason().unwrap().contains("expected 10000, got 9999"));
    assert_eq!(h.profiles.updates(), 0);
}

#[tokio::test]
async fn test_repeated_webhook_finalizes_once() {
    let h = Harness::new();
    let payment = h.service.initialize(initiate(10_000)).await.unwrap();
    let event = charge_event("charge.success", &payment.reference, 10_000);

    h.service
        .handle_webhook(&payment.reference, event.clone())
        .await
        .unwrap();
    let first_paid_at = h.service.find(&payment.reference).await.unwrap().paid_at;

    for _ in 0..4 {
        let outcome = h
            .service
            .handle_webhook(&payment.reference, event.clone())
            .await
            .unwrap();
        assert_eq!(reconciled(outcome).1, Transition::Unchanged);
    }

    let stored = h.service.find(&payment.reference).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Success);
    assert_eq!(stored.paid_at, first_paid_at);
    assert_eq!(h.profiles.updates(), 1);

    let webhooks = stored
        .gateway_response
        .iter()
        .filter(|e| e.source == GatewayEventSource::Webhook)
        .count();
    assert_eq!(webhooks, 5);
}

#[tokio::test]
async fn test_unknown_reference_is_a_no_op() {
    let h = Harness::new();
    let event = charge_event("charge.success", "PAY_20240101000000_UNKNOWN00000", 10_000);

    let outcome = h
        .service
        .handle_webhook("PAY_20240101000000_UNKNOWN00000", event)
        .await
        .unwrap();
    assert!(matches!(outcome, WebhookOutcome::UnknownReference));
    assert_eq!(h.gateway.verify_calls(), 0);
    assert!(h.store.list(&Default::default()).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_webhook_and_manual_verify_serialize() {
    let h = Harness::new();
    let payment = h.service.initialize(initiate(10_000)).await.unwrap();
    h.gateway.slow_verify(Duration::from_millis(100));

    let webhook = {
        let service = h.service.clone();
        let reference = payment.reference.clone();
        tokio::spawn(async move {
            let event = charge_event("charge.success", &reference, 10_000);
            service.handle_webhook(&reference, event).await
        })
    };
    let manual = {
        let service = h.service.clone();
        let reference = payment.reference.clone();
        tokio::spawn(async move { service.verify(&reference).await })
    };

    let webhook = webhook.await.unwrap().unwrap();
    let (manual_payment, _) = manual.await.unwrap().unwrap();

    let webhook_status = reconciled(webhook).0;
    assert_eq!(webhook_status, PaymentStatus::Success);
    assert_eq!(manual_payment.status, PaymentStatus::Success);
    assert_eq!(h.gateway.verify_calls(), 2);
    assert_eq!(h.profiles.updates(), 1);

    let first = h.service.find(&payment.reference).await.unwrap();
    let again = h.service.find(&payment.reference).await.unwrap();
    assert_eq!(first, again);
    assert!(first.paid_at.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deliveries_produce_one_transition() {
    let h = Harness::new();
    let payment = h.service.initialize(initiate(10_000)).await.unwrap();
    h.gateway.slow_verify(Duration::from_millis(10));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let service = h.service.clone();
            let reference = payment.reference.clone();
            tokio::spawn(async move {
                let event = charge_event("charge.success", &reference, 10_000);
                service.handle_webhook(&reference, event).await
            })
        })
        .collect();

    let mut paid = 0;
    for handle in handles {
        if let WebhookOutcome::Reconciled { transition, .. } = handle.await.unwrap().unwrap() {
            if transition.is_paid() {
                paid += 1;
            }
        }
    }

    assert_eq!(paid, 1);
    assert_eq!(h.profiles.updates(), 1);
}

#[tokio::test]
async fn test_mismatch_is_never_overwritten_by_later_success() {
    let h = Harness::new();
    let payment = h.service.initialize(initiate(10_000)).await.unwrap();

    h.gateway.respond("success", 1);
    let event = charge_event("charge.success", &payment.reference, 10_000);
    h.service
        .handle_webhook(&payment.reference, event.clone())
        .await
        .unwrap();

    // A later matching confirmation must not undo the fraud signal
    h.gateway.respond("success", 10_000);
    let outcome = h.service.handle_webhook(&payment.reference, event).await.unwrap();
    assert_eq!(
        reconciled(outcome),
        (PaymentStatus::Failed, Transition::Conflict)
    );
    assert_eq!(h.profiles.updates(), 0);
}

#[tokio::test]
async fn test_gateway_failure_status_fails_payment() {
    let h = Harness::new();
    let payment = h.service.initialize(initiate(10_000)).await.unwrap();

    h.gateway.respond("failed", 10_000);
    let event = charge_event("charge.failed", &payment.reference, 10_000);
    h.service.handle_webhook(&payment.reference, event).await.unwrap();

    let stored = h.service.find(&payment.reference).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Failed);
    assert_eq!(stored.failure_kind(), Some(FailureKind::GatewayFailed));
    assert!(stored.webhook_received);
}

#[tokio::test]
async fn test_in_flight_gateway_status_keeps_payment_pending() {
    let h = Harness::new();
    let payment = h.service.initialize(initiate(10_000)).await.unwrap();

    h.gateway.respond("ongoing", 10_000);
    let event = charge_event("charge.success", &payment.reference, 10_000);
    h.service.handle_webhook(&payment.reference, event).await.unwrap();

    let stored = h.service.find(&payment.reference).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert!(stored.webhook_received);
    assert!(stored.paid_at.is_none());
}

#[tokio::test]
async fn test_verification_outage_fails_then_recovers() {
    let h = Harness::new();
    let payment = h.service.initialize(initiate(10_000)).await.unwrap();

    h.gateway.fail_verify("connection reset");
    let event = charge_event("charge.success", &payment.reference, 10_000);
    h.service
        .handle_webhook(&payment.reference, event.clone())
        .await
        .unwrap();

    let stored = h.service.find(&payment.reference).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Failed);
    assert_eq!(stored.failure_kind(), Some(FailureKind::VerificationUnavailable));
    assert!(stored.failure_reason().unwrap().starts_with("Verification failed:"));
    assert!(stored
        .latest_event(GatewayEventSource::VerificationError)
        .is_some());

    h.gateway.respond("success", 10_000);
    let outcome = h.service.handle_webhook(&payment.reference, event).await.unwrap();
    assert_eq!(
        reconciled(outcome),
        (PaymentStatus::Success, Transition::Paid { recovered: true })
    );

    let stored = h.service.find(&payment.reference).await.unwrap();
    assert!(stored.paid_at.is_some());
    assert!(stored.metadata.get("recovered_from").is_some());
    assert_eq!(h.profiles.updates(), 1);
}

#[tokio::test]
async fn test_lenient_policy_leaves_payment_open() {
    let h = Harness::with_settings(PaymentSettings {
        fail_on_verify_error: false,
        ..PaymentSettings::default()
    });
    let payment = h.service.initialize(initiate(10_000)).await.unwrap();

    h.gateway.fail_verify("timed out");
    let event = charge_event("charge.success", &payment.reference, 10_000);
    h.service.handle_webhook(&payment.reference, event).await.unwrap();

    let stored = h.service.find(&payment.reference).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert!(stored.webhook_received);
}

#[tokio::test]
async fn test_success_is_not_overwritten_by_later_failure() {
    let h = Harness::new();
    let payment = h.service.initialize(initiate(10_000)).await.unwrap();
    let event = charge_event("charge.success", &payment.reference, 10_000);
    h.service
        .handle_webhook(&payment.reference, event.clone())
        .await
        .unwrap();

    h.gateway.respond("failed", 10_000);
    h.service
        .handle_webhook(&payment.reference, event.clone())
        .await
        .unwrap();
    h.gateway.fail_verify("gateway down");
    h.service.handle_webhook(&payment.reference, event).await.unwrap();

    let stored = h.service.find(&payment.reference).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Success);
    assert!(stored.paid_at.is_some());
    assert_eq!(
        stored.metadata["conflicts"].as_array().map(Vec::len),
        Some(2)
    );
}

#[tokio::test]
async fn test_revoked_success_marks_profile_failed() {
    let h = Harness::new();
    let payment = h.service.initialize(initiate(10_000)).await.unwrap();
    let event = charge_event("charge.success", &payment.reference, 10_000);
    h.service
        .handle_webhook(&payment.reference, event.clone())
        .await
        .unwrap();
    let profile = h.profiles.find_profile("a@b.com").await.unwrap().unwrap();
    assert_eq!(profile.payment_status, ProfilePaymentStatus::Completed);

    h.gateway.respond("success", 1);
    let outcome = h.service.handle_webhook(&payment.reference, event).await.unwrap();
    assert_eq!(reconciled(outcome), (PaymentStatus::Failed, Transition::Revoked));

    let profile = h.profiles.find_profile("a@b.com").await.unwrap().unwrap();
    assert_eq!(profile.payment_status, ProfilePaymentStatus::Failed);
    assert_eq!(h.profiles.updates(), 2);
}

#[tokio::test]
async fn test_manual_verify_does_not_mark_webhook_received() {
    let h = Harness::new();
    let payment = h.service.initialize(initiate(10_000)).await.unwrap();

    let (verified_payment, verification) = h.service.verify(&payment.reference).await.unwrap();
    assert_eq!(verified_payment.status, PaymentStatus::Success);
    assert!(!verified_payment.webhook_received);
    assert!(verified_payment.webhook_verified);
    assert_eq!(verification.amount, 10_000);
    assert_eq!(h.profiles.updates(), 1);
}

#[tokio::test]
async fn test_manual_verify_gateway_error_leaves_payment_untouched() {
    let h = Harness::new();
    let payment = h.service.initialize(initiate(10_000)).await.unwrap();

    h.gateway.fail_verify("HTTP 503: Service unavailable");
    let err = h.service.verify(&payment.reference).await.unwrap_err();
    assert!(err.is_gateway());

    let stored = h.service.find(&payment.reference).await.unwrap();
    assert_eq!(stored, payment);
}

#[tokio::test]
async fn test_manual_verify_unknown_reference() {
    let h = Harness::new();
    let err = h.service.verify("PAY_missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(h.gateway.verify_calls(), 0);
}

#[tokio::test]
async fn test_initialize_enforces_amount_bounds() {
    let h = Harness::new();

    assert!(h.service.initialize(initiate(99)).await.unwrap_err().is_validation());
    assert!(h
        .service
        .initialize(initiate(100_000_001))
        .await
        .unwrap_err()
        .is_validation());
    assert!(h.service.initialize(initiate(100)).await.is_ok());
    assert!(h.service.initialize(initiate(100_000_000)).await.is_ok());
    assert_eq!(h.gateway.initialize_requests().len(), 2);
}

#[tokio::test]
async fn test_initialize_gateway_failure_stores_nothing() {
    let h = Harness::new();
    h.gateway.fail_initialize("Invalid key");

    let err = h.service.initialize(initiate(10_000)).await.unwrap_err();
    assert!(err.is_gateway());
    assert!(h.store.list(&Default::default()).await.unwrap().is_empty());
    assert!(h.profiles.find_profile("a@b.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_initialized_references_are_distinct() {
    let h = Harness::new();
    let first = h.service.initialize(initiate(10_000)).await.unwrap();
    let second = h.service.initialize(initiate(10_000)).await.unwrap();
    assert_ne!(first.reference, second.reference);
    assert!(first.reference.starts_with("PAY_"));
}
