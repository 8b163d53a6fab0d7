//! Shared fixtures for integration tests
//!
//! `StubGateway` stands in for Paystack: initialization hands out a fixed
//! checkout, and verification answers whatever the test scripted last.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use paystack_reconciler::api::{self, AppState};
use paystack_reconciler::config::PaymentSettings;
use paystack_reconciler::database::error::DatabaseError;
use paystack_reconciler::database::memory::{InMemoryPaymentStore, InMemoryProfileStore};
use paystack_reconciler::database::repository::ProfileStore;
use paystack_reconciler::error::{AppError, AppResult};
use paystack_reconciler::payments::models::{CustomerProfile, ProfilePaymentStatus};
use paystack_reconciler::payments::types::{
    InitializeRequest, InitializeResponse, TransactionStatus, VerifiedTransaction,
};
use paystack_reconciler::payments::{PaymentGateway, PaymentService, WebhookVerifier};

pub const SECRET: &str = "sk_test_reconciler";
pub const CHECKOUT_URL: &str = "https://pay.example/x";
pub const ACCESS_CODE: &str = "ac1";

#[derive(Debug, Clone)]
enum VerifyScript {
    Respond { status: String, amount: i64 },
    Fail(String),
}

pub struct StubGateway {
    verify_script: Mutex<VerifyScript>,
    initialize_error: Mutex<Option<String>>,
    initialize_requests: Mutex<Vec<InitializeRequest>>,
    verify_calls: AtomicUsize,
    delay: Mutex<Duration>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self {
            verify_script: Mutex::new(VerifyScript::Respond {
                status: "success".to_string(),
                amount: 10_000,
            }),
            initialize_error: Mutex::new(None),
            initialize_requests: Mutex::new(Vec::new()),
            verify_calls: AtomicUsize::new(0),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn respond(&self, status: &str, amount: i64) {
        *self.verify_script.lock().unwrap() = VerifyScript::Respond {
            status: status.to_string(),
            amount,
        };
    }

    pub fn fail_verify(&self, message: &str) {
        *self.verify_script.lock().unwrap() = VerifyScript::Fail(message.to_string());
    }

    pub fn fail_initialize(&self, message: &str) {
        *self.initialize_error.lock().unwrap() = Some(message.to_string());
    }

    /// Make every verify call take this long
    pub fn slow_verify(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn initialize_requests(&self) -> Vec<InitializeRequest> {
        self.initialize_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    fn name(&self) -> &'static str {
        "Stub"
    }

    async fn initialize(&self, request: InitializeRequest) -> AppResult<InitializeResponse> {
        self.initialize_requests.lock().unwrap().push(request.clone());
        if let Some(message) = self.initialize_error.lock().unwrap().clone() {
            return Err(AppError::gateway("Stub", message, false));
        }

        Ok(InitializeResponse {
            checkout_url: CHECKOUT_URL.to_string(),
            access_code: ACCESS_CODE.to_string(),
            reference: request.reference.clone(),
            raw: json!({
                "authorization_url": CHECKOUT_URL,
                "access_code": ACCESS_CODE,
                "reference": request.reference,
            }),
        })
    }

    async fn verify(&self, reference: &str) -> AppResult<VerifiedTransaction> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let script = self.verify_script.lock().unwrap().clone();
        match script {
            VerifyScript::Respond { status, amount } => Ok(VerifiedTransaction {
                reference: reference.to_string(),
                status: TransactionStatus::from_gateway(&status),
                amount,
                currency: "NGN".to_string(),
                gateway_message: Some("Approved".to_string()),
                paid_at: None,
                channel: Some("card".to_string()),
                raw: json!({ "reference": reference, "status": status, "amount": amount }),
            }),
            VerifyScript::Fail(message) => Err(AppError::gateway("Stub", message, true)),
        }
    }
}

/// Profile store that counts status updates
#[derive(Default)]
pub struct CountingProfiles {
    inner: InMemoryProfileStore,
    updates: AtomicUsize,
}

impl CountingProfiles {
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileStore for CountingProfiles {
    async fn ensure_profile(&self, email: &str) -> Result<CustomerProfile, DatabaseError> {
        self.inner.ensure_profile(email).await
    }

    async fn find_profile(&self, email: &str) -> Result<Option<CustomerProfile>, DatabaseError> {
        self.inner.find_profile(email).await
    }

    async fn set_payment_status(
        &self,
        email: &str,
        status: ProfilePaymentStatus,
    ) -> Result<(), DatabaseError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.set_payment_status(email, status).await
    }
}

pub struct Harness {
    pub gateway: Arc<StubGateway>,
    pub store: InMemoryPaymentStore,
    pub profiles: Arc<CountingProfiles>,
    pub service: Arc<PaymentService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(PaymentSettings::default())
    }

    pub fn with_settings(settings: PaymentSettings) -> Self {
        let gateway = Arc::new(StubGateway::new());
        let store = InMemoryPaymentStore::new();
        let profiles = Arc::new(CountingProfiles::default());
        let service = Arc::new(PaymentService::new(
            Arc::new(store.clone()),
            profiles.clone(),
            gateway.clone(),
            settings,
        ));

        Self {
            gateway,
            store,
            profiles,
            service,
        }
    }

    pub fn router(&self) -> axum::Router {
        api::router(AppState {
            service: self.service.clone(),
            verifier: Arc::new(WebhookVerifier::new(SECRET)),
            environment: "development".to_string(),
        })
    }
}

pub fn sign(body: &[u8]) -> String {
    WebhookVerifier::new(SECRET).sign(body)
}

pub fn charge_event(event: &str, reference: &str, amount: i64) -> serde_json::Value {
    json!({
        "event": event,
        "data": {
            "reference": reference,
            "status": if event == "charge.success" { "success" } else { "failed" },
            "amount": amount,
        }
    })
}
