//! Payment service
//!
//! Orchestrates initialization against the gateway and both reconciliation
//! entry points. Every state change after creation happens while the
//! payment's row lock is held, with the gateway re-verification inside the
//! same critical section.

use crate::config::PaymentSettings;
use crate::database::repository::{PaymentFilter, PaymentStore, ProfileStore};
use crate::error::{AppError, AppResult};
use crate::payments::models::{
    GatewayEvent, GatewayEventSource, NewPayment, Payment, ProfilePaymentStatus,
};
use crate::payments::money;
use crate::payments::reconciliation::{self, Transition};
use crate::payments::reference;
use crate::payments::traits::PaymentGateway;
use crate::payments::types::{InitializeRequest, VerifiedTransaction};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Validated input for a new payment
#[derive(Debug, Clone)]
pub struct InitiatePayment {
    pub email: String,
    /// Minor units
    pub amount: i64,
    pub callback_url: Option<String>,
}

/// Result of handling a verified webhook delivery
#[derive(Debug)]
pub enum WebhookOutcome {
    /// No payment with this reference exists; acknowledged without changes
    UnknownReference,
    Reconciled {
        payment: Payment,
        transition: Transition,
    },
}

pub struct PaymentService {
    store: Arc<dyn PaymentStore>,
    profiles: Arc<dyn ProfileStore>,
    gateway: Arc<dyn PaymentGateway>,
    settings: PaymentSettings,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        profiles: Arc<dyn ProfileStore>,
        gateway: Arc<dyn PaymentGateway>,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            store,
            profiles,
            gateway,
            settings,
        }
    }

    pub fn settings(&self) -> &PaymentSettings {
        &self.settings
    }

    /// Create a pending payment backed by a fresh gateway checkout
    pub async fn initialize(&self, request: InitiatePayment) -> AppResult<Payment> {
        self.check_amount(request.amount)?;

        let reference = reference::generate();
        info!(
            reference = %reference,
            amount = request.amount,
            gateway = self.gateway.name(),
            "Initializing payment"
        );

        let checkout = self
            .gateway
            .initialize(InitializeRequest {
                email: request.email.clone(),
                amount: request.amount,
                currency: self.settings.currency.clone(),
                reference: reference.clone(),
                callback_url: request.callback_url,
                metadata: Some(json!({ "customer_email": request.email })),
            })
            .await
            .map_err(|e| {
                error!(reference = %reference, error = %e, "Gateway initialization failed");
                e
            })?;

        // The profile projection is opportunistic
        if let Err(e) = self.profiles.ensure_profile(&request.email).await {
            warn!(email = %request.email, error = %e, "Could not ensure customer profile");
        }

        let new = NewPayment {
            reference,
            amount: request.amount,
            currency: self.settings.currency.clone(),
            customer_email: request.email,
            checkout_url: Some(checkout.checkout_url),
            access_code: Some(checkout.access_code),
            gateway_response: vec![GatewayEvent {
                source: GatewayEventSource::Initialize,
                recorded_at: Utc::now(),
                payload: checkout.raw,
            }],
        };

        let payment = self.store.insert(new).await?;
        info!(reference = %payment.reference, "Payment initialized");
        Ok(payment)
    }

    pub async fn find(&self, reference: &str) -> AppResult<Payment> {
        self.store
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| AppError::payment_not_found(reference))
    }

    pub async fn list(&self, filter: &PaymentFilter) -> AppResult<Vec<Payment>> {
        Ok(self.store.list(filter).await?)
    }

    /// Reconcile a payment after a signature-verified webhook delivery.
    ///
    /// Gateway failures are absorbed into the payment state; only storage
    /// failures surface as errors.
    pub async fn handle_webhook(&self, reference: &str, event: Value) -> AppResult<WebhookOutcome> {
        let Some(mut locked) = self.store.lock_for_update(reference).await? else {
            warn!(reference, "Webhook for unknown payment reference");
            return Ok(WebhookOutcome::UnknownReference);
        };

        let now = Utc::now();
        {
            let payment = locked.payment_mut();
            payment.webhook_received = true;
            payment.record_gateway_event(GatewayEventSource::Webhook, event, now);
        }

        let transition = match self.gateway.verify(reference).await {
            Ok(verified) => Self::apply(locked.payment_mut(), &verified),
            Err(e) => {
                let message = e.to_string();
                let payment = locked.payment_mut();
                payment.record_gateway_event(
                    GatewayEventSource::VerificationError,
                    json!({ "message": message }),
                    Utc::now(),
                );
                reconciliation::apply_verification_failure(
                    payment,
                    &message,
                    self.settings.fail_on_verify_error,
                    Utc::now(),
                )
            }
        };

        let payment = locked.commit().await?;
        self.after_transition(&payment, transition).await;

        info!(
            reference = %payment.reference,
            status = %payment.status,
            ?transition,
            "Webhook reconciled"
        );
        Ok(WebhookOutcome::Reconciled {
            payment,
            transition,
        })
    }

    /// Reconcile a payment on demand.
    ///
    /// A gateway failure is returned to the caller and leaves the payment untouched.
    pub async fn verify(&self, reference: &str) -> AppResult<(Payment, VerifiedTransaction)> {
        let mut locked = self
            .store
            .lock_for_update(reference)
            .await?
            .ok_or_else(|| AppError::payment_not_found(reference))?;

        let verified = match self.gateway.verify(reference).await {
            Ok(verified) => verified,
            Err(e) => {
                error!(reference, error = %e, "Manual verification failed");
                if let Err(rollback_error) = locked.rollback().await {
                    warn!(reference, error = %rollback_error, "Rollback after failed verification failed");
                }
                return Err(e);
            }
        };

        let transition = Self::apply(locked.payment_mut(), &verified);
        let payment = locked.commit().await?;
        self.after_transition(&payment, transition).await;

        info!(
            reference = %payment.reference,
            status = %payment.status,
            ?transition,
            "Manual verification reconciled"
        );
        Ok((payment, verified))
    }

    pub async fn health_check(&self) -> AppResult<()> {
        Ok(self.store.health_check().await?)
    }

    fn apply(payment: &mut Payment, verified: &VerifiedTransaction) -> Transition {
        let now = Utc::now();
        payment.record_gateway_event(GatewayEventSource::Verification, verified.raw.clone(), now);
        reconciliation::apply_verification(payment, verified, now)
    }

    /// Side effects of a committed transition
    async fn after_transition(&self, payment: &Payment, transition: Transition) {
        let status = match transition {
            Transition::Paid { .. } => ProfilePaymentStatus::Completed,
            // A withdrawn success must not leave the profile completed
            Transition::Revoked => ProfilePaymentStatus::Failed,
            _ => return,
        };

        if let Err(e) = self
            .profiles
            .set_payment_status(&payment.customer_email, status)
            .await
        {
            warn!(
                reference = %payment.reference,
                profile_status = status.as_str(),
                error = %e,
                "Could not update customer profile"
            );
        }
    }

    fn check_amount(&self, amount: i64) -> AppResult<()> {
        if amount < self.settings.min_amount {
            return Err(AppError::invalid_field(
                "amount",
                format!(
                    "Ensure this value is greater than or equal to {}.",
                    money::format_minor(self.settings.min_amount)
                ),
            ));
        }
        if amount > self.settings.max_amount {
            return Err(AppError::invalid_field(
                "amount",
                format!(
                    "Amount cannot exceed {}",
                    money::format_minor(self.settings.max_amount)
                ),
            ));
        }
        Ok(())
    }
}
