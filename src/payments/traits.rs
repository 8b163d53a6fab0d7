//! Payment gateway trait definition
//!
//! The reconciliation engine only talks to the gateway through this trait,
//! so tests and alternative providers can stand in for Paystack.

use crate::error::AppResult;
use crate::payments::types::{InitializeRequest, InitializeResponse, VerifiedTransaction};
use async_trait::async_trait;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider name used in logs and error messages
    fn name(&self) -> &'static str;

    /// Initialize a payment transaction
    ///
    /// Returns the hosted checkout URL and access code for `request.reference`.
    /// Transport failures, non-2xx responses and envelopes with `status: false`
    /// all fail with an external error carrying the upstream message.
    async fn initialize(&self, request: InitializeRequest) -> AppResult<InitializeResponse>;

    /// Look up the authoritative state of a transaction by reference
    ///
    /// Same failure semantics as [`PaymentGateway::initialize`]. No retries.
    async fn verify(&self, reference: &str) -> AppResult<VerifiedTransaction>;
}
