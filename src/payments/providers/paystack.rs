//! Paystack gateway client
//!
//! Wraps Paystack's transaction API (initialize, verify). Paystack answers
//! every call with an envelope `{status, message, data}` whose `status` flag is
//! independent of the HTTP status, so both are checked. Requests are made
//! once; retrying is left to the caller.

use crate::error::{AppError, AppErrorKind, AppResult, ExternalError};
use crate::payments::traits::PaymentGateway;
use crate::payments::types::{
    InitializeRequest, InitializeResponse, TransactionStatus, VerifiedTransaction,
};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info};

const PROVIDER: &str = "Paystack";

/// Paystack client configuration
#[derive(Clone)]
pub struct PaystackConfig {
    /// Paystack API secret key; also the webhook signing key
    pub secret_key: String,
    /// Paystack API base URL (defaults to https://api.paystack.co)
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for PaystackConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            base_url: "https://api.paystack.co".to_string(),
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for PaystackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaystackConfig")
            .field("secret_key", &"[redacted]")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Paystack payment gateway
pub struct PaystackProvider {
    config: PaystackConfig,
    client: Client,
}

impl PaystackProvider {
    pub fn new(config: PaystackConfig) -> AppResult<Self> {
        if config.secret_key.trim().is_empty() {
            return Err(AppError::configuration("Paystack secret key is empty"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    fn transport_error(&self, endpoint: &str, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            error!(endpoint, timeout_secs = self.config.timeout_secs, "Paystack request timed out");
            AppError::new(AppErrorKind::External(ExternalError::Timeout {
                service: PROVIDER.to_string(),
                seconds: self.config.timeout_secs,
            }))
        } else {
            error!(endpoint, error = %e, "Paystack request failed");
            AppError::gateway(PROVIDER, format!("HTTP request failed: {}", e), true)
        }
    }

    /// Make an authenticated request and unwrap the response envelope.
    ///
    /// Returns the typed `data` section alongside its raw JSON.
    async fn make_request<T>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> AppResult<(T, serde_json::Value)>
    where
        T: DeserializeOwned,
    {
        let mut request = self
            .client
            .request(method.clone(), self.url(endpoint))
            .bearer_auth(&self.config.secret_key)
            .header(CONTENT_TYPE, "application/json");

        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, endpoint, "Sending Paystack request");

        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;
        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;
        let envelope = serde_json::from_str::<PaystackResponse>(&response_text).ok();

        if !status.is_success() {
            let message = envelope
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| response_text.chars().take(200).collect());
            error!(endpoint, status = status.as_u16(), %message, "Paystack API error");
            return Err(AppError::gateway(
                PROVIDER,
                format!("HTTP {}: {}", status.as_u16(), message),
                status.is_server_error() || status.as_u16() == 429,
            ));
        }

        let envelope = envelope.ok_or_else(|| {
            error!(endpoint, "Paystack returned a non-JSON body");
            AppError::gateway(PROVIDER, "Invalid response format", false)
        })?;

        if !envelope.status {
            let message = if envelope.message.is_empty() {
                "Unknown Paystack API error".to_string()
            } else {
                envelope.message
            };
            error!(endpoint, %message, "Paystack API error");
            return Err(AppError::gateway(PROVIDER, message, false));
        }

        let data = envelope.data.unwrap_or(serde_json::Value::Null);
        let parsed = serde_json::from_value::<T>(data.clone()).map_err(|e| {
            error!(endpoint, error = %e, "Failed to parse Paystack response");
            AppError::gateway(PROVIDER, format!("Invalid response format: {}", e), false)
        })?;

        debug!(endpoint, "Paystack request succeeded");
        Ok((parsed, data))
    }
}

#[async_trait]
impl PaymentGateway for PaystackProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn initialize(&self, request: InitializeRequest) -> AppResult<InitializeResponse> {
        info!(
            reference = %request.reference,
            amount = request.amount,
            currency = %request.currency,
            "Initializing Paystack transaction"
        );

        let mut payload = serde_json::json!({
            "email": request.email,
            "amount": request.amount,
            "currency": request.currency,
            "reference": request.reference,
        });

        if let Some(callback_url) = request.callback_url {
            payload["callback_url"] = serde_json::Value::String(callback_url);
        }

        if let Some(metadata) = request.metadata {
            payload["metadata"] = metadata;
        }

        let result: AppResult<(PaystackInitializeResponse, serde_json::Value)> = self
            .make_request(Method::POST, "/transaction/initialize", Some(&payload))
            .await;
        let (response, raw) = result.map_err(|e| {
            error!(reference = %request.reference, error = %e, "Failed to initialize transaction");
            e
        })?;

        info!(reference = %request.reference, "Paystack transaction initialized");

        Ok(InitializeResponse {
            checkout_url: response.authorization_url,
            access_code: response.access_code,
            reference: response.reference.unwrap_or(request.reference),
            raw,
        })
    }

    async fn verify(&self, reference: &str) -> AppResult<VerifiedTransaction> {
        info!(reference, "Verifying Paystack transaction");

        let result: AppResult<(PaystackVerifyResponse, serde_json::Value)> = self
            .make_request(
                Method::GET,
                &format!("/transaction/verify/{}", reference),
                None,
            )
            .await;
        let (response, raw) = result.map_err(|e| {
            error!(reference, error = %e, "Failed to verify transaction");
            e
        })?;

        info!(
            reference,
            status = %response.status,
            amount = response.amount,
            "Paystack transaction verified"
        );

        Ok(VerifiedTransaction {
            reference: response.reference.unwrap_or_else(|| reference.to_string()),
            status: TransactionStatus::from_gateway(&response.status),
            amount: response.amount,
            currency: response.currency.unwrap_or_default(),
            gateway_message: response.gateway_response,
            paid_at: response.paid_at,
            channel: response.channel,
            raw,
        })
    }
}

// Paystack API response wrapper
#[derive(Debug, Deserialize)]
struct PaystackResponse {
    status: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

// Initialize transaction response
#[derive(Debug, Deserialize)]
struct PaystackInitializeResponse {
    authorization_url: String,
    access_code: String,
    #[serde(default)]
    reference: Option<String>,
}

// Verify transaction response
#[derive(Debug, Deserialize)]
struct PaystackVerifyResponse {
    amount: i64,
    status: String,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    paid_at: Option<String>,
    #[serde(default)]
    gateway_response: Option<String>,
}
