//! Application error taxonomy
//!
//! Every failure that crosses a module boundary is an [`AppError`]. The kind
//! decides the HTTP status at the API edge; the optional context becomes the
//! headline of the JSON error body.

use crate::database::error::{DatabaseError, DatabaseErrorKind};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Failures talking to the payment gateway
#[derive(Debug, Clone, Error)]
pub enum ExternalError {
    #[error("{provider} error: {message}")]
    PaymentProvider {
        provider: String,
        message: String,
        is_retryable: bool,
    },

    #[error("{service} request timed out after {seconds} seconds")]
    Timeout { service: String, seconds: u64 },
}

#[derive(Debug, Clone, Error)]
pub enum InfrastructureError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Error)]
pub enum AppErrorKind {
    /// Malformed or out-of-range caller input. `details` maps field names to messages.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        details: serde_json::Value,
    },

    #[error(transparent)]
    External(ExternalError),

    #[error("Webhook signature rejected: {message}")]
    Signature { message: String },

    #[error("{entity} '{reference}' not found")]
    NotFound { entity: String, reference: String },

    #[error("Integrity violation: {message}")]
    Integrity { message: String },

    #[error(transparent)]
    Infrastructure(InfrastructureError),
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub context: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn validation(message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::new(AppErrorKind::Validation {
            message: message.into(),
            details,
        })
    }

    /// Single-field validation failure
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::validation(message.clone(), json!({ field: [message] }))
    }

    pub fn payment_not_found(reference: impl Into<String>) -> Self {
        Self::new(AppErrorKind::NotFound {
            entity: "Payment".to_string(),
            reference: reference.into(),
        })
    }

    pub fn gateway(provider: &str, message: impl Into<String>, is_retryable: bool) -> Self {
        Self::new(AppErrorKind::External(ExternalError::PaymentProvider {
            provider: provider.to_string(),
            message: message.into(),
            is_retryable,
        }))
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: message.into(),
            },
        ))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.kind, AppErrorKind::Validation { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, AppErrorKind::NotFound { .. })
    }

    pub fn is_gateway(&self) -> bool {
        matches!(self.kind, AppErrorKind::External(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match &self.kind {
            AppErrorKind::Validation { .. } => StatusCode::BAD_REQUEST,
            AppErrorKind::Signature { .. } => StatusCode::FORBIDDEN,
            AppErrorKind::NotFound { .. } => StatusCode::NOT_FOUND,
            AppErrorKind::External(_)
            | AppErrorKind::Integrity { .. }
            | AppErrorKind::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn default_title(&self) -> &'static str {
        match &self.kind {
            AppErrorKind::Validation { .. } => "Invalid request data",
            AppErrorKind::Signature { .. } => "Invalid signature",
            AppErrorKind::NotFound { .. } => "Payment not found",
            AppErrorKind::External(_) => "Payment gateway error",
            AppErrorKind::Integrity { .. } | AppErrorKind::Infrastructure(_) => {
                "Internal server error"
            }
        }
    }

    fn details(&self) -> serde_json::Value {
        match &self.kind {
            AppErrorKind::Validation { details, .. } => details.clone(),
            AppErrorKind::NotFound { reference, .. } => json!({ "reference": reference }),
            AppErrorKind::External(e) => json!({ "message": e.to_string() }),
            AppErrorKind::Signature { message } => json!({ "message": message }),
            // Storage internals stay in the logs
            AppErrorKind::Integrity { .. } | AppErrorKind::Infrastructure(_) => {
                json!({ "message": "Request could not be completed" })
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{}: {}", context, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for AppError {}

impl From<DatabaseError> for AppError {
    fn from(error: DatabaseError) -> Self {
        match &error.kind {
            DatabaseErrorKind::UniqueConstraintViolation { column, value } => {
                Self::new(AppErrorKind::Integrity {
                    message: format!("duplicate {} '{}'", column, value),
                })
            }
            DatabaseErrorKind::NotFound { entity, id } => Self::new(AppErrorKind::NotFound {
                entity: entity.clone(),
                reference: id.clone(),
            }),
            _ => Self::new(AppErrorKind::Infrastructure(InfrastructureError::Database(
                error,
            ))),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let title = self
            .context
            .clone()
            .unwrap_or_else(|| self.default_title().to_string());
        let body = json!({
            "error": title,
            "details": self.details(),
            "timestamp": chrono::Utc::now(),
        });

        (status, Json(body)).into_response()
    }
}
