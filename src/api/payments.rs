use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use tracing::{error, info, warn};
use validator::Validate;

use super::dto::{
    CallbackParams, CallbackResponse, InitiatePaymentRequest, InitiatePaymentResponse,
    ListParams, PaymentDetail, PaymentListResponse, PaymentSummary, VerifyPaymentResponse,
};
use super::AppState;
use crate::database::repository::PaymentFilter;
use crate::error::{AppError, AppResult};
use crate::payments::models::PaymentStatus;
use crate::payments::money;
use crate::payments::reconciliation;
use crate::payments::service::InitiatePayment;
use crate::payments::signature::SIGNATURE_HEADER;

/// Flatten validator output into `{field: [messages]}`
fn validation_details(errors: &validator::ValidationErrors) -> Map<String, Value> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errors)| {
            let messages = errors
                .iter()
                .map(|e| {
                    Value::String(
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string()),
                    )
                })
                .collect();
            (field.to_string(), Value::Array(messages))
        })
        .collect()
}

/// POST /payments/initiate
pub async fn initiate_payment(
    State(state): State<AppState>,
    body: Result<Json<InitiatePaymentRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<InitiatePaymentResponse>)> {
    let Json(mut body) = body.map_err(|rejection| {
        AppError::invalid_field("non_field_errors", rejection.body_text())
    })?;

    body.email = body.email.trim().to_string();
    body.callback_url = body.callback_url.filter(|url| !url.trim().is_empty());

    let mut details = match body.validate() {
        Ok(()) => Map::new(),
        Err(errors) => validation_details(&errors),
    };

    let amount = match money::parse_major(&body.amount) {
        Ok(amount) => Some(amount),
        Err(message) => {
            details.insert("amount".to_string(), Value::Array(vec![Value::String(message)]));
            None
        }
    };

    let amount = match amount {
        Some(amount) if details.is_empty() => amount,
        _ => {
            return Err(AppError::validation(
                "Invalid payment request",
                Value::Object(details),
            ))
        }
    };

    let payment = state
        .service
        .initialize(InitiatePayment {
            email: body.email,
            amount,
            callback_url: body.callback_url,
        })
        .await
        .map_err(|e| {
            if e.is_gateway() {
                e.with_context("Payment initialization failed")
            } else {
                e
            }
        })?;

    Ok((StatusCode::CREATED, Json(InitiatePaymentResponse::from(&payment))))
}

fn plain(status: StatusCode, message: &'static str) -> Response {
    (status, message).into_response()
}

/// POST /payments/webhook
///
/// The signature is checked against the body bytes exactly as received,
/// before any parsing.
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(signature) = headers.get(SIGNATURE_HEADER) else {
        warn!("Webhook rejected: missing signature header");
        return plain(StatusCode::FORBIDDEN, "Missing signature header");
    };

    if !state.verifier.verify(Some(body.as_ref()), signature.to_str().ok()) {
        warn!(body_len = body.len(), "Webhook rejected: invalid signature");
        return plain(StatusCode::FORBIDDEN, "Invalid signature");
    }

    let event: Value = match serde_json::from_slice(&body) {
        Ok(event @ Value::Object(_)) => event,
        _ => {
            warn!("Webhook rejected: body is not a JSON object");
            return plain(StatusCode::BAD_REQUEST, "Invalid JSON payload");
        }
    };

    let event_type = event.get("event").and_then(Value::as_str).unwrap_or_default();
    if !reconciliation::is_supported_event(event_type) {
        info!(event = event_type, "Ignoring unsupported webhook event");
        return plain(StatusCode::OK, "OK");
    }

    let reference = event
        .pointer("/data/reference")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|reference| !reference.is_empty())
        .map(str::to_string);
    let Some(reference) = reference else {
        warn!(event = event_type, "Webhook without a reference");
        return plain(StatusCode::BAD_REQUEST, "Missing reference in webhook data");
    };

    info!(event = event_type, reference = %reference, "Webhook received");
    match state.service.handle_webhook(&reference, event).await {
        Ok(_) => plain(StatusCode::OK, "OK"),
        Err(e) => {
            error!(reference = %reference, error = %e, "Webhook processing failed");
            plain(StatusCode::INTERNAL_SERVER_ERROR, "Processing failed")
        }
    }
}

/// GET /payments/verify/:reference
pub async fn verify_payment(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> AppResult<Json<VerifyPaymentResponse>> {
    let (payment, verified) = state.service.verify(&reference).await.map_err(|e| {
        if e.is_not_found() {
            e
        } else {
            e.with_context("Payment verification failed")
        }
    })?;

    Ok(Json(VerifyPaymentResponse {
        reference: payment.reference,
        status: payment.status,
        amount: payment.amount,
        currency: payment.currency,
        customer_email: payment.customer_email,
        paid_at: payment.paid_at,
        verification_data: verified.raw,
    }))
}

/// GET /payments/callback
///
/// Browser redirect target after checkout; reports state without reconciling.
pub async fn payment_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> AppResult<Json<CallbackResponse>> {
    let reference = params
        .reference
        .as_deref()
        .map(str::trim)
        .filter(|reference| !reference.is_empty())
        .ok_or_else(|| {
            AppError::invalid_field("reference", "This field is required.")
                .with_context("Invalid callback parameters")
        })?;

    let payment = state.service.find(reference).await?;
    info!(
        reference = %payment.reference,
        trxref = params.trxref.as_deref().unwrap_or_default(),
        "Payment callback received"
    );

    Ok(Json(CallbackResponse {
        reference: payment.reference,
        status: payment.status,
        amount: money::format_minor(payment.amount),
        customer_email: payment.customer_email,
        message: "Callback received successfully",
    }))
}

/// GET /payments
pub async fn list_payments(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<PaymentListResponse>> {
    let status = match params.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<PaymentStatus>().map_err(|_| {
            AppError::invalid_field(
                "status",
                format!("Select a valid choice. {} is not one of the available choices.", raw),
            )
        })?),
    };
    let email = params
        .email
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty());

    let payments = state.service.list(&PaymentFilter { status, email }).await?;
    let results: Vec<PaymentSummary> = payments.iter().map(PaymentSummary::from).collect();

    Ok(Json(PaymentListResponse {
        count: results.len(),
        results,
    }))
}

/// GET /payments/:reference
pub async fn payment_detail(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> AppResult<Json<PaymentDetail>> {
    let payment = state.service.find(&reference).await?;
    Ok(Json(PaymentDetail::from(&payment)))
}
