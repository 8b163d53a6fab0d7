//! HTTP surface

pub mod dto;
pub mod health;
pub mod payments;

use axum::{
    body::Body,
    routing::{get, post},
    Router,
};
use http::{HeaderName, Request};
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::payments::{PaymentService, WebhookVerifier};

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PaymentService>,
    pub verifier: Arc<WebhookVerifier>,
    pub environment: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/payments", get(payments::list_payments))
        .route("/payments/initiate", post(payments::initiate_payment))
        .route("/payments/webhook", post(payments::webhook))
        .route("/payments/verify/:reference", get(payments::verify_payment))
        .route("/payments/callback", get(payments::payment_callback))
        .route("/payments/:reference", get(payments::payment_detail))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(&REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id
                )
            }),
        )
        .layer(SetRequestIdLayer::new(REQUEST_ID, MakeRequestUuid))
        .with_state(state)
}
