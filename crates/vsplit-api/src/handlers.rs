//! # Request Handlers
//!
//! Axum request handlers for the payment API. Thin translations between
//! HTTP and the gateway; all payment semantics live in `vsplit-gateway`.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use vsplit_core::{
    Currency, InstrumentProof, PaymentError, RefundReason, RefundRequest, SplitSpec,
};
use vsplit_gateway::{PaymentConfig, SplitSessionConfig, VerificationRequest};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Initialize a single payment
#[derive(Debug, Deserialize)]
pub struct InitializePaymentRequest {
    /// Amount in smallest currency unit
    pub amount: i64,
    /// Currency code (ISO 4217), defaults to the gateway currency
    #[serde(default)]
    pub currency: Option<String>,
    /// Unique order/transaction id
    pub order_id: String,
    /// Metadata to attach to the charge intent
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Confirm a payment or a split attempt
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    /// Processor payment-method identifier
    pub payment_method: String,
    /// Return URL for redirect-based methods
    #[serde(default)]
    pub return_url: Option<String>,
}

impl ConfirmRequest {
    fn into_proof(self) -> InstrumentProof {
        let proof = InstrumentProof::new(self.payment_method);
        match self.return_url {
            Some(url) => proof.with_return_url(url),
            None => proof,
        }
    }
}

/// Initialize a split session
#[derive(Debug, Deserialize)]
pub struct InitializeSplitRequest {
    /// One entry per contributor, in order
    pub splits: Vec<SplitSpec>,
    /// Session timeout in seconds, defaults to the gateway default
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Logical order id; generated when absent
    #[serde(default)]
    pub order_id: Option<String>,
    /// Currency code (ISO 4217)
    #[serde(default)]
    pub currency: Option<String>,
    /// Expected total; must equal the sum of splits when provided
    #[serde(default)]
    pub total_amount: Option<i64>,
    /// Metadata propagated onto every charge intent
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Refund request body
#[derive(Debug, Deserialize)]
pub struct RefundPaymentRequest {
    /// Payment intent to refund
    pub payment_intent_id: String,
    /// Amount to refund; omitted means full refund
    #[serde(default)]
    pub amount: Option<i64>,
    /// Reason category
    #[serde(default)]
    pub reason: Option<RefundReason>,
    /// Metadata to attach to the refund
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Verification request body
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    /// Payment intent to verify
    pub payment_intent_id: String,
    /// Expected amount, if any
    #[serde(default)]
    pub expected_amount: Option<i64>,
    /// Expected currency code, if any
    #[serde(default)]
    pub expected_currency: Option<String>,
}

/// Verification response
#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub verified: bool,
    pub status: vsplit_core::IntentStatus,
    pub amount: i64,
    pub currency: Currency,
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: vsplit_core::IntentStatus,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
        }
    }
}

pub(crate) fn payment_error_to_response(err: PaymentError) -> (StatusCode, Json<ErrorResponse>) {
    let code = err.status_code();
    let response = ErrorResponse::new(err.to_string(), code);
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

fn parse_currency(code: Option<&str>) -> Result<Option<Currency>, (StatusCode, Json<ErrorResponse>)> {
    match code {
        None => Ok(None),
        Some(raw) => Currency::parse(raw).map(Some).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    format!("Unsupported currency: {}", raw),
                    400,
                )),
            )
        }),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "vsplit-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "active_sessions": state.gateway.active_sessions()
    }))
}

/// Initialize a single payment
#[instrument(skip(state, request), fields(order_id = %request.order_id))]
pub async fn initialize_payment(
    State(state): State<AppState>,
    Json(request): Json<InitializePaymentRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let currency = parse_currency(request.currency.as_deref())?;

    let mut config = PaymentConfig::new(request.amount, request.order_id);
    config.metadata = request.metadata;
    if let Some(currency) = currency {
        config = config.with_currency(currency);
    }

    let intent = state
        .gateway
        .initialize_payment(config)
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(intent))
}

/// Confirm a single payment
#[instrument(skip(state, request), fields(payment_id = %payment_id))]
pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    Json(request): Json<ConfirmRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let outcome = state
        .gateway
        .confirm_payment(&payment_id, &request.into_proof())
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(outcome))
}

/// Cancel a single payment
#[instrument(skip(state), fields(payment_id = %payment_id))]
pub async fn cancel_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let outcome = state
        .gateway
        .cancel_payment(&payment_id)
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(outcome))
}

/// Get payment status
pub async fn payment_status(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let status = state
        .gateway
        .payment_status(&payment_id)
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(StatusResponse { status }))
}

/// Verify a payment against expectations
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let expected_currency = parse_currency(request.expected_currency.as_deref())?;

    let outcome = state
        .gateway
        .verify_payment(VerificationRequest {
            remote_id: request.payment_intent_id,
            expected_amount: request.expected_amount,
            expected_currency,
        })
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(VerifyPaymentResponse {
        verified: outcome.verified,
        status: outcome.status,
        amount: outcome.amount,
        currency: outcome.currency,
    }))
}

/// Refund a payment
#[instrument(skip(state, request), fields(payment_intent_id = %request.payment_intent_id))]
pub async fn refund_payment(
    State(state): State<AppState>,
    Json(request): Json<RefundPaymentRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let refund = state
        .gateway
        .refund_payment(RefundRequest {
            remote_id: request.payment_intent_id,
            amount: request.amount,
            reason: request.reason.unwrap_or(RefundReason::RequestedByCustomer),
            metadata: request.metadata,
        })
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(refund))
}

/// Initialize a split session
#[instrument(skip(state, request), fields(splits = request.splits.len()))]
pub async fn initialize_split(
    State(state): State<AppState>,
    Json(request): Json<InitializeSplitRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let currency = parse_currency(request.currency.as_deref())?;

    let mut config = SplitSessionConfig::new(request.splits);
    config.order_id = request.order_id;
    config.currency = currency;
    config.total_amount = request.total_amount;
    config.timeout = request.timeout.map(Duration::from_secs);
    config.metadata = request.metadata;

    let session = state
        .gateway
        .create_split_session(config)
        .await
        .map_err(payment_error_to_response)?;

    info!("Created split session {}", session.session_id);
    Ok(Json(session))
}

/// Read a split session snapshot
pub async fn get_split_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let session = state
        .gateway
        .session_snapshot(&session_id)
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(session))
}

/// Drive one attempt of a split session
#[instrument(skip(state, request), fields(session_id = %session_id, index = index))]
pub async fn attempt_split(
    State(state): State<AppState>,
    Path((session_id, index)): Path<(String, usize)>,
    Json(request): Json<ConfirmRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let result = state
        .gateway
        .attempt(&session_id, index, &request.into_proof())
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(serde_json::json!({
        "outcome": result.outcome,
        "session": result.session,
    })))
}

/// Cancel a split session
#[instrument(skip(state), fields(session_id = %session_id))]
pub async fn cancel_split(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let session = state
        .gateway
        .cancel_session(&session_id)
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(session))
}

/// Handle Stripe webhook
#[instrument(skip(state, headers, body))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Missing Stripe-Signature header", 400)),
            )
        })?;

    let event = state
        .webhook_verifier
        .verify_and_parse(&body, signature)
        .map_err(|e| {
            error!("Webhook verification failed: {}", e);
            payment_error_to_response(e)
        })?;

    info!(
        "Received webhook: kind={:?}, remote_id={}",
        event.kind, event.remote_id
    );

    match state.gateway.apply_remote_event(&event).await {
        Ok(()) => Ok(StatusCode::OK),
        Err(PaymentError::IntentNotFound { remote_id }) => {
            // Not ours (or already discarded); acknowledge so the
            // processor does not retry.
            warn!("Webhook for unknown intent {}", remote_id);
            Ok(StatusCode::OK)
        }
        Err(e) => {
            error!("Webhook handling failed: {}", e);
            Err(payment_error_to_response(e))
        }
    }
}
