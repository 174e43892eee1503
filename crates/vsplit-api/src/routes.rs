//! # Routes
//!
//! Axum router configuration for the payment API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Single payments:
///   - POST /api/v1/payment/initialize - Provision a charge intent
///   - POST /api/v1/payment/{id}/confirm - Confirm with an instrument proof
///   - POST /api/v1/payment/{id}/cancel - Cancel the intent
///   - GET  /api/v1/payment/{id}/status - Processor-side status
///   - POST /api/v1/payment/verify - Verify status and expectations
///   - POST /api/v1/payment/refund - Refund a captured charge
///
/// - Split sessions:
///   - POST /api/v1/payment/split/initialize - Create a split session
///   - GET  /api/v1/payment/split/{session_id} - Session snapshot
///   - POST /api/v1/payment/split/{session_id}/attempt/{index} - Drive one attempt
///   - POST /api/v1/payment/split/{session_id}/cancel - Cancel and sweep
///
/// - Webhooks:
///   - POST /webhook/stripe - Stripe webhook handler
pub fn create_router(state: AppState) -> Router {
    // CORS configuration - allow all origins for now
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let split_routes = Router::new()
        .route("/initialize", post(handlers::initialize_split))
        .route("/{session_id}", get(handlers::get_split_session))
        .route(
            "/{session_id}/attempt/{index}",
            post(handlers::attempt_split),
        )
        .route("/{session_id}/cancel", post(handlers::cancel_split));

    let payment_routes = Router::new()
        .route("/initialize", post(handlers::initialize_payment))
        .route("/verify", post(handlers::verify_payment))
        .route("/refund", post(handlers::refund_payment))
        .route("/{payment_id}/confirm", post(handlers::confirm_payment))
        .route("/{payment_id}/cancel", post(handlers::cancel_payment))
        .route("/{payment_id}/status", get(handlers::payment_status))
        .nest("/split", split_routes);

    // Webhook routes (no CORS, must accept raw body)
    let webhook_routes = Router::new().route("/stripe", post(handlers::stripe_webhook));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api/v1/payment", payment_routes)
        .nest("/webhook", webhook_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
