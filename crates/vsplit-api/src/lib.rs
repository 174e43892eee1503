//! # vsplit-api
//!
//! HTTP API layer for the vsplit payment gateway.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - REST endpoints for single payments and split sessions
//! - Webhook handler for processor charge events
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/api/v1/payment/initialize` | Initialize single payment |
//! | POST | `/api/v1/payment/{id}/confirm` | Confirm payment |
//! | POST | `/api/v1/payment/{id}/cancel` | Cancel payment |
//! | GET | `/api/v1/payment/{id}/status` | Payment status |
//! | POST | `/api/v1/payment/verify` | Verify payment |
//! | POST | `/api/v1/payment/refund` | Refund payment |
//! | POST | `/api/v1/payment/split/initialize` | Create split session |
//! | GET | `/api/v1/payment/split/{session_id}` | Session snapshot |
//! | POST | `/api/v1/payment/split/{session_id}/attempt/{index}` | Drive attempt |
//! | POST | `/api/v1/payment/split/{session_id}/cancel` | Cancel session |
//! | POST | `/webhook/stripe` | Stripe webhook |

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
