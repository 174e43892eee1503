//! # Payment Error Types
//!
//! Typed error handling for the vsplit payment gateway.
//! All payment operations return `Result<T, PaymentError>`.

use thiserror::Error;

/// Core error type for all payment operations
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Split configuration rejected before any remote call
    #[error("Invalid split configuration: {message}")]
    InvalidSplit { message: String },

    /// Charge-intent provisioning failed; no session was created
    #[error("Provisioning failed: {message}")]
    ProvisioningFailed { message: String },

    /// Payment was declined by the processor
    #[error("Payment declined: {reason}")]
    PaymentDeclined { reason: String },

    /// Payment processor API error
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Network/HTTP error communicating with the processor
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Split session not found or already discarded
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// Split session already reached a terminal state
    #[error("Session is closed: {session_id}")]
    SessionClosed { session_id: String },

    /// Attempt index out of range for the session
    #[error("Invalid attempt index {index} for session {session_id}")]
    InvalidAttempt { session_id: String, index: usize },

    /// Retry of an attempt that already succeeded
    #[error("Attempt {index} of session {session_id} already succeeded")]
    AttemptAlreadySucceeded { session_id: String, index: usize },

    /// Charge intent not known to the gateway
    #[error("Charge intent not found: {remote_id}")]
    IntentNotFound { remote_id: String },

    /// Webhook signature verification failed
    #[error("Webhook verification failed: {0}")]
    WebhookVerificationFailed(String),

    /// Webhook payload parsing error
    #[error("Webhook parse error: {0}")]
    WebhookParseError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::NetworkError(_)
                | PaymentError::ProviderError { .. }
                | PaymentError::PaymentDeclined { .. }
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::Configuration(_) => 500,
            PaymentError::InvalidRequest(_) => 400,
            PaymentError::InvalidSplit { .. } => 400,
            PaymentError::ProvisioningFailed { .. } => 502,
            PaymentError::PaymentDeclined { .. } => 402,
            PaymentError::ProviderError { .. } => 502,
            PaymentError::NetworkError(_) => 503,
            PaymentError::SessionNotFound { .. } => 404,
            PaymentError::SessionClosed { .. } => 409,
            PaymentError::InvalidAttempt { .. } => 400,
            PaymentError::AttemptAlreadySucceeded { .. } => 409,
            PaymentError::IntentNotFound { .. } => 404,
            PaymentError::WebhookVerificationFailed(_) => 401,
            PaymentError::WebhookParseError(_) => 400,
            PaymentError::Serialization(_) => 500,
            PaymentError::Internal(_) => 500,
        }
    }
}

/// Result type alias for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(PaymentError::NetworkError("timeout".into()).is_retryable());
        assert!(PaymentError::PaymentDeclined {
            reason: "insufficient funds".into()
        }
        .is_retryable());
        assert!(!PaymentError::InvalidSplit {
            message: "bad sum".into()
        }
        .is_retryable());
        assert!(!PaymentError::SessionClosed {
            session_id: "split_x".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            PaymentError::InvalidSplit {
                message: "test".into()
            }
            .status_code(),
            400
        );
        assert_eq!(
            PaymentError::SessionNotFound {
                session_id: "split_x".into()
            }
            .status_code(),
            404
        );
        assert_eq!(
            PaymentError::AttemptAlreadySucceeded {
                session_id: "split_x".into(),
                index: 1
            }
            .status_code(),
            409
        );
        assert_eq!(
            PaymentError::PaymentDeclined {
                reason: "card declined".into()
            }
            .status_code(),
            402
        );
    }
}
