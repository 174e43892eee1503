//! # Stripe Webhook Handling
//!
//! Signature verification and parsing for inbound Stripe events. Verified
//! events are normalized to [`RemoteChargeEvent`] so the gateway can settle
//! the referenced attempt without knowing Stripe's payload shape.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;
use vsplit_core::{PaymentError, PaymentResult, RemoteChargeEvent, RemoteEventKind};

/// Default tolerance for the signature timestamp (seconds)
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verifies webhook signatures and parses charge events
#[derive(Debug, Clone)]
pub struct StripeWebhookVerifier {
    webhook_secret: String,
    tolerance_secs: i64,
}

impl StripeWebhookVerifier {
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
            tolerance_secs: SIGNATURE_TOLERANCE_SECS,
        }
    }

    /// Builder: override the timestamp tolerance (for testing)
    pub fn with_tolerance_secs(mut self, secs: i64) -> Self {
        self.tolerance_secs = secs;
        self
    }

    /// Verify a webhook signature and parse the event.
    ///
    /// # Arguments
    /// * `payload` - Raw webhook body bytes
    /// * `signature` - `Stripe-Signature` header from the request
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> PaymentResult<RemoteChargeEvent> {
        let sig_parts = parse_signature_header(signature)?;

        // Verify timestamp is within tolerance
        let timestamp = sig_parts.timestamp;
        let now = Utc::now().timestamp();

        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(PaymentError::WebhookVerificationFailed(
                "Timestamp outside tolerance".to_string(),
            ));
        }

        // Compute expected signature
        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let expected_sig = compute_hmac_sha256(&self.webhook_secret, &signed_payload);

        // Compare signatures (constant-time)
        let valid = sig_parts
            .signatures
            .iter()
            .any(|sig| constant_time_compare(sig, &expected_sig));

        if !valid {
            return Err(PaymentError::WebhookVerificationFailed(
                "Signature mismatch".to_string(),
            ));
        }

        parse_charge_event(payload)
    }
}

/// Parse a (pre-verified) Stripe event payload into a charge event
pub fn parse_charge_event(payload: &[u8]) -> PaymentResult<RemoteChargeEvent> {
    let event: StripeWebhookEvent = serde_json::from_slice(payload)
        .map_err(|e| PaymentError::WebhookParseError(format!("Failed to parse webhook: {}", e)))?;

    debug!("Verified Stripe webhook: type={}", event.event_type);

    let kind = match event.event_type.as_str() {
        "payment_intent.succeeded" => RemoteEventKind::ChargeSucceeded,
        "payment_intent.payment_failed" => RemoteEventKind::ChargeFailed,
        "payment_intent.canceled" => RemoteEventKind::ChargeCanceled,
        other => RemoteEventKind::Unknown(other.to_string()),
    };

    let remote_id = event
        .data
        .object
        .get("id")
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| {
            PaymentError::WebhookParseError("Missing payment intent id".to_string())
        })?;

    let message = event
        .data
        .object
        .get("last_payment_error")
        .and_then(|e| e.get("message"))
        .and_then(|v| v.as_str())
        .map(String::from);

    Ok(RemoteChargeEvent {
        event_id: event.id,
        remote_id,
        kind,
        message,
        created_at: DateTime::from_timestamp(event.created, 0).unwrap_or_else(Utc::now),
    })
}

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Map<String, serde_json::Value>,
}

// =============================================================================
// Signature Verification
// =============================================================================

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_signature_header(header: &str) -> PaymentResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let kv: Vec<&str> = part.split('=').collect();
        if kv.len() != 2 {
            continue;
        }
        match kv[0] {
            "t" => {
                timestamp = kv[1].parse().ok();
            }
            "v1" => {
                signatures.push(kv[1].to_string());
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        PaymentError::WebhookVerificationFailed("Missing timestamp in signature".to_string())
    })?;

    if signatures.is_empty() {
        return Err(PaymentError::WebhookVerificationFailed(
            "No v1 signature found".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

pub(crate) fn compute_hmac_sha256(secret: &str, message: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    let result = mac.finalize();
    hex::encode(result.into_bytes())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}
