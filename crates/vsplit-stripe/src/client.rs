//! # Stripe PaymentIntents Client
//!
//! Implementation of the `PaymentProvider` contract over Stripe's
//! PaymentIntents and Refunds APIs. One charge intent maps to one
//! PaymentIntent; refunds and cancels address it by its `pi_...` id.

use crate::config::StripeConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;
use vsplit_core::{
    ChargeIntent, ChargeOutcome, CreateIntentRequest, InstrumentProof, IntentStatus, PaymentError,
    PaymentProvider, PaymentResult, Refund, RefundRequest, RefundStatus,
};

/// Stripe PaymentIntents provider
///
/// Uses Stripe's server-side PaymentIntents API. Each call carries the
/// account's secret key; confirmation is driven by payment-method ids
/// supplied by the caller.
pub struct StripeIntentsClient {
    config: StripeConfig,
    client: Client,
}

impl StripeIntentsClient {
    /// Create a new Stripe provider
    pub fn new(config: StripeConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Create from environment variables
    pub fn from_env() -> PaymentResult<Self> {
        let config = StripeConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Access the loaded configuration
    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    async fn post_form(
        &self,
        path: &str,
        params: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> PaymentResult<String> {
        let url = format!("{}{}", self.config.api_base_url, path);

        let mut request = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version);

        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request
            .form(params)
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            return Err(stripe_error(status.as_u16(), &body));
        }
        Ok(body)
    }

    async fn get(&self, path: &str) -> PaymentResult<String> {
        let url = format!("{}{}", self.config.api_base_url, path);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            return Err(stripe_error(status.as_u16(), &body));
        }
        Ok(body)
    }
}

#[async_trait]
impl PaymentProvider for StripeIntentsClient {
    #[instrument(skip(self, req), fields(amount = req.amount, currency = %req.currency))]
    async fn create_charge_intent(&self, req: CreateIntentRequest) -> PaymentResult<ChargeIntent> {
        if req.amount <= 0 {
            return Err(PaymentError::InvalidRequest(
                "Amount must be positive".to_string(),
            ));
        }

        let mut form_params: Vec<(String, String)> = vec![
            ("amount".to_string(), req.amount.to_string()),
            ("currency".to_string(), req.currency.as_str().to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        for (key, value) in &req.metadata {
            form_params.push((format!("metadata[{}]", key), value.clone()));
        }

        let idempotency_key = Uuid::new_v4().to_string();
        let body = self
            .post_form("/v1/payment_intents", &form_params, Some(&idempotency_key))
            .await?;

        let intent: StripeIntentResponse = parse_response(&body)?;

        info!("Created payment intent: id={}", intent.id);

        Ok(ChargeIntent {
            remote_id: intent.id,
            client_auth_token: intent.client_secret.unwrap_or_default(),
            status: intent_status_from_stripe(&intent.status),
            amount: intent.amount,
            currency: req.currency,
            created_at: timestamp(intent.created),
            metadata: req.metadata,
        })
    }

    #[instrument(skip(self, proof), fields(remote_id = %remote_id))]
    async fn confirm_charge(
        &self,
        remote_id: &str,
        proof: &InstrumentProof,
    ) -> PaymentResult<ChargeOutcome> {
        let mut form_params: Vec<(String, String)> = vec![(
            "payment_method".to_string(),
            proof.payment_method.clone(),
        )];
        if let Some(ref url) = proof.return_url {
            form_params.push(("return_url".to_string(), url.clone()));
        }

        let path = format!("/v1/payment_intents/{}/confirm", remote_id);
        let result = self.post_form(&path, &form_params, None).await;

        // Card declines come back as HTTP errors; surface them as a
        // structured failed outcome rather than a transport error.
        let body = match result {
            Ok(body) => body,
            Err(PaymentError::PaymentDeclined { reason }) => {
                debug!("Charge declined: {}", reason);
                return Ok(ChargeOutcome::failed(reason));
            }
            Err(e) => return Err(e),
        };

        let intent: StripeIntentResponse = parse_response(&body)?;

        match intent.status.as_str() {
            "succeeded" => Ok(ChargeOutcome::succeeded()),
            "requires_action" => Ok(ChargeOutcome::requires_action(
                "Additional customer action required",
            )),
            other => {
                let message = intent
                    .last_payment_error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| format!("Payment not completed (status: {})", other));
                Ok(ChargeOutcome::failed(message))
            }
        }
    }

    #[instrument(skip(self, req), fields(remote_id = %req.remote_id))]
    async fn refund(&self, req: RefundRequest) -> PaymentResult<Refund> {
        let mut form_params: Vec<(String, String)> =
            vec![("payment_intent".to_string(), req.remote_id.clone())];
        if let Some(amount) = req.amount {
            form_params.push(("amount".to_string(), amount.to_string()));
        }
        if let Some(reason) = req.reason.as_str() {
            form_params.push(("reason".to_string(), reason.to_string()));
        }
        for (key, value) in &req.metadata {
            form_params.push((format!("metadata[{}]", key), value.clone()));
        }

        let idempotency_key = Uuid::new_v4().to_string();
        let body = self
            .post_form("/v1/refunds", &form_params, Some(&idempotency_key))
            .await?;

        let refund: StripeRefundResponse = parse_response(&body)?;

        info!("Created refund: id={}, status={}", refund.id, refund.status);

        let currency = vsplit_core::Currency::parse(&refund.currency)
            .unwrap_or_default();

        Ok(Refund {
            refund_id: refund.id,
            status: refund_status_from_stripe(&refund.status),
            amount: refund.amount,
            currency,
            created_at: timestamp(refund.created),
        })
    }

    #[instrument(skip(self), fields(remote_id = %remote_id))]
    async fn cancel_charge_intent(&self, remote_id: &str) -> PaymentResult<IntentStatus> {
        let path = format!("/v1/payment_intents/{}/cancel", remote_id);
        let body = self.post_form(&path, &[], None).await?;
        let intent: StripeIntentResponse = parse_response(&body)?;
        Ok(intent_status_from_stripe(&intent.status))
    }

    async fn get_status(&self, remote_id: &str) -> PaymentResult<IntentStatus> {
        let path = format!("/v1/payment_intents/{}", remote_id);
        let body = self.get(&path).await?;
        let intent: StripeIntentResponse = parse_response(&body)?;
        Ok(intent_status_from_stripe(&intent.status))
    }

    fn provider_name(&self) -> &'static str {
        "stripe"
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeIntentResponse {
    id: String,
    status: String,
    amount: i64,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    last_payment_error: Option<StripePaymentErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct StripePaymentErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeRefundResponse {
    id: String,
    status: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    created: i64,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

// =============================================================================
// Mapping helpers
// =============================================================================

fn parse_response<T: serde::de::DeserializeOwned>(body: &str) -> PaymentResult<T> {
    serde_json::from_str(body)
        .map_err(|e| PaymentError::Serialization(format!("Failed to parse Stripe response: {}", e)))
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}

fn stripe_error(http_status: u16, body: &str) -> PaymentError {
    error!("Stripe API error: status={}, body={}", http_status, body);

    if let Ok(parsed) = serde_json::from_str::<StripeErrorResponse>(body) {
        let message = parsed
            .error
            .message
            .unwrap_or_else(|| format!("HTTP {}", http_status));
        if parsed.error.error_type.as_deref() == Some("card_error") {
            let reason = parsed
                .error
                .code
                .map(|code| format!("{} ({})", message, code))
                .unwrap_or(message);
            return PaymentError::PaymentDeclined { reason };
        }
        return PaymentError::ProviderError {
            provider: "stripe".to_string(),
            message,
        };
    }

    PaymentError::ProviderError {
        provider: "stripe".to_string(),
        message: format!("HTTP {}: {}", http_status, body),
    }
}

fn intent_status_from_stripe(status: &str) -> IntentStatus {
    match status {
        "requires_payment_method" | "requires_confirmation" => IntentStatus::Pending,
        "processing" => IntentStatus::Processing,
        "requires_action" | "requires_capture" => IntentStatus::RequiresAction,
        "succeeded" => IntentStatus::Succeeded,
        "canceled" => IntentStatus::Canceled,
        _ => IntentStatus::Failed,
    }
}

fn refund_status_from_stripe(status: &str) -> RefundStatus {
    match status {
        "pending" | "requires_action" => RefundStatus::Pending,
        "succeeded" => RefundStatus::Succeeded,
        "canceled" => RefundStatus::Canceled,
        _ => RefundStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_status_mapping() {
        assert_eq!(
            intent_status_from_stripe("requires_payment_method"),
            IntentStatus::Pending
        );
        assert_eq!(intent_status_from_stripe("processing"), IntentStatus::Processing);
        assert_eq!(
            intent_status_from_stripe("requires_action"),
            IntentStatus::RequiresAction
        );
        assert_eq!(intent_status_from_stripe("succeeded"), IntentStatus::Succeeded);
        assert_eq!(intent_status_from_stripe("canceled"), IntentStatus::Canceled);
        assert_eq!(intent_status_from_stripe("mystery"), IntentStatus::Failed);
    }

    #[test]
    fn test_refund_status_mapping() {
        assert_eq!(refund_status_from_stripe("pending"), RefundStatus::Pending);
        assert_eq!(refund_status_from_stripe("succeeded"), RefundStatus::Succeeded);
        assert_eq!(refund_status_from_stripe("failed"), RefundStatus::Failed);
    }

    #[test]
    fn test_card_error_maps_to_decline() {
        let body = r#"{"error":{"type":"card_error","code":"card_declined","message":"Your card was declined."}}"#;
        let err = stripe_error(402, body);
        assert!(matches!(err, PaymentError::PaymentDeclined { .. }));
    }

    #[test]
    fn test_api_error_maps_to_provider_error() {
        let body = r#"{"error":{"type":"invalid_request_error","message":"No such payment_intent"}}"#;
        let err = stripe_error(404, body);
        assert!(matches!(err, PaymentError::ProviderError { .. }));
    }
}
