//! Stripe gateway client.
//!
//! Flow: create a hosted Checkout Session, redirect the customer to its
//! URL, then act on the `checkout.session.completed` / `expired` webhook.
//! Nothing else from the Stripe surface is used.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::Sha256;
use tracing::instrument;
use uuid::Uuid;

use marigold_core::{Money, PaymentGateway, PaymentStatus};

use super::{
    GatewayError, InitiatedPayment, WebhookEvent, WebhookRef, constant_time_compare,
    handle_response,
};
use crate::config::StripeConfig;

const API_BASE: &str = "https://api.stripe.com/v1";

/// Maximum age of a webhook's signed timestamp before it's treated as a
/// replay.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    config: StripeConfig,
}

#[derive(Deserialize)]
struct CheckoutSession {
    id: String,
    url: Option<String>,
}

#[derive(Deserialize)]
struct WebhookBody {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Deserialize)]
struct WebhookData {
    object: SessionObject,
}

#[derive(Deserialize)]
struct SessionObject {
    id: String,
    client_reference_id: Option<String>,
}

impl StripeClient {
    #[must_use]
    pub fn new(config: StripeConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                http: reqwest::Client::new(),
                config,
            }),
        }
    }

    /// Create a Checkout Session for the order total and return its hosted
    /// payment URL.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Amount` if the total can't be expressed in
    /// minor units, `GatewayError::Http`/`Rejected` on transport or API
    /// failure.
    #[instrument(skip(self, customer_email))]
    pub async fn create_checkout_session(
        &self,
        order_id: Uuid,
        order_number: &str,
        customer_email: Option<&str>,
        amount: Money,
        base_url: &str,
    ) -> Result<InitiatedPayment, GatewayError> {
        let amount_minor = amount.to_minor_units()?;

        let mut params = vec![
            ("mode", "payment".to_string()),
            ("client_reference_id", order_id.to_string()),
            (
                "success_url",
                format!("{base_url}/payment/success?order={order_id}"),
            ),
            (
                "cancel_url",
                format!("{base_url}/payment/cancelled?order={order_id}"),
            ),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "line_items[0][price_data][currency]",
                amount.currency.code().to_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                amount_minor.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                format!("Order {order_number}"),
            ),
        ];
        if let Some(email) = customer_email {
            params.push(("customer_email", email.to_string()));
        }

        let response = self
            .inner
            .http
            .post(format!("{API_BASE}/checkout/sessions"))
            .bearer_auth(self.inner.config.secret_key.expose_secret())
            .form(&params)
            .send()
            .await?;

        let session: CheckoutSession = handle_response(response).await?;

        Ok(InitiatedPayment {
            gateway: PaymentGateway::Stripe,
            payment_ref: session.id,
            redirect_url: session.url,
            client_key: None,
            amount_minor,
            currency: amount.currency.code(),
        })
    }

    /// Verify a `Stripe-Signature` header (`t=<ts>,v1=<hex hmac>` over
    /// `"{t}.{body}"`) and decode the event.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidSignature` for missing, stale, or wrong
    /// signatures, `GatewayError::MalformedPayload` for undecodable bodies.
    pub fn verify_webhook(
        &self,
        body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<Option<WebhookEvent>, GatewayError> {
        self.verify_webhook_at(body, signature_header, Utc::now())
    }

    fn verify_webhook_at(
        &self,
        body: &[u8],
        signature_header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<WebhookEvent>, GatewayError> {
        let header = signature_header.ok_or(GatewayError::InvalidSignature)?;

        let mut timestamp: Option<i64> = None;
        let mut candidates: Vec<&str> = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(GatewayError::InvalidSignature)?;
        if (now.timestamp() - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
            return Err(GatewayError::InvalidSignature);
        }
        if candidates.is_empty() {
            return Err(GatewayError::InvalidSignature);
        }

        let body_str = std::str::from_utf8(body)
            .map_err(|_| GatewayError::MalformedPayload("body is not UTF-8".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(
            self.inner.config.webhook_secret.expose_secret().as_bytes(),
        )
        .map_err(|_| GatewayError::InvalidSignature)?;
        mac.update(format!("{timestamp}.{body_str}").as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        if !candidates
            .iter()
            .any(|candidate| constant_time_compare(&expected, candidate))
        {
            return Err(GatewayError::InvalidSignature);
        }

        let parsed: WebhookBody = serde_json::from_slice(body)
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;

        let outcome = match parsed.event_type.as_str() {
            "checkout.session.completed" => PaymentStatus::Paid,
            "checkout.session.expired" => PaymentStatus::Failed,
            _ => return Ok(None),
        };

        let session = parsed.data.object;
        let reference = session
            .client_reference_id
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(WebhookRef::OrderId)
            .unwrap_or(WebhookRef::PaymentRef(session.id));

        Ok(Some(WebhookEvent {
            reference,
            outcome,
            event: parsed.event_type,
        }))
    }
}

impl fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeClient").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use secrecy::SecretString;

    use super::*;

    fn test_client() -> StripeClient {
        StripeClient::new(StripeConfig {
            secret_key: SecretString::from("sk_test_123"),
            webhook_secret: SecretString::from("whsec_test"),
        })
    }

    fn sign(body: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(b"whsec_test").unwrap();
        mac.update(format!("{timestamp}.{body}").as_bytes());
        format!(
            "t={timestamp},v1={}",
            hex::encode(mac.finalize().into_bytes())
        )
    }

    fn completed_body(reference: &str) -> String {
        format!(
            r#"{{
                "type": "checkout.session.completed",
                "data": {{
                    "object": {{
                        "id": "cs_test_a1b2",
                        "client_reference_id": "{reference}"
                    }}
                }}
            }}"#
        )
    }

    #[test]
    fn test_webhook_verifies_and_decodes_completion() {
        let order_id = Uuid::new_v4();
        let body = completed_body(&order_id.to_string());
        let now = Utc::now();
        let header = sign(&body, now.timestamp());

        let event = test_client()
            .verify_webhook_at(body.as_bytes(), Some(&header), now)
            .unwrap()
            .unwrap();

        assert_eq!(event.outcome, PaymentStatus::Paid);
        assert_eq!(event.reference, WebhookRef::OrderId(order_id));
    }

    #[test]
    fn test_webhook_rejects_stale_timestamp() {
        let body = completed_body(&Uuid::new_v4().to_string());
        let now = Utc::now();
        let stale = now - Duration::seconds(SIGNATURE_TOLERANCE_SECS + 60);
        let header = sign(&body, stale.timestamp());

        let result = test_client().verify_webhook_at(body.as_bytes(), Some(&header), now);
        assert!(matches!(result, Err(GatewayError::InvalidSignature)));
    }

    #[test]
    fn test_webhook_rejects_wrong_signature() {
        let body = completed_body(&Uuid::new_v4().to_string());
        let now = Utc::now();
        let header = format!("t={},v1={}", now.timestamp(), "0".repeat(64));

        let result = test_client().verify_webhook_at(body.as_bytes(), Some(&header), now);
        assert!(matches!(result, Err(GatewayError::InvalidSignature)));
    }

    #[test]
    fn test_expired_session_maps_to_failed() {
        let body = r#"{
            "type": "checkout.session.expired",
            "data": { "object": { "id": "cs_test_a1b2", "client_reference_id": null } }
        }"#;
        let now = Utc::now();
        let header = sign(body, now.timestamp());

        let event = test_client()
            .verify_webhook_at(body.as_bytes(), Some(&header), now)
            .unwrap()
            .unwrap();

        assert_eq!(event.outcome, PaymentStatus::Failed);
        assert_eq!(
            event.reference,
            WebhookRef::PaymentRef("cs_test_a1b2".to_string())
        );
    }

    #[test]
    fn test_irrelevant_event_is_ignored() {
        let body = r#"{
            "type": "invoice.paid",
            "data": { "object": { "id": "in_123", "client_reference_id": null } }
        }"#;
        let now = Utc::now();
        let header = sign(body, now.timestamp());

        let event = test_client()
            .verify_webhook_at(body.as_bytes(), Some(&header), now)
            .unwrap();
        assert!(event.is_none());
    }
}
