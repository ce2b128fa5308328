//! Razorpay gateway client.
//!
//! Flow: create a gateway order, hand its id plus our public key to the
//! browser checkout SDK, then accept the result twice: a signed handshake
//! the browser posts back and the `payment.captured`/`payment.failed`
//! webhook, whichever lands first.

use std::fmt;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::instrument;
use uuid::Uuid;

use marigold_core::{Money, PaymentGateway, PaymentStatus};

use super::{
    GatewayError, InitiatedPayment, WebhookEvent, WebhookRef, constant_time_compare,
    handle_response,
};
use crate::config::RazorpayConfig;

const API_BASE: &str = "https://api.razorpay.com/v1";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct RazorpayClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    config: RazorpayConfig,
}

#[derive(Deserialize)]
struct CreatedOrder {
    id: String,
}

#[derive(Deserialize)]
struct WebhookBody {
    event: String,
    payload: WebhookPayload,
}

#[derive(Deserialize)]
struct WebhookPayload {
    payment: Option<PaymentWrapper>,
}

#[derive(Deserialize)]
struct PaymentWrapper {
    entity: PaymentEntity,
}

/// Razorpay serializes empty notes as `[]` instead of `{}`, so `notes`
/// stays a raw value and is probed with `get`.
#[derive(Deserialize)]
struct PaymentEntity {
    order_id: Option<String>,
    #[serde(default)]
    notes: serde_json::Value,
}

impl RazorpayClient {
    #[must_use]
    pub fn new(config: RazorpayConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                http: reqwest::Client::new(),
                config,
            }),
        }
    }

    /// Create a gateway order carrying our order UUID in its notes.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Amount` if the total can't be expressed in
    /// paise, `GatewayError::Http`/`Rejected` on transport or API failure.
    #[instrument(skip(self))]
    pub async fn create_order(
        &self,
        order_id: Uuid,
        receipt: &str,
        amount: Money,
    ) -> Result<InitiatedPayment, GatewayError> {
        let amount_minor = amount.to_minor_units()?;
        let body = json!({
            "amount": amount_minor,
            "currency": amount.currency.code(),
            "receipt": receipt,
            "notes": { "order_id": order_id },
        });

        let response = self
            .inner
            .http
            .post(format!("{API_BASE}/orders"))
            .basic_auth(
                &self.inner.config.key_id,
                Some(self.inner.config.key_secret.expose_secret()),
            )
            .json(&body)
            .send()
            .await?;

        let created: CreatedOrder = handle_response(response).await?;

        Ok(InitiatedPayment {
            gateway: PaymentGateway::Razorpay,
            payment_ref: created.id,
            redirect_url: None,
            client_key: Some(self.inner.config.key_id.clone()),
            amount_minor,
            currency: amount.currency.code(),
        })
    }

    /// Verify `X-Razorpay-Signature` (hex HMAC-SHA256 over the raw body,
    /// keyed with the webhook secret) and decode the event.
    ///
    /// Events other than `payment.captured`/`payment.failed` verify but
    /// decode to `None` and are acknowledged without action.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidSignature` for missing or wrong
    /// signatures, `GatewayError::MalformedPayload` for undecodable bodies.
    pub fn verify_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<Option<WebhookEvent>, GatewayError> {
        let signature = signature.ok_or(GatewayError::InvalidSignature)?;

        let mut mac = HmacSha256::new_from_slice(
            self.inner.config.webhook_secret.expose_secret().as_bytes(),
        )
        .map_err(|_| GatewayError::InvalidSignature)?;
        mac.update(body);
        let expected = hex::encode(mac.finalize().into_bytes());

        if !constant_time_compare(&expected, signature) {
            return Err(GatewayError::InvalidSignature);
        }

        let parsed: WebhookBody = serde_json::from_slice(body)
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;

        let outcome = match parsed.event.as_str() {
            "payment.captured" => PaymentStatus::Paid,
            "payment.failed" => PaymentStatus::Failed,
            _ => return Ok(None),
        };

        let entity = parsed
            .payload
            .payment
            .map(|payment| payment.entity)
            .ok_or_else(|| GatewayError::MalformedPayload("missing payment entity".to_string()))?;

        let reference = entity
            .notes
            .get("order_id")
            .and_then(|value| value.as_str())
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(WebhookRef::OrderId)
            .or_else(|| entity.order_id.map(WebhookRef::PaymentRef))
            .ok_or_else(|| {
                GatewayError::MalformedPayload("no order reference on payment".to_string())
            })?;

        Ok(Some(WebhookEvent {
            reference,
            outcome,
            event: parsed.event,
        }))
    }

    /// Verify the handshake Razorpay Checkout posts after a successful
    /// payment: hex HMAC-SHA256 over `"{order_id}|{payment_id}"`, keyed
    /// with the API secret.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidSignature` if the signature is wrong.
    pub fn verify_payment_signature(
        &self,
        rzp_order_id: &str,
        rzp_payment_id: &str,
        signature: &str,
    ) -> Result<(), GatewayError> {
        let mut mac =
            HmacSha256::new_from_slice(self.inner.config.key_secret.expose_secret().as_bytes())
                .map_err(|_| GatewayError::InvalidSignature)?;
        mac.update(format!("{rzp_order_id}|{rzp_payment_id}").as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        if constant_time_compare(&expected, signature) {
            Ok(())
        } else {
            Err(GatewayError::InvalidSignature)
        }
    }
}

impl fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("key_id", &self.inner.config.key_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn test_client() -> RazorpayClient {
        RazorpayClient::new(RazorpayConfig {
            key_id: "rzp_test_abc".to_string(),
            key_secret: SecretString::from("rzp-secret"),
            webhook_secret: SecretString::from("webhook-secret"),
        })
    }

    fn sign_webhook(body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(b"webhook-secret").unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    fn captured_body(order_id: Uuid) -> String {
        format!(
            r#"{{
                "event": "payment.captured",
                "payload": {{
                    "payment": {{
                        "entity": {{
                            "id": "pay_29QQoUBi66xm2f",
                            "order_id": "order_9A33XWu170gUtm",
                            "notes": {{ "order_id": "{order_id}" }}
                        }}
                    }}
                }}
            }}"#
        )
    }

    #[test]
    fn test_webhook_verifies_and_decodes_capture() {
        let order_id = Uuid::new_v4();
        let body = captured_body(order_id);
        let signature = sign_webhook(body.as_bytes());

        let event = test_client()
            .verify_webhook(body.as_bytes(), Some(&signature))
            .unwrap()
            .unwrap();

        assert_eq!(event.outcome, PaymentStatus::Paid);
        assert_eq!(event.reference, WebhookRef::OrderId(order_id));
    }

    #[test]
    fn test_webhook_rejects_bad_signature() {
        let body = captured_body(Uuid::new_v4());

        let result = test_client().verify_webhook(body.as_bytes(), Some("deadbeef"));
        assert!(matches!(result, Err(GatewayError::InvalidSignature)));

        let result = test_client().verify_webhook(body.as_bytes(), None);
        assert!(matches!(result, Err(GatewayError::InvalidSignature)));
    }

    #[test]
    fn test_webhook_rejects_tampered_body() {
        let body = captured_body(Uuid::new_v4());
        let signature = sign_webhook(body.as_bytes());
        let tampered = body.replace("payment.captured", "payment.failed");

        let result = test_client().verify_webhook(tampered.as_bytes(), Some(&signature));
        assert!(matches!(result, Err(GatewayError::InvalidSignature)));
    }

    #[test]
    fn test_irrelevant_event_is_ignored() {
        let body = r#"{"event": "order.paid", "payload": {}}"#;
        let signature = sign_webhook(body.as_bytes());

        let event = test_client()
            .verify_webhook(body.as_bytes(), Some(&signature))
            .unwrap();
        assert!(event.is_none());
    }

    #[test]
    fn test_empty_notes_falls_back_to_gateway_order_id() {
        let body = r#"{
            "event": "payment.failed",
            "payload": {
                "payment": {
                    "entity": { "order_id": "order_9A33XWu170gUtm", "notes": [] }
                }
            }
        }"#;
        let signature = sign_webhook(body.as_bytes());

        let event = test_client()
            .verify_webhook(body.as_bytes(), Some(&signature))
            .unwrap()
            .unwrap();

        assert_eq!(event.outcome, PaymentStatus::Failed);
        assert_eq!(
            event.reference,
            WebhookRef::PaymentRef("order_9A33XWu170gUtm".to_string())
        );
    }

    #[test]
    fn test_checkout_handshake_signature() {
        let client = test_client();

        let mut mac = HmacSha256::new_from_slice(b"rzp-secret").unwrap();
        mac.update(b"order_abc|pay_def");
        let good = hex::encode(mac.finalize().into_bytes());

        assert!(
            client
                .verify_payment_signature("order_abc", "pay_def", &good)
                .is_ok()
        );
        assert!(
            client
                .verify_payment_signature("order_abc", "pay_xyz", &good)
                .is_err()
        );
    }
}
