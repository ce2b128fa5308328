//! PhonePe gateway client.
//!
//! PhonePe's PG API signs with salted SHA-256 checksums rather than HMAC:
//! request and callback both carry an `X-VERIFY` header of the form
//! `sha256(<base64 payload> + <path?> + <salt_key>) + "###" + <salt_index>`.
//! The payment payload itself travels base64-encoded inside a JSON wrapper.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::instrument;
use uuid::Uuid;

use marigold_core::{Money, PaymentGateway, PaymentStatus};

use super::{
    GatewayError, InitiatedPayment, WebhookEvent, WebhookRef, constant_time_compare,
    handle_response,
};
use crate::config::PhonepeConfig;

const PAY_PATH: &str = "/pg/v1/pay";

#[derive(Clone)]
pub struct PhonepeClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    config: PhonepeConfig,
}

#[derive(Deserialize)]
struct PayResponse {
    success: bool,
    code: Option<String>,
    data: Option<PayData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayData {
    merchant_transaction_id: String,
    instrument_response: Option<InstrumentResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentResponse {
    redirect_info: Option<RedirectInfo>,
}

#[derive(Deserialize)]
struct RedirectInfo {
    url: String,
}

#[derive(Deserialize)]
struct CallbackBody {
    response: String,
}

#[derive(Deserialize)]
struct CallbackEnvelope {
    code: String,
    data: Option<CallbackData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallbackData {
    merchant_transaction_id: String,
}

impl PhonepeClient {
    #[must_use]
    pub fn new(config: PhonepeConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                http: reqwest::Client::new(),
                config,
            }),
        }
    }

    /// Start a PAY_PAGE payment and return the hosted redirect URL. The
    /// order UUID doubles as the merchant transaction id, which is what the
    /// server-to-server callback echoes back.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Amount` if the total can't be expressed in
    /// paise, `GatewayError::Http`/`Rejected` on transport or API failure.
    #[instrument(skip(self, user_ref))]
    pub async fn create_payment(
        &self,
        order_id: Uuid,
        user_ref: &str,
        amount: Money,
        base_url: &str,
    ) -> Result<InitiatedPayment, GatewayError> {
        let amount_minor = amount.to_minor_units()?;

        let payload = json!({
            "merchantId": self.inner.config.merchant_id,
            "merchantTransactionId": order_id.to_string(),
            "merchantUserId": user_ref,
            "amount": amount_minor,
            "redirectUrl": format!("{base_url}/payment/phonepe/return?order={order_id}"),
            "redirectMode": "REDIRECT",
            "callbackUrl": format!("{base_url}/api/payment/callback/phonepe"),
            "paymentInstrument": { "type": "PAY_PAGE" },
        });
        let encoded = BASE64.encode(payload.to_string());

        let response = self
            .inner
            .http
            .post(format!("{}{PAY_PATH}", self.inner.config.base_url))
            .header("X-VERIFY", self.pay_checksum(&encoded))
            .json(&json!({ "request": encoded }))
            .send()
            .await?;

        let pay: PayResponse = handle_response(response).await?;
        if !pay.success {
            return Err(GatewayError::Rejected {
                status: 200,
                body: pay.code.unwrap_or_default(),
            });
        }
        let data = pay.data.ok_or_else(|| {
            GatewayError::MalformedPayload("pay response carries no data".to_string())
        })?;

        let redirect_url = data
            .instrument_response
            .and_then(|instrument| instrument.redirect_info)
            .map(|redirect| redirect.url);

        Ok(InitiatedPayment {
            gateway: PaymentGateway::Phonepe,
            payment_ref: data.merchant_transaction_id,
            redirect_url,
            client_key: None,
            amount_minor,
            currency: amount.currency.code(),
        })
    }

    /// Verify and decode the server-to-server callback: `X-VERIFY` checked
    /// against the base64 response body, then the body decoded and its
    /// status code mapped.
    ///
    /// `PAYMENT_PENDING` verifies but decodes to `None`; the order stays
    /// pending until a terminal callback lands.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidSignature` for missing or wrong
    /// checksums, `GatewayError::MalformedPayload` for undecodable bodies.
    pub fn verify_callback(
        &self,
        body: &[u8],
        x_verify: Option<&str>,
    ) -> Result<Option<WebhookEvent>, GatewayError> {
        let x_verify = x_verify.ok_or(GatewayError::InvalidSignature)?;

        let wrapper: CallbackBody = serde_json::from_slice(body)
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;

        if !constant_time_compare(&self.callback_checksum(&wrapper.response), x_verify) {
            return Err(GatewayError::InvalidSignature);
        }

        let decoded = BASE64
            .decode(&wrapper.response)
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
        let envelope: CallbackEnvelope = serde_json::from_slice(&decoded)
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;

        let outcome = match envelope.code.as_str() {
            "PAYMENT_SUCCESS" => PaymentStatus::Paid,
            "PAYMENT_ERROR" | "PAYMENT_DECLINED" | "TIMED_OUT" => PaymentStatus::Failed,
            _ => return Ok(None),
        };

        let data = envelope.data.ok_or_else(|| {
            GatewayError::MalformedPayload("callback carries no data".to_string())
        })?;

        Ok(Some(WebhookEvent {
            reference: WebhookRef::PaymentRef(data.merchant_transaction_id),
            outcome,
            event: envelope.code,
        }))
    }

    fn pay_checksum(&self, base64_payload: &str) -> String {
        self.checksum(&format!("{base64_payload}{PAY_PATH}"))
    }

    fn callback_checksum(&self, base64_response: &str) -> String {
        self.checksum(base64_response)
    }

    fn checksum(&self, input: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        hasher.update(self.inner.config.salt_key.expose_secret().as_bytes());

        format!(
            "{}###{}",
            hex::encode(hasher.finalize()),
            self.inner.config.salt_index
        )
    }
}

impl fmt::Debug for PhonepeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhonepeClient")
            .field("merchant_id", &self.inner.config.merchant_id)
            .field("base_url", &self.inner.config.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn test_client() -> PhonepeClient {
        PhonepeClient::new(PhonepeConfig {
            merchant_id: "MERCHANTUAT".to_string(),
            salt_key: SecretString::from("test-salt-key"),
            salt_index: "1".to_string(),
            base_url: "https://api-preprod.phonepe.com/apis/pg-sandbox".to_string(),
        })
    }

    fn sha256_hex(input: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn callback_body(code: &str, txn_id: &str) -> (String, String) {
        let envelope =
            format!(r#"{{"code": "{code}", "data": {{"merchantTransactionId": "{txn_id}"}}}}"#);
        let encoded = BASE64.encode(envelope);
        let x_verify = format!("{}###1", sha256_hex(&format!("{encoded}test-salt-key")));
        let body = format!(r#"{{"response": "{encoded}"}}"#);
        (body, x_verify)
    }

    #[test]
    fn test_pay_checksum_shape() {
        let checksum = test_client().pay_checksum("cGF5bG9hZA");
        let expected = format!(
            "{}###1",
            sha256_hex(&format!("cGF5bG9hZA{PAY_PATH}test-salt-key"))
        );
        assert_eq!(checksum, expected);
    }

    #[test]
    fn test_callback_success_decodes_to_paid() {
        let txn = Uuid::new_v4().to_string();
        let (body, x_verify) = callback_body("PAYMENT_SUCCESS", &txn);

        let event = test_client()
            .verify_callback(body.as_bytes(), Some(&x_verify))
            .unwrap()
            .unwrap();

        assert_eq!(event.outcome, PaymentStatus::Paid);
        assert_eq!(event.reference, WebhookRef::PaymentRef(txn));
    }

    #[test]
    fn test_callback_error_decodes_to_failed() {
        let (body, x_verify) = callback_body("PAYMENT_ERROR", "txn-1");

        let event = test_client()
            .verify_callback(body.as_bytes(), Some(&x_verify))
            .unwrap()
            .unwrap();

        assert_eq!(event.outcome, PaymentStatus::Failed);
    }

    #[test]
    fn test_callback_pending_is_acknowledged_without_action() {
        let (body, x_verify) = callback_body("PAYMENT_PENDING", "txn-1");

        let event = test_client()
            .verify_callback(body.as_bytes(), Some(&x_verify))
            .unwrap();
        assert!(event.is_none());
    }

    #[test]
    fn test_callback_rejects_bad_checksum() {
        let (body, _) = callback_body("PAYMENT_SUCCESS", "txn-1");

        let result = test_client().verify_callback(body.as_bytes(), Some("bogus###1"));
        assert!(matches!(result, Err(GatewayError::InvalidSignature)));

        let result = test_client().verify_callback(body.as_bytes(), None);
        assert!(matches!(result, Err(GatewayError::InvalidSignature)));
    }
}
