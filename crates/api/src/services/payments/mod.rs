//! Payment gateway clients.
//!
//! One client per gateway plus a dispatcher keyed on [`PaymentGateway`].
//! Initiation hands the customer to the gateway; the gateway reports back
//! through a signed webhook/callback which is verified and folded into the
//! order's payment status. There is deliberately no idempotency ledger or
//! retry machinery here: verification plus a single field write is the whole
//! contract, and replays fall out as no-ops in [`next_payment_state`].

pub mod phonepe;
pub mod razorpay;
pub mod stripe;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use marigold_core::{MoneyError, PaymentGateway, PaymentStatus};

use crate::config::GatewayConfig;

pub use phonepe::PhonepeClient;
pub use razorpay::RazorpayClient;
pub use stripe::StripeClient;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway {0} is not configured")]
    NotConfigured(PaymentGateway),
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("malformed gateway payload: {0}")]
    MalformedPayload(String),
    #[error("amount not representable in minor units: {0}")]
    Amount(#[from] MoneyError),
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway rejected the request: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// What payment initiation hands back to the storefront client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedPayment {
    pub gateway: PaymentGateway,
    /// Gateway-side order/session/transaction reference.
    pub payment_ref: String,
    /// Hosted payment page, when the gateway provides one.
    pub redirect_url: Option<String>,
    /// Public key the browser SDK needs (Razorpay checkout).
    pub client_key: Option<String>,
    /// Amount in minor units, exactly as the gateway will charge it.
    pub amount_minor: i64,
    pub currency: &'static str,
}

/// How a verified callback refers to the order it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookRef {
    /// Our own order UUID, carried through gateway metadata.
    OrderId(Uuid),
    /// The gateway-side reference we stored at initiation.
    PaymentRef(String),
}

/// A verified, decoded gateway callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub reference: WebhookRef,
    pub outcome: PaymentStatus,
    /// Gateway-native event name, for logging.
    pub event: String,
}

/// Decide whether an incoming gateway verdict should be applied.
///
/// Success may overwrite a failure (the customer retried and the retry
/// went through); nothing may overwrite `Paid` or `Refunded`, so replayed
/// success webhooks are no-ops.
#[must_use]
pub fn next_payment_state(
    current: PaymentStatus,
    incoming: PaymentStatus,
) -> Option<PaymentStatus> {
    match incoming {
        PaymentStatus::Paid => {
            (!matches!(current, PaymentStatus::Paid | PaymentStatus::Refunded))
                .then_some(PaymentStatus::Paid)
        }
        PaymentStatus::Failed => {
            matches!(current, PaymentStatus::Created | PaymentStatus::Pending)
                .then_some(PaymentStatus::Failed)
        }
        _ => None,
    }
}

/// Decode a gateway response body, turning non-2xx statuses into
/// [`GatewayError::Rejected`] with the body preserved for the log.
pub(crate) async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, GatewayError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    Ok(response.json().await?)
}

/// Compare two signature strings without leaking the mismatch position.
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// The configured gateway clients. Unconfigured gateways stay `None` and
/// surface as [`GatewayError::NotConfigured`] when addressed.
#[derive(Debug, Clone)]
pub struct PaymentGateways {
    phonepe: Option<PhonepeClient>,
    razorpay: Option<RazorpayClient>,
    stripe: Option<StripeClient>,
}

impl PaymentGateways {
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            phonepe: config.phonepe.clone().map(PhonepeClient::new),
            razorpay: config.razorpay.clone().map(RazorpayClient::new),
            stripe: config.stripe.clone().map(StripeClient::new),
        }
    }

    /// # Errors
    ///
    /// Returns `GatewayError::NotConfigured` if PhonePe credentials are absent.
    pub fn phonepe(&self) -> Result<&PhonepeClient, GatewayError> {
        self.phonepe
            .as_ref()
            .ok_or(GatewayError::NotConfigured(PaymentGateway::Phonepe))
    }

    /// # Errors
    ///
    /// Returns `GatewayError::NotConfigured` if Razorpay credentials are absent.
    pub fn razorpay(&self) -> Result<&RazorpayClient, GatewayError> {
        self.razorpay
            .as_ref()
            .ok_or(GatewayError::NotConfigured(PaymentGateway::Razorpay))
    }

    /// # Errors
    ///
    /// Returns `GatewayError::NotConfigured` if Stripe credentials are absent.
    pub fn stripe(&self) -> Result<&StripeClient, GatewayError> {
        self.stripe
            .as_ref()
            .ok_or(GatewayError::NotConfigured(PaymentGateway::Stripe))
    }
}
