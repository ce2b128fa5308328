//! Payment routes: initiation, gateway callbacks, and status polling.
//!
//! Webhook and callback handlers take the raw body because every gateway
//! signs the exact bytes it sent; parsing before verification would break
//! the signature. Verified events funnel through
//! [`checkout::record_payment_event`] so replay handling lives in one place.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

use marigold_core::{Money, OrderStatus, PaymentGateway, PaymentStatus};

use crate::db::orders::{self, Order};
use crate::error::{ApiJson, ApiPath, ApiResponse, AppError, ok};
use crate::middleware::auth::CurrentUser;
use crate::services::checkout;
use crate::services::payments::{InitiatedPayment, WebhookEvent, WebhookRef};
use crate::state::AppState;

/// Body for `POST /api/payment/initiate`.
#[derive(Debug, Deserialize)]
pub struct InitiateRequest {
    #[serde(rename = "orderId")]
    pub order_id: Uuid,
}

/// Load an order the caller is allowed to act on. Foreign orders read as
/// missing so the id space stays unguessable.
async fn owned_order(pool: &PgPool, caller: &CurrentUser, id: Uuid) -> Result<Order, AppError> {
    let order = orders::find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("order"))?;
    if !caller.is_admin() && order.user_id != Some(caller.user_id) {
        return Err(AppError::not_found("order"));
    }
    Ok(order)
}

/// `POST /api/payment/initiate`
///
/// Creates the gateway-side order/session for an order placed with
/// `payment_gateway` set, and records the returned reference.
pub async fn initiate(
    State(state): State<AppState>,
    caller: CurrentUser,
    ApiJson(body): ApiJson<InitiateRequest>,
) -> Result<Json<ApiResponse<InitiatedPayment>>, AppError> {
    let order = owned_order(state.pool(), &caller, body.order_id).await?;

    if order.status == OrderStatus::Cancelled {
        return Err(AppError::validation("order is cancelled"));
    }
    if matches!(
        order.payment_status,
        PaymentStatus::Paid | PaymentStatus::Refunded
    ) {
        return Err(AppError::validation("order is already paid"));
    }
    let gateway = order
        .payment_gateway
        .ok_or_else(|| AppError::validation("order has no payment gateway"))?;

    let amount = Money::new(order.total, state.config().currency);
    let base_url = &state.config().base_url;

    let initiated = match gateway {
        PaymentGateway::Phonepe => {
            state
                .payments()
                .phonepe()?
                .create_payment(
                    order.id,
                    &format!("MUID{}", caller.user_id),
                    amount,
                    base_url,
                )
                .await?
        }
        PaymentGateway::Razorpay => {
            state
                .payments()
                .razorpay()?
                .create_order(order.id, &order.order_number, amount)
                .await?
        }
        PaymentGateway::Stripe => {
            state
                .payments()
                .stripe()?
                .create_checkout_session(
                    order.id,
                    &order.order_number,
                    order.customer_email.as_deref(),
                    amount,
                    base_url,
                )
                .await?
        }
    };

    orders::set_payment_initiated(state.pool(), order.id, gateway, &initiated.payment_ref).await?;

    tracing::info!(
        order = %order.order_number,
        gateway = %gateway,
        payment_ref = %initiated.payment_ref,
        "payment initiated"
    );

    Ok(ok(initiated))
}

/// Body for `POST /api/payment/verify/razorpay`.
///
/// The razorpay-prefixed fields arrive exactly as the Razorpay checkout
/// script hands them to the browser, so they stay snake_case.
#[derive(Debug, Deserialize)]
pub struct RazorpayVerifyRequest {
    #[serde(rename = "orderId")]
    pub order_id: Uuid,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// `POST /api/payment/verify/razorpay`
///
/// Client-side completion handshake: the browser reports the payment id
/// and signature it got from Razorpay checkout. Verification here marks
/// the order paid without waiting for the webhook; the webhook then
/// replays as a no-op.
pub async fn verify_razorpay(
    State(state): State<AppState>,
    caller: CurrentUser,
    ApiJson(body): ApiJson<RazorpayVerifyRequest>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let order = owned_order(state.pool(), &caller, body.order_id).await?;

    state.payments().razorpay()?.verify_payment_signature(
        &body.razorpay_order_id,
        &body.razorpay_payment_id,
        &body.razorpay_signature,
    )?;

    let event = WebhookEvent {
        reference: WebhookRef::OrderId(order.id),
        outcome: PaymentStatus::Paid,
        event: "payment.verified".to_string(),
    };
    let updated = checkout::record_payment_event(state.pool(), &event)
        .await?
        .ok_or_else(|| AppError::not_found("order"))?;

    Ok(ok(updated))
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Apply a verified event, always acknowledging so the gateway stops
/// retrying. Events for unknown orders are logged inside
/// [`checkout::record_payment_event`] and still acked.
async fn acknowledge(
    pool: &PgPool,
    event: Option<WebhookEvent>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    if let Some(event) = event {
        checkout::record_payment_event(pool, &event).await?;
    }
    Ok(ok(json!({ "received": true })))
}

/// `POST /api/payment/webhook/razorpay`
pub async fn razorpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let event = state
        .payments()
        .razorpay()?
        .verify_webhook(&body, header(&headers, "x-razorpay-signature"))?;
    acknowledge(state.pool(), event).await
}

/// `POST /api/payment/webhook/stripe`
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let event = state
        .payments()
        .stripe()?
        .verify_webhook(&body, header(&headers, "stripe-signature"))?;
    acknowledge(state.pool(), event).await
}

/// `POST /api/payment/callback/phonepe`
pub async fn phonepe_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let event = state
        .payments()
        .phonepe()?
        .verify_callback(&body, header(&headers, "x-verify"))?;
    acknowledge(state.pool(), event).await
}

/// Payment state of one order, for storefront polling after redirect.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusView {
    pub order_id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_gateway: Option<PaymentGateway>,
}

/// `GET /api/payment/{order_id}/status`
pub async fn status(
    State(state): State<AppState>,
    caller: CurrentUser,
    ApiPath(order_id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<PaymentStatusView>>, AppError> {
    let order = owned_order(state.pool(), &caller, order_id).await?;

    Ok(ok(PaymentStatusView {
        order_id: order.id,
        order_number: order.order_number,
        status: order.status,
        payment_status: order.payment_status,
        payment_gateway: order.payment_gateway,
    }))
}
