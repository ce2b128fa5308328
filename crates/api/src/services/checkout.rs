//! Checkout: cart hydration, pricing, and order placement.
//!
//! Totals are always computed server-side from live catalog prices; amounts
//! sent by the client are ignored. Placement runs in one transaction so a
//! stock shortfall, a spent coupon, or any write failure rolls the whole
//! order back.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use marigold_core::{OrderStatus, PaymentGateway, PaymentStatus, ProductId, UserId};

use crate::config::ShippingConfig;
use crate::db::RepositoryError;
use crate::db::carts::{self, CartItem};
use crate::db::coupons::{self, Coupon, CouponKind};
use crate::db::orders::{self, AddressInfo, NewOrder, Order, OrderItem};
use crate::db::products::{self, Product};
use crate::db::users::User;
use crate::error::AppError;
use crate::services::payments::{WebhookEvent, WebhookRef, next_payment_state};

/// Checkout request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub shipping_info: AddressInfo,
    #[serde(default)]
    pub billing_info: Option<AddressInfo>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    pub gateway: PaymentGateway,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Snapshot cart lines against live products, pricing each line.
///
/// Fails naming the product when one has vanished, was hidden, or lacks
/// stock, so the customer knows which line to fix.
fn snapshot_items(
    items: &[CartItem],
    products: &HashMap<ProductId, Product>,
) -> Result<(Vec<OrderItem>, Decimal), AppError> {
    let mut snapshots = Vec::with_capacity(items.len());
    let mut subtotal = Decimal::ZERO;

    for item in items {
        let product = products.get(&item.product_id).ok_or_else(|| {
            AppError::validation("an item in your cart is no longer available")
        })?;
        if !product.active {
            return Err(AppError::validation(format!(
                "{} is no longer available",
                product.title
            )));
        }
        if product.stock < item.quantity {
            return Err(AppError::validation(format!(
                "not enough stock for {}",
                product.title
            )));
        }

        let line_total = product.price * Decimal::from(item.quantity);
        subtotal += line_total;
        snapshots.push(OrderItem {
            product_id: product.id,
            title: product.title.clone(),
            image: product.images.first().cloned(),
            size: item.size.clone(),
            quantity: item.quantity,
            unit_price: product.price,
            line_total,
        });
    }

    Ok((snapshots, subtotal))
}

/// Load and price the caller's cart against the live catalog.
async fn load_priced_cart(
    pool: &PgPool,
    user_id: UserId,
) -> Result<(Vec<OrderItem>, Decimal), AppError> {
    let items = carts::get(pool, user_id).await?;
    if items.is_empty() {
        return Err(AppError::validation("cart is empty"));
    }

    let ids: Vec<ProductId> = items.iter().map(|item| item.product_id).collect();
    let catalog: HashMap<ProductId, Product> = products::find_by_ids(pool, &ids)
        .await?
        .into_iter()
        .map(|product| (product.id, product))
        .collect();

    snapshot_items(&items, &catalog)
}

/// Check a coupon against the order subtotal.
///
/// # Errors
///
/// Returns `AppError::Validation` naming the first failed condition.
pub fn validate_coupon(
    coupon: &Coupon,
    subtotal: Decimal,
    now: chrono::DateTime<Utc>,
) -> Result<(), AppError> {
    if !coupon.active {
        return Err(AppError::validation("invalid coupon code"));
    }
    if coupon.is_expired(now) {
        return Err(AppError::validation("coupon has expired"));
    }
    if coupon.is_exhausted() {
        return Err(AppError::validation("coupon usage limit reached"));
    }
    if subtotal < coupon.min_order_total {
        return Err(AppError::validation(format!(
            "order must be at least {} to use this coupon",
            coupon.min_order_total
        )));
    }
    Ok(())
}

/// Discount for a validated coupon, rounded half-up to two decimal places.
/// Never exceeds the subtotal; percent coupons also honor `max_discount`.
#[must_use]
pub fn compute_discount(coupon: &Coupon, subtotal: Decimal) -> Decimal {
    let raw = match coupon.kind {
        CouponKind::Percent => subtotal * coupon.value / Decimal::ONE_HUNDRED,
        CouponKind::Flat => coupon.value,
    };

    let capped = match (coupon.kind, coupon.max_discount) {
        (CouponKind::Percent, Some(max)) => raw.min(max),
        _ => raw,
    };

    capped
        .min(subtotal)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Flat shipping fee, waived once the discounted subtotal reaches the
/// free-shipping threshold.
#[must_use]
pub fn shipping_fee(discounted_subtotal: Decimal, shipping: &ShippingConfig) -> Decimal {
    if discounted_subtotal >= shipping.free_threshold {
        Decimal::ZERO
    } else {
        shipping.fee
    }
}

/// Place an order from the user's cart.
///
/// # Errors
///
/// Returns `AppError::Validation` for an empty cart, unavailable items, or
/// a coupon that no longer applies; `AppError::Repository` on write failure.
pub async fn place_order(
    pool: &PgPool,
    shipping: &ShippingConfig,
    user: &User,
    request: PlaceOrderRequest,
) -> Result<Order, AppError> {
    let (cart_items, subtotal) = load_priced_cart(pool, user.id).await?;

    let coupon = match &request.coupon_code {
        Some(code) => {
            let coupon = coupons::find_by_code(pool, code)
                .await?
                .ok_or_else(|| AppError::validation("invalid coupon code"))?;
            validate_coupon(&coupon, subtotal, Utc::now())?;
            Some(coupon)
        }
        None => None,
    };

    let discount = coupon
        .as_ref()
        .map(|coupon| compute_discount(coupon, subtotal))
        .unwrap_or_default();
    let shipping_fee = shipping_fee(subtotal - discount, shipping);
    let total = subtotal - discount + shipping_fee;

    let new_order = NewOrder {
        user_id: user.id,
        customer_email: user.email.as_str().to_string(),
        shipping_info: request.shipping_info,
        billing_info: request.billing_info,
        cart_items,
        coupon_code: coupon.as_ref().map(|coupon| coupon.code.clone()),
        subtotal,
        discount,
        shipping_fee,
        total,
        payment_gateway: request.gateway,
        notes: request.notes,
    };

    let mut tx = pool.begin().await.map_err(RepositoryError::Database)?;

    for item in &new_order.cart_items {
        let reserved = products::reserve_stock(&mut tx, item.product_id, item.quantity).await?;
        if !reserved {
            return Err(AppError::validation(format!(
                "not enough stock for {}",
                item.title
            )));
        }
    }

    let order = orders::create(&mut tx, &new_order).await?;

    if let Some(coupon) = &coupon {
        let counted = coupons::increment_usage(&mut tx, coupon.id).await?;
        if !counted {
            return Err(AppError::validation("coupon usage limit reached"));
        }
    }

    carts::clear_in_tx(&mut tx, user.id).await?;
    tx.commit().await.map_err(RepositoryError::Database)?;

    tracing::info!(
        order = %order.order_number,
        total = %order.total,
        gateway = %request.gateway,
        "order placed"
    );

    Ok(order)
}

/// What a coupon would take off the caller's current cart.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponPreview {
    pub code: String,
    pub kind: CouponKind,
    pub subtotal: Decimal,
    pub discount: Decimal,
}

/// Price a coupon against the caller's cart without consuming any usage.
///
/// # Errors
///
/// Returns `AppError::Validation` for an empty cart, unavailable items, or
/// a coupon that does not apply.
pub async fn preview_coupon(
    pool: &PgPool,
    user_id: UserId,
    code: &str,
) -> Result<CouponPreview, AppError> {
    let (_, subtotal) = load_priced_cart(pool, user_id).await?;

    let coupon = coupons::find_by_code(pool, code)
        .await?
        .ok_or_else(|| AppError::validation("invalid coupon code"))?;
    validate_coupon(&coupon, subtotal, Utc::now())?;

    Ok(CouponPreview {
        code: coupon.code.clone(),
        kind: coupon.kind,
        subtotal,
        discount: compute_discount(&coupon, subtotal),
    })
}

/// Move an order to a new fulfilment status, validating the transition.
/// Cancellation restores the snapshot quantities to stock in the same
/// transaction; the transition table guarantees that happens at most once.
///
/// # Errors
///
/// Returns `AppError::NotFound` for unknown orders and
/// `AppError::Validation` for illegal transitions.
pub async fn update_order_status(
    pool: &PgPool,
    id: Uuid,
    next: OrderStatus,
) -> Result<Order, AppError> {
    let mut tx = pool.begin().await.map_err(RepositoryError::Database)?;

    let order = orders::find_by_id_for_update(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("order"))?;

    if !order.status.can_transition_to(next) {
        return Err(AppError::validation(format!(
            "cannot move order from {} to {}",
            order.status, next
        )));
    }

    if next == OrderStatus::Cancelled {
        for item in &order.cart_items {
            products::restore_stock(&mut tx, item.product_id, item.quantity).await?;
        }
    }

    let updated = orders::update_status_in_tx(&mut tx, id, next).await?;
    tx.commit().await.map_err(RepositoryError::Database)?;

    tracing::info!(order = %updated.order_number, status = %next, "order status updated");

    Ok(updated)
}

/// Fold a verified gateway event into the order it references.
///
/// Unknown references return `Ok(None)`: the callback is acknowledged so the
/// gateway stops retrying, and the mismatch is logged. Redundant verdicts
/// (see [`next_payment_state`]) leave the order untouched.
///
/// # Errors
///
/// Returns `AppError::Repository` on read/write failure.
pub async fn record_payment_event(
    pool: &PgPool,
    event: &WebhookEvent,
) -> Result<Option<Order>, AppError> {
    let order = match &event.reference {
        WebhookRef::OrderId(id) => orders::find_by_id(pool, *id).await?,
        WebhookRef::PaymentRef(payment_ref) => {
            orders::find_by_payment_ref(pool, payment_ref).await?
        }
    };

    let Some(order) = order else {
        tracing::warn!(event = %event.event, "gateway callback references an unknown order");
        return Ok(None);
    };

    let Some(next) = next_payment_state(order.payment_status, event.outcome) else {
        tracing::info!(
            order = %order.order_number,
            event = %event.event,
            current = %order.payment_status,
            "gateway callback changes nothing"
        );
        return Ok(Some(order));
    };

    let order_status = (next == PaymentStatus::Paid && order.status == OrderStatus::Placed)
        .then_some(OrderStatus::Confirmed);

    let updated = orders::set_payment_outcome(pool, order.id, next, order_status).await?;

    tracing::info!(
        order = %updated.order_number,
        payment_status = %next,
        event = %event.event,
        "payment status updated"
    );

    Ok(Some(updated))
}
