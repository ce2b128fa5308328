//! Order repository.
//!
//! Orders are keyed by UUID so references stay opaque, with a short
//! `MG-`-prefixed number from a sequence for humans. Each row carries both
//! the flat contact/address columns older rows were written with and the
//! nested `shipping_info`/`billing_info` JSONB blocks newer rows use; new
//! writes fill both so either read path works, and the CLI backfill
//! synthesizes the nested block for rows that predate it.
//!
//! `cart_items` is a price snapshot taken at checkout. Later catalog edits
//! never change what an order shows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use marigold_core::{OrderStatus, PaymentGateway, PaymentStatus, ProductId, UserId};

use super::{Page, RepositoryError};

/// A shipping or billing address block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
    pub name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default)]
    pub country: Option<String>,
}

/// One purchased line, snapshotted at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub title: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    pub quantity: i32,
    /// Unit price at the moment of purchase.
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// A placed order.
///
/// The `customer_*` and address fields are the legacy flat columns; rows
/// written before the nested blocks existed may have only these.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Option<UserId>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub address_line: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub shipping_info: Option<AddressInfo>,
    pub billing_info: Option<AddressInfo>,
    pub cart_items: Vec<OrderItem>,
    pub coupon_code: Option<String>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_gateway: Option<PaymentGateway>,
    /// Gateway-side order/session/transaction reference, once payment starts.
    pub payment_ref: Option<String>,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Option<UserId>,
    customer_name: Option<String>,
    customer_email: Option<String>,
    customer_phone: Option<String>,
    address_line: Option<String>,
    city: Option<String>,
    state: Option<String>,
    postal_code: Option<String>,
    shipping_info: Option<Json<AddressInfo>>,
    billing_info: Option<Json<AddressInfo>>,
    cart_items: Json<Vec<OrderItem>>,
    coupon_code: Option<String>,
    subtotal: Decimal,
    discount: Decimal,
    shipping_fee: Decimal,
    total: Decimal,
    status: String,
    payment_gateway: Option<String>,
    payment_ref: Option<String>,
    payment_status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(RepositoryError::DataCorruption)?;
        let payment_status = row
            .payment_status
            .parse()
            .map_err(RepositoryError::DataCorruption)?;
        let payment_gateway: Option<PaymentGateway> = row
            .payment_gateway
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            customer_phone: row.customer_phone,
            address_line: row.address_line,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            shipping_info: row.shipping_info.map(|json| json.0),
            billing_info: row.billing_info.map(|json| json.0),
            cart_items: row.cart_items.0,
            coupon_code: row.coupon_code,
            subtotal: row.subtotal,
            discount: row.discount,
            shipping_fee: row.shipping_fee,
            total: row.total,
            status,
            payment_gateway,
            payment_ref: row.payment_ref,
            payment_status,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Everything needed to insert an order row.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub customer_email: String,
    pub shipping_info: AddressInfo,
    pub billing_info: Option<AddressInfo>,
    pub cart_items: Vec<OrderItem>,
    pub coupon_code: Option<String>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
    pub payment_gateway: PaymentGateway,
    pub notes: Option<String>,
}

/// Admin listing filter.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// Matches the order number or customer email, case-insensitively.
    pub search: Option<String>,
}

const ORDER_COLUMNS: &str = "id, order_number, user_id, customer_name, customer_email, \
     customer_phone, address_line, city, state, postal_code, shipping_info, billing_info, \
     cart_items, coupon_code, subtotal, discount, shipping_fee, total, status, \
     payment_gateway, payment_ref, payment_status, notes, created_at, updated_at";

/// Insert an order inside the checkout transaction.
///
/// The flat contact columns are copied from `shipping_info` at insert time.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn create(
    tx: &mut Transaction<'_, Postgres>,
    order: &NewOrder,
) -> Result<Order, RepositoryError> {
    let ship = &order.shipping_info;

    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "
        INSERT INTO orders
            (order_number, user_id, customer_name, customer_email, customer_phone,
             address_line, city, state, postal_code, shipping_info, billing_info,
             cart_items, coupon_code, subtotal, discount, shipping_fee, total,
             status, payment_gateway, payment_status, notes)
        VALUES
            ('MG-' || lpad(nextval('order_number_seq')::text, 5, '0'), $1, $2, $3, $4,
             $5, $6, $7, $8, $9, $10,
             $11, $12, $13, $14, $15, $16,
             $17, $18, $19, $20)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(order.user_id)
    .bind(&ship.name)
    .bind(&order.customer_email)
    .bind(&ship.phone)
    .bind(&ship.address_line)
    .bind(&ship.city)
    .bind(&ship.state)
    .bind(&ship.postal_code)
    .bind(Json(ship))
    .bind(order.billing_info.as_ref().map(Json))
    .bind(Json(&order.cart_items))
    .bind(&order.coupon_code)
    .bind(order.subtotal)
    .bind(order.discount)
    .bind(order.shipping_fee)
    .bind(order.total)
    .bind(OrderStatus::Placed.as_str())
    .bind(order.payment_gateway.as_str())
    .bind(PaymentStatus::Created.as_str())
    .bind(&order.notes)
    .fetch_one(&mut **tx)
    .await?;

    row.try_into()
}

/// Look up an order by ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
/// Returns `RepositoryError::DataCorruption` if a stored enum is invalid.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Order>, RepositoryError> {
    let row =
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;

    row.map(Order::try_from).transpose()
}

/// Look up an order by ID with a row lock, for status changes.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
/// Returns `RepositoryError::DataCorruption` if a stored enum is invalid.
pub async fn find_by_id_for_update(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(Order::try_from).transpose()
}

/// Correlate a gateway callback to an order via the stored payment reference.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
/// Returns `RepositoryError::DataCorruption` if a stored enum is invalid.
pub async fn find_by_payment_ref(
    pool: &PgPool,
    payment_ref: &str,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_ref = $1"
    ))
    .bind(payment_ref)
    .fetch_optional(pool)
    .await?;

    row.map(Order::try_from).transpose()
}

/// List a customer's own orders, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
/// Returns `RepositoryError::DataCorruption` if a stored enum is invalid.
pub async fn list_for_user(
    pool: &PgPool,
    user_id: UserId,
    page: Page,
) -> Result<Vec<Order>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "
        SELECT {ORDER_COLUMNS}
        FROM orders
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "
    ))
    .bind(user_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Order::try_from).collect()
}

/// Count a customer's orders, for paging metadata.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn count_for_user(pool: &PgPool, user_id: UserId) -> Result<i64, RepositoryError> {
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(total)
}

/// List orders for the admin panel, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
/// Returns `RepositoryError::DataCorruption` if a stored enum is invalid.
pub async fn list_all(
    pool: &PgPool,
    filter: &OrderFilter,
    page: Page,
) -> Result<Vec<Order>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "
        SELECT {ORDER_COLUMNS}
        FROM orders
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2::text IS NULL OR payment_status = $2)
          AND ($3::text IS NULL
               OR order_number ILIKE '%' || $3 || '%'
               OR customer_email ILIKE '%' || $3 || '%')
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "
    ))
    .bind(filter.status.map(OrderStatus::as_str))
    .bind(filter.payment_status.map(PaymentStatus::as_str))
    .bind(filter.search.as_deref())
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Order::try_from).collect()
}

/// Count orders matching an admin filter.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn count_all(pool: &PgPool, filter: &OrderFilter) -> Result<i64, RepositoryError> {
    let (total,): (i64,) = sqlx::query_as(
        "
        SELECT COUNT(*)
        FROM orders
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2::text IS NULL OR payment_status = $2)
          AND ($3::text IS NULL
               OR order_number ILIKE '%' || $3 || '%'
               OR customer_email ILIKE '%' || $3 || '%')
        ",
    )
    .bind(filter.status.map(OrderStatus::as_str))
    .bind(filter.payment_status.map(PaymentStatus::as_str))
    .bind(filter.search.as_deref())
    .fetch_one(pool)
    .await?;

    Ok(total)
}

/// Set an order's fulfilment status inside a transaction.
///
/// Transition legality is the caller's job; this just writes.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order doesn't exist.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn update_status_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    status: OrderStatus,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "
        UPDATE orders
        SET status = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(status.as_str())
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    row.try_into()
}

/// Replace an order's staff notes.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order doesn't exist.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn update_notes(
    pool: &PgPool,
    id: Uuid,
    notes: Option<&str>,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "
        UPDATE orders
        SET notes = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(notes)
    .fetch_optional(pool)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    row.try_into()
}

/// Record the gateway-side reference handed back at payment initiation and
/// move the payment to `pending`.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order doesn't exist.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn set_payment_initiated(
    pool: &PgPool,
    id: Uuid,
    gateway: PaymentGateway,
    payment_ref: &str,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "
        UPDATE orders
        SET payment_gateway = $2, payment_ref = $3, payment_status = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(gateway.as_str())
    .bind(payment_ref)
    .bind(PaymentStatus::Pending.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    row.try_into()
}

/// Apply a verified gateway outcome: write the payment status, optionally
/// moving the order itself (a confirmed charge moves `placed` orders to
/// `confirmed`).
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order doesn't exist.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn set_payment_outcome(
    pool: &PgPool,
    id: Uuid,
    payment_status: PaymentStatus,
    order_status: Option<OrderStatus>,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "
        UPDATE orders
        SET payment_status = $2, status = COALESCE($3, status), updated_at = NOW()
        WHERE id = $1
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(payment_status.as_str())
    .bind(order_status.map(OrderStatus::as_str))
    .fetch_optional(pool)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    row.try_into()
}
