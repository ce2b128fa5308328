//! Discount coupon repository.
//!
//! Coupon codes are stored uppercase and matched case-insensitively, so
//! `diwali10` and `DIWALI10` are the same coupon.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};

use marigold_core::CouponId;

use super::RepositoryError;

/// How a coupon's `value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponKind {
    /// `value` is a percentage of the order subtotal.
    Percent,
    /// `value` is a fixed amount off.
    Flat,
}

impl CouponKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Percent => "percent",
            Self::Flat => "flat",
        }
    }
}

impl fmt::Display for CouponKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CouponKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percent" => Ok(Self::Percent),
            "flat" => Ok(Self::Flat),
            other => Err(format!("unknown coupon kind: {other}")),
        }
    }
}

/// A discount coupon.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub kind: CouponKind,
    pub value: Decimal,
    /// Subtotal the cart must reach before the coupon applies.
    pub min_order_total: Decimal,
    /// Ceiling on the computed discount, mainly for percent coupons.
    pub max_discount: Option<Decimal>,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_limit: Option<i32>,
    pub times_used: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// Whether the coupon has passed its expiry timestamp.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Whether the usage limit has been reached.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.usage_limit
            .is_some_and(|limit| self.times_used >= limit)
    }
}

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: CouponId,
    code: String,
    kind: String,
    value: Decimal,
    min_order_total: Decimal,
    max_discount: Option<Decimal>,
    expires_at: Option<DateTime<Utc>>,
    usage_limit: Option<i32>,
    times_used: i32,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = RepositoryError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        let kind = row
            .kind
            .parse()
            .map_err(|e: String| RepositoryError::DataCorruption(e))?;

        Ok(Self {
            id: row.id,
            code: row.code,
            kind,
            value: row.value,
            min_order_total: row.min_order_total,
            max_discount: row.max_discount,
            expires_at: row.expires_at,
            usage_limit: row.usage_limit,
            times_used: row.times_used,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Fields accepted when creating or updating a coupon.
#[derive(Debug, Clone)]
pub struct CouponInput {
    pub code: String,
    pub kind: CouponKind,
    pub value: Decimal,
    pub min_order_total: Decimal,
    pub max_discount: Option<Decimal>,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_limit: Option<i32>,
    pub active: bool,
}

const COUPON_COLUMNS: &str = "id, code, kind, value, min_order_total, max_discount, \
     expires_at, usage_limit, times_used, active, created_at, updated_at";

/// Look up a coupon by code, ignoring case and surrounding whitespace.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
/// Returns `RepositoryError::DataCorruption` if the stored kind is invalid.
pub async fn find_by_code(pool: &PgPool, code: &str) -> Result<Option<Coupon>, RepositoryError> {
    let row = sqlx::query_as::<_, CouponRow>(&format!(
        "SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1"
    ))
    .bind(code.trim().to_uppercase())
    .fetch_optional(pool)
    .await?;

    row.map(Coupon::try_from).transpose()
}

/// List every coupon for the admin panel, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
/// Returns `RepositoryError::DataCorruption` if a stored kind is invalid.
pub async fn list_all(pool: &PgPool) -> Result<Vec<Coupon>, RepositoryError> {
    let rows = sqlx::query_as::<_, CouponRow>(&format!(
        "SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Coupon::try_from).collect()
}

/// Create a coupon. The code is stored uppercase.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the code is already taken.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn create(pool: &PgPool, input: &CouponInput) -> Result<Coupon, RepositoryError> {
    let row = sqlx::query_as::<_, CouponRow>(&format!(
        "
        INSERT INTO coupons
            (code, kind, value, min_order_total, max_discount, expires_at, usage_limit, active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {COUPON_COLUMNS}
        "
    ))
    .bind(input.code.trim().to_uppercase())
    .bind(input.kind.as_str())
    .bind(input.value)
    .bind(input.min_order_total)
    .bind(input.max_discount)
    .bind(input.expires_at)
    .bind(input.usage_limit)
    .bind(input.active)
    .fetch_one(pool)
    .await
    .map_err(|e| RepositoryError::from_unique_violation(e, "coupon code already exists"))?;

    row.try_into()
}

/// Replace a coupon's fields. `times_used` is never overwritten.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the coupon doesn't exist.
/// Returns `RepositoryError::Conflict` if the new code is already taken.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn update(
    pool: &PgPool,
    id: CouponId,
    input: &CouponInput,
) -> Result<Coupon, RepositoryError> {
    let row = sqlx::query_as::<_, CouponRow>(&format!(
        "
        UPDATE coupons
        SET code = $2, kind = $3, value = $4, min_order_total = $5, max_discount = $6,
            expires_at = $7, usage_limit = $8, active = $9, updated_at = NOW()
        WHERE id = $1
        RETURNING {COUPON_COLUMNS}
        "
    ))
    .bind(id)
    .bind(input.code.trim().to_uppercase())
    .bind(input.kind.as_str())
    .bind(input.value)
    .bind(input.min_order_total)
    .bind(input.max_discount)
    .bind(input.expires_at)
    .bind(input.usage_limit)
    .bind(input.active)
    .fetch_optional(pool)
    .await
    .map_err(|e| RepositoryError::from_unique_violation(e, "coupon code already exists"))?
    .ok_or(RepositoryError::NotFound)?;

    row.try_into()
}

/// Delete a coupon.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the coupon doesn't exist.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn delete(pool: &PgPool, id: CouponId) -> Result<(), RepositoryError> {
    let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }

    Ok(())
}

/// Count one redemption inside a checkout transaction.
///
/// Returns `false` when the usage limit was hit between validation and
/// commit, which aborts the checkout.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn increment_usage(
    tx: &mut Transaction<'_, Postgres>,
    id: CouponId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "
        UPDATE coupons
        SET times_used = times_used + 1, updated_at = NOW()
        WHERE id = $1 AND (usage_limit IS NULL OR times_used < usage_limit)
        ",
    )
    .bind(id)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}
