//! Coupon routes: the customer-facing apply check plus admin CRUD.

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};

use marigold_core::CouponId;

use crate::db::coupons::{self, Coupon, CouponInput, CouponKind};
use crate::error::{ApiJson, ApiPath, ApiResponse, AppError, ok};
use crate::middleware::auth::{CurrentUser, RequireAdmin};
use crate::services::checkout::{self, CouponPreview};
use crate::state::AppState;

/// Body for `POST /api/coupons/apply`.
#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub code: String,
}

/// `POST /api/coupons/apply`
///
/// Prices the caller's current cart against a coupon without placing an
/// order, so the storefront can show the discount before checkout.
pub async fn apply(
    State(state): State<AppState>,
    caller: CurrentUser,
    ApiJson(body): ApiJson<ApplyRequest>,
) -> Result<Json<ApiResponse<CouponPreview>>, AppError> {
    let preview = checkout::preview_coupon(state.pool(), caller.user_id, &body.code).await?;
    Ok(ok(preview))
}

/// `GET /api/coupons` (admin)
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<ApiResponse<Vec<Coupon>>>, AppError> {
    let coupons = coupons::list_all(state.pool()).await?;
    Ok(ok(coupons))
}

/// Body for coupon create and update.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponRequest {
    pub code: String,
    pub kind: CouponKind,
    pub value: Decimal,
    #[serde(default)]
    pub min_order_total: Decimal,
    #[serde(default)]
    pub max_discount: Option<Decimal>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub usage_limit: Option<i32>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl CouponRequest {
    fn into_input(self) -> Result<CouponInput, AppError> {
        let code = self.code.trim().to_string();
        if code.is_empty() {
            return Err(AppError::validation("code is required"));
        }
        if self.value <= Decimal::ZERO {
            return Err(AppError::validation("value must be positive"));
        }
        if self.kind == CouponKind::Percent && self.value > Decimal::ONE_HUNDRED {
            return Err(AppError::validation("a percent coupon cannot exceed 100"));
        }
        if self.min_order_total < Decimal::ZERO {
            return Err(AppError::validation("minimum order total cannot be negative"));
        }
        if let Some(max) = self.max_discount {
            if max <= Decimal::ZERO {
                return Err(AppError::validation("maximum discount must be positive"));
            }
        }
        if let Some(limit) = self.usage_limit {
            if limit < 1 {
                return Err(AppError::validation("usage limit must be at least 1"));
            }
        }

        Ok(CouponInput {
            code,
            kind: self.kind,
            value: self.value,
            min_order_total: self.min_order_total,
            max_discount: self.max_discount,
            expires_at: self.expires_at,
            usage_limit: self.usage_limit,
            active: self.active,
        })
    }
}

/// `POST /api/coupons` (admin)
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiJson(body): ApiJson<CouponRequest>,
) -> Result<Json<ApiResponse<Coupon>>, AppError> {
    let input = body.into_input()?;
    let coupon = coupons::create(state.pool(), &input).await?;

    tracing::info!(coupon = %coupon.code, "coupon created");

    Ok(ok(coupon))
}

/// `PUT /api/coupons/{id}` (admin)
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiPath(id): ApiPath<CouponId>,
    ApiJson(body): ApiJson<CouponRequest>,
) -> Result<Json<ApiResponse<Coupon>>, AppError> {
    let input = body.into_input()?;
    let coupon = coupons::update(state.pool(), id, &input).await?;
    Ok(ok(coupon))
}

/// `DELETE /api/coupons/{id}` (admin)
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiPath(id): ApiPath<CouponId>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    coupons::delete(state.pool(), id).await?;

    tracing::info!(coupon = id.as_i32(), "coupon deleted");

    Ok(ok(json!({ "deleted": true })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(kind: CouponKind, value: &str) -> CouponRequest {
        CouponRequest {
            code: "WELCOME10".to_string(),
            kind,
            value: value.parse().unwrap(),
            min_order_total: Decimal::ZERO,
            max_discount: None,
            expires_at: None,
            usage_limit: None,
            active: true,
        }
    }

    #[test]
    fn test_input_rejects_percent_over_hundred() {
        assert!(request(CouponKind::Percent, "101").into_input().is_err());
        assert!(request(CouponKind::Percent, "100").into_input().is_ok());
        assert!(request(CouponKind::Flat, "101").into_input().is_ok());
    }

    #[test]
    fn test_input_rejects_zero_value_and_bad_limits() {
        assert!(request(CouponKind::Flat, "0").into_input().is_err());

        let mut body = request(CouponKind::Flat, "50");
        body.usage_limit = Some(0);
        assert!(body.into_input().is_err());

        let mut body = request(CouponKind::Percent, "10");
        body.max_discount = Some(Decimal::ZERO);
        assert!(body.into_input().is_err());
    }
}
