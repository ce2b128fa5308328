//! Cart routes.
//!
//! Carts store only product references; every read hydrates them against
//! the live catalog so prices and availability are never stale. Lines whose
//! product has been deleted or hidden since they were added are silently
//! dropped from the view rather than failing the whole cart.

use std::collections::HashMap;

use axum::Json;
use axum::extract::State;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use marigold_core::ProductId;

use crate::db::carts::{self, CartItem};
use crate::db::products;
use crate::error::{ApiJson, ApiResponse, AppError, ok};
use crate::middleware::auth::CurrentUser;
use crate::state::AppState;

/// A cart line joined with its live catalog data.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub title: String,
    pub slug: String,
    pub image: Option<String>,
    pub price: Decimal,
    pub mrp: Option<Decimal>,
    pub size: Option<String>,
    pub quantity: i32,
    pub stock: i32,
    pub line_total: Decimal,
}

/// The hydrated cart returned by every cart endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub subtotal: Decimal,
}

async fn hydrated_view(pool: &PgPool, items: &[CartItem]) -> Result<CartView, AppError> {
    if items.is_empty() {
        return Ok(CartView {
            items: Vec::new(),
            subtotal: Decimal::ZERO,
        });
    }

    let ids: Vec<ProductId> = items.iter().map(|item| item.product_id).collect();
    let catalog: HashMap<ProductId, _> = products::find_by_ids(pool, &ids)
        .await?
        .into_iter()
        .map(|product| (product.id, product))
        .collect();

    let mut lines = Vec::with_capacity(items.len());
    let mut subtotal = Decimal::ZERO;
    for item in items {
        let Some(product) = catalog.get(&item.product_id).filter(|p| p.active) else {
            continue;
        };

        let line_total = product.price * Decimal::from(item.quantity);
        subtotal += line_total;
        lines.push(CartLine {
            product_id: product.id,
            title: product.title.clone(),
            slug: product.slug.clone(),
            image: product.images.first().cloned(),
            price: product.price,
            mrp: product.mrp,
            size: item.size.clone(),
            quantity: item.quantity,
            stock: product.stock,
            line_total,
        });
    }

    Ok(CartView {
        items: lines,
        subtotal,
    })
}

/// `GET /api/cart`
pub async fn show(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<Json<ApiResponse<CartView>>, AppError> {
    let items = carts::get(state.pool(), caller.user_id).await?;
    let view = hydrated_view(state.pool(), &items).await?;
    Ok(ok(view))
}

/// Body for `POST /api/cart/items`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// `POST /api/cart/items`
pub async fn add_item(
    State(state): State<AppState>,
    caller: CurrentUser,
    ApiJson(body): ApiJson<AddItemRequest>,
) -> Result<Json<ApiResponse<CartView>>, AppError> {
    if body.quantity < 1 {
        return Err(AppError::validation("quantity must be at least 1"));
    }

    let product = products::find_active_by_id(state.pool(), body.product_id)
        .await?
        .ok_or_else(|| AppError::not_found("product"))?;
    if product.stock < 1 {
        return Err(AppError::validation(format!(
            "{} is out of stock",
            product.title
        )));
    }

    let size = body
        .size
        .as_deref()
        .map(str::trim)
        .filter(|size| !size.is_empty())
        .map(String::from);
    if !product.sizes.is_empty() {
        match &size {
            Some(size) if product.sizes.iter().any(|s| s == size) => {}
            Some(size) => {
                return Err(AppError::validation(format!(
                    "size {size} is not available for {}",
                    product.title
                )));
            }
            None => {
                return Err(AppError::validation(format!(
                    "a size must be chosen for {}",
                    product.title
                )));
            }
        }
    }

    let mut items = carts::get(state.pool(), caller.user_id).await?;
    carts::merge_line(
        &mut items,
        CartItem {
            product_id: product.id,
            size: size.clone(),
            quantity: body.quantity,
        },
    );
    // The merged quantity also cannot exceed what is on the shelf.
    if let Some(line) = items
        .iter_mut()
        .find(|line| line.product_id == product.id && line.size == size)
    {
        line.quantity = line.quantity.min(product.stock);
    }
    carts::save(state.pool(), caller.user_id, &items).await?;

    let view = hydrated_view(state.pool(), &items).await?;
    Ok(ok(view))
}

/// Body for `PUT /api/cart/items`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetItemRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub size: Option<String>,
    pub quantity: i32,
}

/// `PUT /api/cart/items`
///
/// Sets a line to an exact quantity; zero removes the line.
pub async fn set_item(
    State(state): State<AppState>,
    caller: CurrentUser,
    ApiJson(body): ApiJson<SetItemRequest>,
) -> Result<Json<ApiResponse<CartView>>, AppError> {
    if body.quantity < 0 {
        return Err(AppError::validation("quantity cannot be negative"));
    }

    let size = body
        .size
        .as_deref()
        .map(str::trim)
        .filter(|size| !size.is_empty());

    let mut items = carts::get(state.pool(), caller.user_id).await?;
    let quantity = if body.quantity > 0 {
        let product = products::find_active_by_id(state.pool(), body.product_id)
            .await?
            .ok_or_else(|| AppError::not_found("product"))?;
        body.quantity.min(product.stock)
    } else {
        0
    };

    if !carts::set_line_quantity(&mut items, body.product_id, size, quantity) {
        return Err(AppError::not_found("cart item"));
    }
    carts::save(state.pool(), caller.user_id, &items).await?;

    let view = hydrated_view(state.pool(), &items).await?;
    Ok(ok(view))
}

/// Body for `DELETE /api/cart/items`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveItemRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub size: Option<String>,
}

/// `DELETE /api/cart/items`
pub async fn remove_item(
    State(state): State<AppState>,
    caller: CurrentUser,
    ApiJson(body): ApiJson<RemoveItemRequest>,
) -> Result<Json<ApiResponse<CartView>>, AppError> {
    let size = body
        .size
        .as_deref()
        .map(str::trim)
        .filter(|size| !size.is_empty());

    let mut items = carts::get(state.pool(), caller.user_id).await?;
    if !carts::remove_line(&mut items, body.product_id, size) {
        return Err(AppError::not_found("cart item"));
    }
    carts::save(state.pool(), caller.user_id, &items).await?;

    let view = hydrated_view(state.pool(), &items).await?;
    Ok(ok(view))
}

/// `DELETE /api/cart`
pub async fn clear(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<Json<ApiResponse<CartView>>, AppError> {
    carts::clear(state.pool(), caller.user_id).await?;
    Ok(ok(CartView {
        items: Vec::new(),
        subtotal: Decimal::ZERO,
    }))
}
