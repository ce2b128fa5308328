//! Product catalog routes: public browsing plus admin CRUD.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};

use marigold_core::ProductId;

use crate::db::Page;
use crate::db::categories;
use crate::db::products::{self, Product, ProductFilter, ProductInput, ProductSort};
use crate::error::{ApiJson, ApiPath, ApiQuery, ApiResponse, AppError, Paged, ok};
use crate::middleware::auth::RequireAdmin;
use crate::routes::slugify;
use crate::state::AppState;

/// Query string for `GET /api/products`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// Category slug, not numeric id.
    pub category: Option<String>,
    /// Title substring search.
    pub q: Option<String>,
    pub featured: Option<bool>,
    pub sort: Option<ProductSort>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ListQuery {
    async fn into_filter(
        self,
        state: &AppState,
        active: Option<bool>,
    ) -> Result<Option<ProductFilter>, AppError> {
        let category_id = match self.category.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => {
                // An unknown category slug is an empty listing, not an error.
                match categories::find_by_slug(state.pool(), slug).await? {
                    Some(category) => Some(category.id),
                    None => return Ok(None),
                }
            }
            _ => None,
        };

        Ok(Some(ProductFilter {
            category_id,
            featured: self.featured,
            search: self.q.filter(|q| !q.trim().is_empty()),
            active,
            sort: self.sort.unwrap_or_default(),
        }))
    }
}

/// `GET /api/products`
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<ApiResponse<Paged<Product>>>, AppError> {
    let page = Page::clamped(query.page, query.per_page);
    let Some(filter) = query.into_filter(&state, Some(true)).await? else {
        return Ok(ok(Paged::new(Vec::new(), page, 0)));
    };

    let items = products::list(state.pool(), &filter, page).await?;
    let total = products::count(state.pool(), &filter).await?;
    Ok(ok(Paged::new(items, page, total)))
}

/// `GET /api/products/admin/all` (admin). Same filters as the public
/// listing but hidden products are included.
pub async fn admin_list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<ApiResponse<Paged<Product>>>, AppError> {
    let page = Page::clamped(query.page, query.per_page);
    let Some(filter) = query.into_filter(&state, None).await? else {
        return Ok(ok(Paged::new(Vec::new(), page, 0)));
    };

    let items = products::list(state.pool(), &filter, page).await?;
    let total = products::count(state.pool(), &filter).await?;
    Ok(ok(Paged::new(items, page, total)))
}

/// `GET /api/products/{id}`
///
/// The path segment is a numeric id or a slug; storefront links use slugs
/// and older share links use ids. Slug lookups go through the catalog
/// cache, id lookups are rare enough to always hit the database.
pub async fn show(
    State(state): State<AppState>,
    ApiPath(key): ApiPath<String>,
) -> Result<Json<ApiResponse<Product>>, AppError> {
    if let Ok(id) = key.parse::<i32>() {
        let product = products::find_active_by_id(state.pool(), ProductId::new(id))
            .await?
            .ok_or_else(|| AppError::not_found("product"))?;
        return Ok(ok(product));
    }

    if let Some(cached) = state.catalog_cache().product(&key).await {
        return Ok(ok((*cached).clone()));
    }

    let product = products::find_active_by_slug(state.pool(), &key)
        .await?
        .ok_or_else(|| AppError::not_found("product"))?;
    state
        .catalog_cache()
        .store_product(Arc::new(product.clone()))
        .await;
    Ok(ok(product))
}

/// Body for product create and update.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub mrp: Option<Decimal>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub category_id: Option<marigold_core::CategoryId>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub featured: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl ProductRequest {
    fn into_input(self) -> Result<ProductInput, AppError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::validation("title is required"));
        }
        if self.price <= Decimal::ZERO {
            return Err(AppError::validation("price must be positive"));
        }
        if let Some(mrp) = self.mrp {
            if mrp < self.price {
                return Err(AppError::validation("mrp cannot be below the sale price"));
            }
        }
        if self.stock < 0 {
            return Err(AppError::validation("stock cannot be negative"));
        }

        let slug = match self.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ => slugify(&title),
        };
        if slug.is_empty() {
            return Err(AppError::validation("a slug could not be derived from the title"));
        }

        Ok(ProductInput {
            title,
            slug,
            description: self.description,
            price: self.price,
            mrp: self.mrp,
            images: self.images,
            sizes: self.sizes,
            category_id: self.category_id,
            stock: self.stock,
            featured: self.featured,
            active: self.active,
        })
    }
}

/// `POST /api/products` (admin)
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiJson(body): ApiJson<ProductRequest>,
) -> Result<Json<ApiResponse<Product>>, AppError> {
    let input = body.into_input()?;
    let product = products::create(state.pool(), &input).await?;
    state.catalog_cache().invalidate_all();

    tracing::info!(product = product.id.as_i32(), slug = %product.slug, "product created");

    Ok(ok(product))
}

/// `PUT /api/products/{id}` (admin)
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<ProductRequest>,
) -> Result<Json<ApiResponse<Product>>, AppError> {
    let input = body.into_input()?;
    let product = products::update(state.pool(), id, &input).await?;
    state.catalog_cache().invalidate_all();
    Ok(ok(product))
}

/// `DELETE /api/products/{id}` (admin)
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    products::delete(state.pool(), id).await?;
    state.catalog_cache().invalidate_all();

    tracing::info!(product = id.as_i32(), "product deleted");

    Ok(ok(json!({ "deleted": true })))
}
