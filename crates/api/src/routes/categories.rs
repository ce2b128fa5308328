//! Category routes: the cached public listing plus admin CRUD.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};

use marigold_core::CategoryId;

use crate::db::categories::{self, Category, CategoryInput};
use crate::error::{ApiJson, ApiPath, ApiResponse, AppError, ok};
use crate::middleware::auth::RequireAdmin;
use crate::routes::slugify;
use crate::state::AppState;

/// `GET /api/categories`
///
/// Active categories only, served from the catalog cache when warm.
pub async fn list(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Category>>>, AppError> {
    if let Some(cached) = state.catalog_cache().categories().await {
        return Ok(ok((*cached).clone()));
    }

    let categories = categories::list_active(state.pool()).await?;
    state
        .catalog_cache()
        .store_categories(Arc::new(categories.clone()))
        .await;
    Ok(ok(categories))
}

/// `GET /api/categories/all` (admin)
pub async fn admin_list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<ApiResponse<Vec<Category>>>, AppError> {
    let categories = categories::list_all(state.pool()).await?;
    Ok(ok(categories))
}

/// Body for category create and update.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRequest {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub position: i32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl CategoryRequest {
    fn into_input(self) -> Result<CategoryInput, AppError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("name is required"));
        }

        let slug = match self.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ => slugify(&name),
        };
        if slug.is_empty() {
            return Err(AppError::validation("a slug could not be derived from the name"));
        }

        Ok(CategoryInput {
            name,
            slug,
            image_url: self.image_url.filter(|url| !url.trim().is_empty()),
            position: self.position,
            active: self.active,
        })
    }
}

/// `POST /api/categories` (admin)
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiJson(body): ApiJson<CategoryRequest>,
) -> Result<Json<ApiResponse<Category>>, AppError> {
    let input = body.into_input()?;
    let category = categories::create(state.pool(), &input).await?;
    state.catalog_cache().invalidate_all();

    tracing::info!(category = category.id.as_i32(), slug = %category.slug, "category created");

    Ok(ok(category))
}

/// `PUT /api/categories/{id}` (admin)
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiPath(id): ApiPath<CategoryId>,
    ApiJson(body): ApiJson<CategoryRequest>,
) -> Result<Json<ApiResponse<Category>>, AppError> {
    let input = body.into_input()?;
    let category = categories::update(state.pool(), id, &input).await?;
    state.catalog_cache().invalidate_all();
    Ok(ok(category))
}

/// `DELETE /api/categories/{id}` (admin)
///
/// Products keep their rows; the foreign key nulls out so they fall back
/// to uncategorized rather than disappearing from the storefront.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiPath(id): ApiPath<CategoryId>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    categories::delete(state.pool(), id).await?;
    state.catalog_cache().invalidate_all();

    tracing::info!(category = id.as_i32(), "category deleted");

    Ok(ok(json!({ "deleted": true })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_input_derives_slug_and_drops_blank_image() {
        let body = CategoryRequest {
            name: " Feeding Kurtas ".to_string(),
            slug: None,
            image_url: Some("   ".to_string()),
            position: 2,
            active: true,
        };
        let input = body.into_input().unwrap();
        assert_eq!(input.name, "Feeding Kurtas");
        assert_eq!(input.slug, "feeding-kurtas");
        assert_eq!(input.image_url, None);
    }

    #[test]
    fn test_input_requires_a_name() {
        let body = CategoryRequest {
            name: "  ".to_string(),
            slug: Some("x".to_string()),
            image_url: None,
            position: 0,
            active: true,
        };
        assert!(body.into_input().is_err());
    }
}
