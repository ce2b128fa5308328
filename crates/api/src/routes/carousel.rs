//! Homepage carousel routes.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};

use marigold_core::SlideId;

use crate::db::carousel::{self, Slide, SlideInput};
use crate::error::{ApiJson, ApiPath, ApiResponse, AppError, ok};
use crate::middleware::auth::RequireAdmin;
use crate::state::AppState;

/// `GET /api/carousel`
pub async fn list(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Slide>>>, AppError> {
    if let Some(cached) = state.catalog_cache().slides().await {
        return Ok(ok((*cached).clone()));
    }

    let slides = carousel::list_active(state.pool()).await?;
    state
        .catalog_cache()
        .store_slides(Arc::new(slides.clone()))
        .await;
    Ok(ok(slides))
}

/// `GET /api/carousel/all` (admin)
pub async fn admin_list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<ApiResponse<Vec<Slide>>>, AppError> {
    let slides = carousel::list_all(state.pool()).await?;
    Ok(ok(slides))
}

/// Body for slide create and update.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub image_url: String,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub position: i32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl SlideRequest {
    fn into_input(self) -> Result<SlideInput, AppError> {
        let image_url = self.image_url.trim().to_string();
        if image_url.is_empty() {
            return Err(AppError::validation("image url is required"));
        }

        Ok(SlideInput {
            title: self.title.filter(|title| !title.trim().is_empty()),
            image_url,
            link_url: self.link_url.filter(|url| !url.trim().is_empty()),
            position: self.position,
            active: self.active,
        })
    }
}

/// `POST /api/carousel` (admin)
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiJson(body): ApiJson<SlideRequest>,
) -> Result<Json<ApiResponse<Slide>>, AppError> {
    let input = body.into_input()?;
    let slide = carousel::create(state.pool(), &input).await?;
    state.catalog_cache().invalidate_all();

    tracing::info!(slide = slide.id.as_i32(), "carousel slide created");

    Ok(ok(slide))
}

/// `PUT /api/carousel/{id}` (admin)
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiPath(id): ApiPath<SlideId>,
    ApiJson(body): ApiJson<SlideRequest>,
) -> Result<Json<ApiResponse<Slide>>, AppError> {
    let input = body.into_input()?;
    let slide = carousel::update(state.pool(), id, &input).await?;
    state.catalog_cache().invalidate_all();
    Ok(ok(slide))
}

/// `DELETE /api/carousel/{id}` (admin)
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiPath(id): ApiPath<SlideId>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    carousel::delete(state.pool(), id).await?;
    state.catalog_cache().invalidate_all();

    tracing::info!(slide = id.as_i32(), "carousel slide deleted");

    Ok(ok(json!({ "deleted": true })))
}
