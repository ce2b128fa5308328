//! Contact form routes.

use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use marigold_core::{ContactMessageId, Email};

use crate::db::contact::{self, ContactMessage};
use crate::error::{ApiJson, ApiPath, ApiQuery, ApiResponse, AppError, Paged, ok};
use crate::middleware::auth::RequireAdmin;
use crate::routes::PageQuery;
use crate::state::AppState;

/// Body for `POST /api/contact`.
#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// `POST /api/contact`
///
/// Open to anonymous visitors; the strict rate limiter is the only thing
/// standing between this endpoint and a spam script.
pub async fn submit(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ContactRequest>,
) -> Result<Json<ApiResponse<ContactMessage>>, AppError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name is required"));
    }
    let message = body.message.trim();
    if message.is_empty() {
        return Err(AppError::validation("message is required"));
    }
    let email =
        Email::parse(body.email.trim()).map_err(|e| AppError::validation(e.to_string()))?;

    let stored = contact::create(state.pool(), name, &email, message).await?;

    tracing::info!(message = stored.id.as_i32(), "contact message received");

    Ok(ok(stored))
}

/// `GET /api/contact` (admin)
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<ApiResponse<Paged<ContactMessage>>>, AppError> {
    let page = query.clamped();
    let items = contact::list(state.pool(), page).await?;
    let total = contact::count(state.pool()).await?;
    Ok(ok(Paged::new(items, page, total)))
}

/// `PUT /api/contact/{id}/resolve` (admin)
pub async fn resolve(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiPath(id): ApiPath<ContactMessageId>,
) -> Result<Json<ApiResponse<ContactMessage>>, AppError> {
    let message = contact::mark_resolved(state.pool(), id).await?;
    Ok(ok(message))
}
