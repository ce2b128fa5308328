//! Homepage carousel slide repository.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use marigold_core::SlideId;

use super::RepositoryError;

/// A homepage carousel slide.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    pub id: SlideId,
    /// Overlay caption; banners that are pure imagery have none.
    pub title: Option<String>,
    pub image_url: String,
    /// Optional click-through target, e.g. a product or collection page.
    pub link_url: Option<String>,
    pub position: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating or updating a slide.
#[derive(Debug, Clone)]
pub struct SlideInput {
    pub title: Option<String>,
    pub image_url: String,
    pub link_url: Option<String>,
    pub position: i32,
    pub active: bool,
}

const SLIDE_COLUMNS: &str =
    "id, title, image_url, link_url, position, active, created_at, updated_at";

/// List slides shown on the storefront, in display order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_active(pool: &PgPool) -> Result<Vec<Slide>, RepositoryError> {
    let slides = sqlx::query_as::<_, Slide>(&format!(
        "SELECT {SLIDE_COLUMNS} FROM carousel_slides WHERE active = TRUE ORDER BY position, id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(slides)
}

/// List every slide, including hidden ones, for the admin panel.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_all(pool: &PgPool) -> Result<Vec<Slide>, RepositoryError> {
    let slides = sqlx::query_as::<_, Slide>(&format!(
        "SELECT {SLIDE_COLUMNS} FROM carousel_slides ORDER BY position, id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(slides)
}

/// Create a slide.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn create(pool: &PgPool, input: &SlideInput) -> Result<Slide, RepositoryError> {
    let slide = sqlx::query_as::<_, Slide>(&format!(
        "
        INSERT INTO carousel_slides (title, image_url, link_url, position, active)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {SLIDE_COLUMNS}
        "
    ))
    .bind(&input.title)
    .bind(&input.image_url)
    .bind(&input.link_url)
    .bind(input.position)
    .bind(input.active)
    .fetch_one(pool)
    .await?;

    Ok(slide)
}

/// Replace a slide's fields.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the slide doesn't exist.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn update(
    pool: &PgPool,
    id: SlideId,
    input: &SlideInput,
) -> Result<Slide, RepositoryError> {
    let slide = sqlx::query_as::<_, Slide>(&format!(
        "
        UPDATE carousel_slides
        SET title = $2, image_url = $3, link_url = $4,
            position = $5, active = $6, updated_at = NOW()
        WHERE id = $1
        RETURNING {SLIDE_COLUMNS}
        "
    ))
    .bind(id)
    .bind(&input.title)
    .bind(&input.image_url)
    .bind(&input.link_url)
    .bind(input.position)
    .bind(input.active)
    .fetch_optional(pool)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    Ok(slide)
}

/// Delete a slide.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the slide doesn't exist.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn delete(pool: &PgPool, id: SlideId) -> Result<(), RepositoryError> {
    let result = sqlx::query("DELETE FROM carousel_slides WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }

    Ok(())
}
