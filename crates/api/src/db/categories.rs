//! Product category repository.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use marigold_core::CategoryId;

use super::RepositoryError;

/// A catalog category, e.g. "Feeding kurtas".
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub image_url: Option<String>,
    /// Display order on the storefront, ascending.
    pub position: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating or updating a category.
#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub slug: String,
    pub image_url: Option<String>,
    pub position: i32,
    pub active: bool,
}

const CATEGORY_COLUMNS: &str =
    "id, name, slug, image_url, position, active, created_at, updated_at";

/// List categories shown on the storefront, in display order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_active(pool: &PgPool) -> Result<Vec<Category>, RepositoryError> {
    let categories = sqlx::query_as::<_, Category>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE active = TRUE ORDER BY position, name"
    ))
    .fetch_all(pool)
    .await?;

    Ok(categories)
}

/// List every category, including hidden ones, for the admin panel.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_all(pool: &PgPool) -> Result<Vec<Category>, RepositoryError> {
    let categories = sqlx::query_as::<_, Category>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY position, name"
    ))
    .fetch_all(pool)
    .await?;

    Ok(categories)
}

/// Look up a category by its slug.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Category>, RepositoryError> {
    let category = sqlx::query_as::<_, Category>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = $1"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    Ok(category)
}

/// Create a category.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the name or slug is already taken.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn create(pool: &PgPool, input: &CategoryInput) -> Result<Category, RepositoryError> {
    let category = sqlx::query_as::<_, Category>(&format!(
        "
        INSERT INTO categories (name, slug, image_url, position, active)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {CATEGORY_COLUMNS}
        "
    ))
    .bind(&input.name)
    .bind(&input.slug)
    .bind(&input.image_url)
    .bind(input.position)
    .bind(input.active)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        RepositoryError::from_unique_violation(e, "category name or slug already exists")
    })?;

    Ok(category)
}

/// Replace a category's fields.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the category doesn't exist.
/// Returns `RepositoryError::Conflict` if the new name or slug is taken.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn update(
    pool: &PgPool,
    id: CategoryId,
    input: &CategoryInput,
) -> Result<Category, RepositoryError> {
    let category = sqlx::query_as::<_, Category>(&format!(
        "
        UPDATE categories
        SET name = $2, slug = $3, image_url = $4, position = $5, active = $6, updated_at = NOW()
        WHERE id = $1
        RETURNING {CATEGORY_COLUMNS}
        "
    ))
    .bind(id)
    .bind(&input.name)
    .bind(&input.slug)
    .bind(&input.image_url)
    .bind(input.position)
    .bind(input.active)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        RepositoryError::from_unique_violation(e, "category name or slug already exists")
    })?
    .ok_or(RepositoryError::NotFound)?;

    Ok(category)
}

/// Delete a category. Products referencing it keep existing; the FK sets
/// their `category_id` to NULL.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the category doesn't exist.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn delete(pool: &PgPool, id: CategoryId) -> Result<(), RepositoryError> {
    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }

    Ok(())
}
