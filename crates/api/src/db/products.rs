//! Product catalog repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use marigold_core::{CategoryId, ProductId};

use super::{Page, RepositoryError};

/// A catalog product.
///
/// `images` and `sizes` are stored as JSONB arrays, mirroring the single-row
/// document shape the rest of the order pipeline snapshots from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    /// Strike-through list price, when higher than `price`.
    pub mrp: Option<Decimal>,
    pub images: Vec<String>,
    pub sizes: Vec<String>,
    pub category_id: Option<CategoryId>,
    pub stock: i32,
    pub featured: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    title: String,
    slug: String,
    description: String,
    price: Decimal,
    mrp: Option<Decimal>,
    images: Json<Vec<String>>,
    sizes: Json<Vec<String>>,
    category_id: Option<CategoryId>,
    stock: i32,
    featured: bool,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            description: row.description,
            price: row.price,
            mrp: row.mrp,
            images: row.images.0,
            sizes: row.sizes.0,
            category_id: row.category_id,
            stock: row.stock,
            featured: row.featured,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields accepted when creating or updating a product.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub mrp: Option<Decimal>,
    pub images: Vec<String>,
    pub sizes: Vec<String>,
    pub category_id: Option<CategoryId>,
    pub stock: i32,
    pub featured: bool,
    pub active: bool,
}

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    /// Newest first.
    #[default]
    Newest,
    /// Cheapest first.
    PriceAsc,
    /// Most expensive first.
    PriceDesc,
}

impl ProductSort {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
        }
    }
}

/// Listing filter. `active: None` means both active and hidden products
/// (admin listings); the storefront always passes `Some(true)`.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    pub featured: Option<bool>,
    pub search: Option<String>,
    pub active: Option<bool>,
    pub sort: ProductSort,
}

const PRODUCT_COLUMNS: &str = "id, title, slug, description, price, mrp, images, sizes, \
     category_id, stock, featured, active, created_at, updated_at";

/// List products matching a filter, newest first unless sorted by price.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list(
    pool: &PgPool,
    filter: &ProductFilter,
    page: Page,
) -> Result<Vec<Product>, RepositoryError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "
        SELECT {PRODUCT_COLUMNS}
        FROM products
        WHERE ($1::int IS NULL OR category_id = $1)
          AND ($2::bool IS NULL OR featured = $2)
          AND ($3::text IS NULL OR title ILIKE '%' || $3 || '%')
          AND ($4::bool IS NULL OR active = $4)
        ORDER BY
          CASE WHEN $5 = 'price_asc' THEN price END ASC,
          CASE WHEN $5 = 'price_desc' THEN price END DESC,
          created_at DESC
        LIMIT $6 OFFSET $7
        "
    ))
    .bind(filter.category_id)
    .bind(filter.featured)
    .bind(filter.search.as_deref())
    .bind(filter.active)
    .bind(filter.sort.as_str())
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Product::from).collect())
}

/// Count products matching a filter, for paging metadata.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn count(pool: &PgPool, filter: &ProductFilter) -> Result<i64, RepositoryError> {
    let (total,): (i64,) = sqlx::query_as(
        "
        SELECT COUNT(*)
        FROM products
        WHERE ($1::int IS NULL OR category_id = $1)
          AND ($2::bool IS NULL OR featured = $2)
          AND ($3::text IS NULL OR title ILIKE '%' || $3 || '%')
          AND ($4::bool IS NULL OR active = $4)
        ",
    )
    .bind(filter.category_id)
    .bind(filter.featured)
    .bind(filter.search.as_deref())
    .bind(filter.active)
    .fetch_one(pool)
    .await?;

    Ok(total)
}

/// Look up an active product by its slug, for the storefront detail page.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_active_by_slug(
    pool: &PgPool,
    slug: &str,
) -> Result<Option<Product>, RepositoryError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1 AND active = TRUE"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Product::from))
}

/// Look up an active product by ID, for detail requests using a numeric ref.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_active_by_id(
    pool: &PgPool,
    id: ProductId,
) -> Result<Option<Product>, RepositoryError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND active = TRUE"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Product::from))
}

/// Look up any product by ID, including hidden ones.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_id(pool: &PgPool, id: ProductId) -> Result<Option<Product>, RepositoryError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Product::from))
}

/// Fetch several products by ID, for cart hydration.
///
/// Missing IDs are silently absent from the result.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_ids(
    pool: &PgPool,
    ids: &[ProductId],
) -> Result<Vec<Product>, RepositoryError> {
    let raw_ids: Vec<i32> = ids.iter().map(|id| id.as_i32()).collect();

    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
    ))
    .bind(raw_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Product::from).collect())
}

/// Create a product.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the slug is already taken.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn create(pool: &PgPool, input: &ProductInput) -> Result<Product, RepositoryError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "
        INSERT INTO products
            (title, slug, description, price, mrp, images, sizes, category_id,
             stock, featured, active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {PRODUCT_COLUMNS}
        "
    ))
    .bind(&input.title)
    .bind(&input.slug)
    .bind(&input.description)
    .bind(input.price)
    .bind(input.mrp)
    .bind(Json(&input.images))
    .bind(Json(&input.sizes))
    .bind(input.category_id)
    .bind(input.stock)
    .bind(input.featured)
    .bind(input.active)
    .fetch_one(pool)
    .await
    .map_err(|e| RepositoryError::from_unique_violation(e, "product slug already exists"))?;

    Ok(row.into())
}

/// Replace a product's fields.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the product doesn't exist.
/// Returns `RepositoryError::Conflict` if the slug is already taken.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn update(
    pool: &PgPool,
    id: ProductId,
    input: &ProductInput,
) -> Result<Product, RepositoryError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "
        UPDATE products
        SET title = $2, slug = $3, description = $4, price = $5, mrp = $6,
            images = $7, sizes = $8, category_id = $9, stock = $10,
            featured = $11, active = $12, updated_at = NOW()
        WHERE id = $1
        RETURNING {PRODUCT_COLUMNS}
        "
    ))
    .bind(id)
    .bind(&input.title)
    .bind(&input.slug)
    .bind(&input.description)
    .bind(input.price)
    .bind(input.mrp)
    .bind(Json(&input.images))
    .bind(Json(&input.sizes))
    .bind(input.category_id)
    .bind(input.stock)
    .bind(input.featured)
    .bind(input.active)
    .fetch_optional(pool)
    .await
    .map_err(|e| RepositoryError::from_unique_violation(e, "product slug already exists"))?
    .ok_or(RepositoryError::NotFound)?;

    Ok(row.into())
}

/// Delete a product.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the product doesn't exist.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn delete(pool: &PgPool, id: ProductId) -> Result<(), RepositoryError> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }

    Ok(())
}

/// Atomically take `quantity` units of stock inside a checkout transaction.
///
/// Returns `false` when the product is missing, hidden, or short on stock.
/// The guard clause is what keeps stock from ever going negative under
/// concurrent checkouts.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn reserve_stock(
    tx: &mut Transaction<'_, Postgres>,
    id: ProductId,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "
        UPDATE products
        SET stock = stock - $2, updated_at = NOW()
        WHERE id = $1 AND active = TRUE AND stock >= $2
        ",
    )
    .bind(id)
    .bind(quantity)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Return stock taken by a cancelled order.
///
/// Deleted products are skipped silently; there is nothing to restock.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn restore_stock(
    tx: &mut Transaction<'_, Postgres>,
    id: ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "
        UPDATE products
        SET stock = stock + $2, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(quantity)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_sort_default() {
        assert_eq!(ProductSort::default(), ProductSort::Newest);
    }

    #[test]
    fn test_product_sort_deserializes_snake_case() {
        let sort: ProductSort = serde_json::from_str("\"price_asc\"").expect("valid sort");
        assert_eq!(sort, ProductSort::PriceAsc);
    }
}
