//! Server-side cart repository.
//!
//! Each user has at most one cart row; the line items live in a single JSONB
//! column so cart writes stay a one-row upsert. Carts hold only references
//! (product ID, size, quantity) and are re-priced from the catalog at read
//! and checkout time, so a price change never leaves a stale amount here.

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use marigold_core::{ProductId, UserId};

use super::RepositoryError;

/// Most units of one product allowed in a single cart line.
pub const MAX_LINE_QUANTITY: i32 = 20;

/// One cart line: a product reference plus the chosen size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    /// Chosen size label, for sized apparel. `None` for one-size products.
    pub size: Option<String>,
    pub quantity: i32,
}

impl CartItem {
    /// Whether `other` refers to the same product and size.
    #[must_use]
    pub fn same_line(&self, other: &Self) -> bool {
        self.product_id == other.product_id && self.size == other.size
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    items: Json<Vec<CartItem>>,
}

/// Merge a new line into a cart, summing quantities for an existing line.
///
/// The merged quantity is clamped to [`MAX_LINE_QUANTITY`].
pub fn merge_line(items: &mut Vec<CartItem>, line: CartItem) {
    match items.iter_mut().find(|existing| existing.same_line(&line)) {
        Some(existing) => {
            existing.quantity = (existing.quantity + line.quantity).min(MAX_LINE_QUANTITY);
        }
        None => items.push(line),
    }
}

/// Set an existing line's quantity; zero removes the line.
///
/// Returns `false` if no matching line exists.
pub fn set_line_quantity(
    items: &mut Vec<CartItem>,
    product_id: ProductId,
    size: Option<&str>,
    quantity: i32,
) -> bool {
    let Some(index) = items
        .iter()
        .position(|item| item.product_id == product_id && item.size.as_deref() == size)
    else {
        return false;
    };

    if quantity == 0 {
        items.remove(index);
    } else {
        items[index].quantity = quantity.min(MAX_LINE_QUANTITY);
    }

    true
}

/// Remove a line. Returns `false` if no matching line exists.
pub fn remove_line(items: &mut Vec<CartItem>, product_id: ProductId, size: Option<&str>) -> bool {
    let before = items.len();
    items.retain(|item| !(item.product_id == product_id && item.size.as_deref() == size));
    items.len() != before
}

/// Load a user's cart lines. A user with no cart row has an empty cart.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(pool: &PgPool, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError> {
    let row = sqlx::query_as::<_, CartRow>("SELECT items FROM carts WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.items.0).unwrap_or_default())
}

/// Persist a user's cart lines, creating the row on first write.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn save(
    pool: &PgPool,
    user_id: UserId,
    items: &[CartItem],
) -> Result<(), RepositoryError> {
    sqlx::query(
        "
        INSERT INTO carts (user_id, items)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE
        SET items = EXCLUDED.items, updated_at = NOW()
        ",
    )
    .bind(user_id)
    .bind(Json(items))
    .execute(pool)
    .await?;

    Ok(())
}

/// Empty a user's cart. A missing cart row is already empty.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn clear(pool: &PgPool, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM carts WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Empty a user's cart inside the checkout transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn clear_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM carts WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}
