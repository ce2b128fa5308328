//! One-off data backfills for rows written by older releases.
//!
//! Early orders stored the shipping address only in the flat columns
//! (`customer_name`, `address_line`, and friends). Reads now prefer the
//! nested `shipping_info` block, so this command synthesizes the block for
//! rows that predate it. New orders write both forms, so the backfill is
//! only ever needed once per environment.
//!
//! # Usage
//!
//! ```bash
//! # See how many rows would change
//! mg-cli backfill orders --dry-run
//!
//! # Write the nested blocks
//! mg-cli backfill orders
//! ```
//!
//! # Environment Variables
//!
//! - `MARIGOLD_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)

use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur during a backfill.
#[derive(Debug, Error)]
pub enum BackfillError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Fill `shipping_info` on orders that only carry the flat address columns.
///
/// With `dry_run`, reports the affected row count without writing.
///
/// # Errors
///
/// Returns [`BackfillError`] if the database is unreachable or the update
/// fails.
pub async fn orders(dry_run: bool) -> Result<(), BackfillError> {
    dotenvy::dotenv().ok();

    let database_url =
        super::database_url().ok_or(BackfillError::MissingEnvVar("MARIGOLD_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(&database_url).await?;

    let (pending,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM orders WHERE shipping_info IS NULL AND customer_name IS NOT NULL",
    )
    .fetch_one(&pool)
    .await?;

    if dry_run {
        tracing::info!("{pending} orders would be backfilled (dry run)");
        return Ok(());
    }

    if pending == 0 {
        tracing::info!("No orders need backfilling");
        return Ok(());
    }

    // The object keys mirror the serialized AddressInfo shape (camelCase).
    // Missing flat fields become empty strings rather than nulls so the
    // block always deserializes.
    let result = sqlx::query(
        "
        UPDATE orders
        SET shipping_info = jsonb_build_object(
                'name', COALESCE(customer_name, ''),
                'phone', COALESCE(customer_phone, ''),
                'addressLine', COALESCE(address_line, ''),
                'city', COALESCE(city, ''),
                'state', COALESCE(state, ''),
                'postalCode', COALESCE(postal_code, '')
            ),
            updated_at = NOW()
        WHERE shipping_info IS NULL AND customer_name IS NOT NULL
        ",
    )
    .execute(&pool)
    .await?;

    tracing::info!("Backfilled {} orders", result.rows_affected());
    Ok(())
}
