//! Database operations for the Marigold `PostgreSQL` database.
//!
//! # Tables
//!
//! - `users` - Customer and admin accounts
//! - `categories` - Product categories
//! - `products` - Catalog items (images and sizes as JSONB)
//! - `carousel_slides` - Homepage carousel banners
//! - `coupons` - Discount codes
//! - `carts` - One cart row per user (items as JSONB)
//! - `orders` - Placed orders with embedded line-item snapshots
//! - `contact_messages` - Contact form submissions
//!
//! All queries are runtime-checked (`sqlx::query_as::<_, T>` with
//! `#[derive(sqlx::FromRow)]` row structs) so the crate builds without a
//! live database. Status and role columns are stored as `TEXT`; converting a
//! row to its domain type goes through `FromStr` and an unexpected value
//! surfaces as [`RepositoryError::DataCorruption`].
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p marigold-cli -- migrate
//! ```

pub mod carousel;
pub mod carts;
pub mod categories;
pub mod contact;
pub mod coupons;
pub mod orders;
pub mod products;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug or coupon code).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to [`RepositoryError::Conflict`].
    ///
    /// Everything else passes through as a database error.
    pub(crate) fn from_unique_violation(e: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// A clamped page request.
///
/// Page numbers start at 1. Page size is clamped to 1..=100 with a default
/// of 20, so a hostile `per_page=100000` cannot turn a listing into a table
/// scan dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page: u32,
    per_page: u32,
}

impl Page {
    /// Default page size.
    pub const DEFAULT_PER_PAGE: u32 = 20;
    /// Maximum page size.
    pub const MAX_PER_PAGE: u32 = 100;

    /// Build a page request from raw query values, clamping both fields.
    #[must_use]
    pub fn clamped(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(Self::DEFAULT_PER_PAGE)
                .clamp(1, Self::MAX_PER_PAGE),
        }
    }

    /// The 1-based page number.
    #[must_use]
    pub const fn number(self) -> u32 {
        self.page
    }

    /// Rows per page.
    #[must_use]
    pub const fn per_page(self) -> u32 {
        self.per_page
    }

    /// SQL `LIMIT` value.
    #[must_use]
    pub const fn limit(self) -> i64 {
        self.per_page as i64
    }

    /// SQL `OFFSET` value.
    #[must_use]
    pub const fn offset(self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }

    /// Total number of pages for `total` rows.
    #[must_use]
    pub const fn total_pages(self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total + self.per_page as i64 - 1) / self.per_page as i64
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::clamped(None, None)
    }
}
