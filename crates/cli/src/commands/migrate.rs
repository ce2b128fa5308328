//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! mg-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `MARIGOLD_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Migrations live in `crates/api/migrations/` and are embedded into the
//! binary at compile time, so the deployed CLI needs no source checkout:
//!
//! ```text
//! migrations/
//! ├── 20260512000001_create_users.sql
//! ├── 20260512000002_create_categories.sql
//! ├── 20260512000003_create_products.sql
//! └── ...
//! ```

use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply pending migrations.
///
/// Already-applied migrations are skipped; sqlx tracks them in the
/// `_sqlx_migrations` table.
///
/// # Errors
///
/// Returns [`MigrationError`] if the database is unreachable or a migration
/// fails to apply.
pub async fn run() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url =
        super::database_url().ok_or(MigrationError::MissingEnvVar("MARIGOLD_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(&database_url).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
