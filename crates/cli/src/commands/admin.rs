//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a new admin user, or promote an existing account
//! mg-cli admin create -e admin@example.com -n "Admin Name" -p "a long password"
//! ```
//!
//! # Environment Variables
//!
//! - `MARIGOLD_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHasher};
use sqlx::PgPool;
use thiserror::Error;

use marigold_core::{Email, UserRole};

/// Matches the API's registration minimum.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Password below the minimum length.
    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters")]
    WeakPassword,

    /// Password hashing failure.
    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

/// Create an admin user, or promote an existing account to admin.
///
/// The password is hashed with argon2id before it touches the database. An
/// existing account keeps its name but gets the admin role and the new hash,
/// so this doubles as a password reset for a locked-out admin.
///
/// # Returns
///
/// The ID of the created or promoted user.
///
/// # Errors
///
/// Returns [`AdminError`] if validation fails or the database is unreachable.
pub async fn create_user(email: &str, name: &str, password: &str) -> Result<i32, AdminError> {
    dotenvy::dotenv().ok();

    let email = Email::parse(email).map_err(|e| AdminError::InvalidEmail(e.to_string()))?;

    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AdminError::WeakPassword);
    }

    let database_url =
        super::database_url().ok_or(AdminError::MissingEnvVar("MARIGOLD_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(&database_url).await?;

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AdminError::PasswordHash(e.to_string()))?
        .to_string();

    let existing: Option<(i32,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(&pool)
        .await?;

    let user_id = match existing {
        Some((id,)) => {
            sqlx::query(
                "UPDATE users SET role = $2, password_hash = $3, updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .bind(UserRole::Admin.as_str())
            .bind(&password_hash)
            .execute(&pool)
            .await?;

            tracing::info!("Promoted existing account to admin. ID: {}, Email: {}", id, email);
            id
        }
        None => {
            let (id,): (i32,) = sqlx::query_as(
                "
                INSERT INTO users (name, email, password_hash, role)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                ",
            )
            .bind(name)
            .bind(email.as_str())
            .bind(&password_hash)
            .bind(UserRole::Admin.as_str())
            .fetch_one(&pool)
            .await?;

            tracing::info!("Admin user created successfully! ID: {}, Email: {}", id, email);
            id
        }
    };

    Ok(user_id)
}
