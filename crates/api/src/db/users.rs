//! User account repository.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use marigold_core::{Email, UserId, UserRole};

use super::{Page, RepositoryError};

/// A registered account, without any credential material.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw row; `email` and `role` are validated on the way out so a bad value
/// surfaces as `DataCorruption` instead of a panic.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    email: String,
    phone: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email)
            .map_err(|e| RepositoryError::DataCorruption(format!("user {}: {e}", row.id)))?;
        let role = row.role.parse().map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: row.id,
            name: row.name,
            email,
            phone: row.phone,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserWithPasswordRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

const USER_COLUMNS: &str = "id, name, email, phone, role, created_at, updated_at";

/// Insert a new account.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the email is already registered.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn create(
    pool: &PgPool,
    name: &str,
    email: &Email,
    phone: Option<&str>,
    password_hash: &str,
    role: UserRole,
) -> Result<User, RepositoryError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "
        INSERT INTO users (name, email, phone, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {USER_COLUMNS}
        "
    ))
    .bind(name)
    .bind(email.as_str())
    .bind(phone)
    .bind(password_hash)
    .bind(role.as_str())
    .fetch_one(pool)
    .await
    .map_err(|e| RepositoryError::from_unique_violation(e, "email already registered"))?;

    row.try_into()
}

/// Look up an account by ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
/// Returns `RepositoryError::DataCorruption` if stored fields are invalid.
pub async fn find_by_id(pool: &PgPool, id: UserId) -> Result<Option<User>, RepositoryError> {
    let row =
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;

    row.map(User::try_from).transpose()
}

/// Look up an account together with its password hash, for login.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
/// Returns `RepositoryError::DataCorruption` if stored fields are invalid.
pub async fn find_with_password(
    pool: &PgPool,
    email: &Email,
) -> Result<Option<(User, String)>, RepositoryError> {
    let row = sqlx::query_as::<_, UserWithPasswordRow>(&format!(
        "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
    ))
    .bind(email.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(|r| Ok((User::try_from(r.user)?, r.password_hash)))
        .transpose()
}

/// List accounts for the admin panel, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
/// Returns `RepositoryError::DataCorruption` if stored fields are invalid.
pub async fn list(pool: &PgPool, page: Page) -> Result<Vec<User>, RepositoryError> {
    let rows = sqlx::query_as::<_, UserRow>(&format!(
        "
        SELECT {USER_COLUMNS}
        FROM users
        ORDER BY created_at DESC
        LIMIT $1 OFFSET $2
        "
    ))
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(User::try_from).collect()
}

/// Count accounts, for paging metadata.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn count(pool: &PgPool) -> Result<i64, RepositoryError> {
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    Ok(total)
}

/// Update an account's profile fields.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the account doesn't exist.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn update_profile(
    pool: &PgPool,
    id: UserId,
    name: &str,
    phone: Option<&str>,
) -> Result<User, RepositoryError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "
        UPDATE users
        SET name = $2, phone = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(name)
    .bind(phone)
    .fetch_optional(pool)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    row.try_into()
}

/// Replace an account's password hash.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the account doesn't exist.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn update_password(
    pool: &PgPool,
    id: UserId,
    password_hash: &str,
) -> Result<(), RepositoryError> {
    let result =
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }

    Ok(())
}
