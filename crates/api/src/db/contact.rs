//! Contact form message repository.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use marigold_core::{ContactMessageId, Email};

use super::{Page, RepositoryError};

/// A message submitted through the storefront contact form.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: ContactMessageId,
    pub name: String,
    pub email: String,
    pub message: String,
    /// Flipped by staff once the message has been handled.
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

const CONTACT_COLUMNS: &str = "id, name, email, message, resolved, created_at";

/// Store a contact form submission.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn create(
    pool: &PgPool,
    name: &str,
    email: &Email,
    message: &str,
) -> Result<ContactMessage, RepositoryError> {
    let stored = sqlx::query_as::<_, ContactMessage>(&format!(
        "
        INSERT INTO contact_messages (name, email, message)
        VALUES ($1, $2, $3)
        RETURNING {CONTACT_COLUMNS}
        "
    ))
    .bind(name)
    .bind(email.as_str())
    .bind(message)
    .fetch_one(pool)
    .await?;

    Ok(stored)
}

/// List messages for the admin panel, unresolved first, then newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list(pool: &PgPool, page: Page) -> Result<Vec<ContactMessage>, RepositoryError> {
    let messages = sqlx::query_as::<_, ContactMessage>(&format!(
        "
        SELECT {CONTACT_COLUMNS}
        FROM contact_messages
        ORDER BY resolved, created_at DESC
        LIMIT $1 OFFSET $2
        "
    ))
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok(messages)
}

/// Count stored messages, for paging metadata.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn count(pool: &PgPool) -> Result<i64, RepositoryError> {
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contact_messages")
        .fetch_one(pool)
        .await?;

    Ok(total)
}

/// Mark a message as handled.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the message doesn't exist.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn mark_resolved(
    pool: &PgPool,
    id: ContactMessageId,
) -> Result<ContactMessage, RepositoryError> {
    let message = sqlx::query_as::<_, ContactMessage>(&format!(
        "
        UPDATE contact_messages
        SET resolved = TRUE
        WHERE id = $1
        RETURNING {CONTACT_COLUMNS}
        "
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    Ok(message)
}
