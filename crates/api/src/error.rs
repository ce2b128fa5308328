//! Application error type and the JSON response envelope.
//!
//! Every response body, success or failure, wears the same envelope:
//! `{"success": true, "data": ...}` or `{"success": false, "message": ...}`.
//! Handlers return `Result<Json<ApiResponse<T>>, AppError>` and never build
//! status codes by hand.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::db::{Page, RepositoryError};
use crate::services::auth::AuthError;
use crate::services::payments::GatewayError;

/// Top-level error for request handling.
///
/// Client-caused failures carry their message through to the response;
/// server-side failures are logged, reported to Sentry, and masked.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("too many requests")]
    RateLimited,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message.clone()),
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, message.clone()),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
            Self::Conflict(message) => (StatusCode::CONFLICT, message.clone()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "too many requests, slow down".to_string(),
            ),
            Self::Auth(error) => match error {
                AuthError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "invalid email or password".to_string(),
                ),
                AuthError::WeakPassword { .. } | AuthError::InvalidEmail(_) => {
                    (StatusCode::BAD_REQUEST, error.to_string())
                }
                AuthError::TokenInvalid | AuthError::TokenExpired => (
                    StatusCode::UNAUTHORIZED,
                    "invalid or expired token".to_string(),
                ),
                AuthError::PasswordHash(_) | AuthError::TokenEncoding(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, masked_message())
                }
            },
            Self::Gateway(error) => match error {
                GatewayError::InvalidSignature => {
                    (StatusCode::UNAUTHORIZED, "invalid signature".to_string())
                }
                GatewayError::NotConfigured(gateway) => (
                    StatusCode::BAD_REQUEST,
                    format!("payment gateway {gateway} is not available"),
                ),
                GatewayError::MalformedPayload(_) => (
                    StatusCode::BAD_REQUEST,
                    "malformed gateway payload".to_string(),
                ),
                GatewayError::Http(_) | GatewayError::Rejected { .. } => {
                    (StatusCode::BAD_GATEWAY, "payment gateway error".to_string())
                }
                GatewayError::Amount(_) => (StatusCode::INTERNAL_SERVER_ERROR, masked_message()),
            },
            Self::Repository(error) => match error {
                RepositoryError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
                RepositoryError::Conflict(message) => (StatusCode::CONFLICT, message.clone()),
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, masked_message())
                }
            },
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, masked_message()),
        }
    }
}

fn masked_message() -> String {
    "internal server error".to_string()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
            sentry::capture_error(&self);
        }

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

/// Success envelope. Build with [`ok`].
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

/// Wrap `data` in the success envelope.
pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

/// A page of results plus paging metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Paged<T> {
    pub fn new(items: Vec<T>, page: Page, total: i64) -> Self {
        Self {
            items,
            page: page.number(),
            per_page: page.per_page(),
            total,
            total_pages: page.total_pages(total),
        }
    }
}

/// `axum::Json` with rejections rewritten into the error envelope, so a
/// malformed body gets the same shape as every other failure.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

/// `axum::extract::Path` with rejections rewritten into the error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

/// `axum::extract::Query` with rejections rewritten into the error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_keep_their_message() {
        let (status, message) = AppError::validation("cart is empty").status_and_message();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "cart is empty");
    }

    #[test]
    fn test_repository_conflict_maps_to_409() {
        let error = AppError::from(RepositoryError::Conflict("email already registered".into()));
        let (status, message) = error.status_and_message();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(message, "email already registered");
    }

    #[test]
    fn test_database_details_are_masked() {
        let error = AppError::from(RepositoryError::DataCorruption("user 7: bad role".into()));
        let (status, message) = error.status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "internal server error");
    }

    #[test]
    fn test_not_found_helper() {
        let (status, message) = AppError::not_found("product").status_and_message();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(message, "product not found");
    }
}
