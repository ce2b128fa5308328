//! Authentication extractors.
//!
//! Clients send the signed token in the `x-auth-token` header; a standard
//! `Authorization: Bearer` header works too. Extraction verifies the token
//! signature and expiry only, so authenticated requests cost no database
//! round-trip. Handlers that need the full profile load it by the claimed id.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use marigold_core::{UserId, UserRole};

use crate::error::AppError;
use crate::services::auth;
use crate::state::AppState;

/// Header checked before the `Authorization` header.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// The verified identity behind a request.
///
/// # Example
///
/// ```rust,ignore
/// async fn my_orders(State(state): State<AppState>, user: CurrentUser) -> ... {
///     orders::list_for_user(state.pool(), user.user_id, page).await
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub user_id: UserId,
    pub role: UserRole,
}

impl CurrentUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("missing authentication token".to_string()))?;

        let claims = auth::verify_token(&state.config().auth_secret, token)?;

        Ok(Self {
            user_id: claims.sub,
            role: claims.role,
        })
    }
}

/// Extractor for admin-only routes.
///
/// Rejects with 401 when the token is missing or bad and 403 when the caller
/// is a plain customer.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden("admin access required".to_string()));
        }
        Ok(Self(user))
    }
}

/// Pull the token out of the request headers.
///
/// `x-auth-token` wins over `Authorization` when both are present.
fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
    {
        return Some(token);
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                axum::http::HeaderName::try_from(*name).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_token_header_preferred_over_authorization() {
        let map = headers(&[
            ("x-auth-token", "legacy-token"),
            ("authorization", "Bearer bearer-token"),
        ]);
        assert_eq!(token_from_headers(&map), Some("legacy-token"));
    }

    #[test]
    fn test_bearer_fallback() {
        let map = headers(&[("authorization", "Bearer abc.def")]);
        assert_eq!(token_from_headers(&map), Some("abc.def"));
    }

    #[test]
    fn test_non_bearer_authorization_ignored() {
        let map = headers(&[("authorization", "Basic dXNlcjpwYXNz")]);
        assert_eq!(token_from_headers(&map), None);
    }

    #[test]
    fn test_empty_token_header_falls_through() {
        let map = headers(&[("x-auth-token", ""), ("authorization", "Bearer abc.def")]);
        assert_eq!(token_from_headers(&map), Some("abc.def"));
    }

    #[test]
    fn test_no_headers() {
        assert_eq!(token_from_headers(&HeaderMap::new()), None);
    }
}
