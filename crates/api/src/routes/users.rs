//! Account registration, login, and profile routes.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use marigold_core::{Email, UserRole};

use crate::db::users::{self, User};
use crate::error::{ApiJson, ApiQuery, ApiResponse, AppError, Paged, ok};
use crate::middleware::auth::{CurrentUser, RequireAdmin};
use crate::routes::PageQuery;
use crate::services::auth::{self, AuthError};
use crate::state::AppState;

/// Body for `POST /api/user/register`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub password: String,
}

/// Body for `POST /api/user/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token plus profile, returned by register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// `POST /api/user/register`
pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name is required"));
    }
    let email = Email::parse(body.email.trim()).map_err(AuthError::from)?;
    auth::validate_password(&body.password)?;

    let phone = body
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|phone| !phone.is_empty());
    let password_hash = auth::hash_password(&body.password)?;

    let user = users::create(
        state.pool(),
        name,
        &email,
        phone,
        &password_hash,
        UserRole::Customer,
    )
    .await?;
    let token = auth::issue_token(&state.config().auth_secret, user.id, user.role)?;

    tracing::info!(user = %user.id, "account registered");

    Ok(ok(AuthResponse { token, user }))
}

/// `POST /api/user/login`
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    // A malformed email cannot belong to an account; same rejection as a
    // wrong password so the response doesn't reveal which part failed.
    let email = Email::parse(body.email.trim()).map_err(|_| AuthError::InvalidCredentials)?;

    let (user, password_hash) = users::find_with_password(state.pool(), &email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    auth::verify_password(&body.password, &password_hash)?;

    let token = auth::issue_token(&state.config().auth_secret, user.id, user.role)?;

    tracing::info!(user = %user.id, "login");

    Ok(ok(AuthResponse { token, user }))
}

/// `GET /api/user/me`
pub async fn me(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user = users::find_by_id(state.pool(), caller.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".to_string()))?;
    Ok(ok(user))
}

/// Body for `PUT /api/user/me`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// When present, replaces the account password.
    #[serde(default)]
    pub password: Option<String>,
}

/// `PUT /api/user/me`
pub async fn update_me(
    State(state): State<AppState>,
    caller: CurrentUser,
    ApiJson(body): ApiJson<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name is required"));
    }
    let phone = body
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|phone| !phone.is_empty());

    if let Some(password) = &body.password {
        auth::validate_password(password)?;
        let password_hash = auth::hash_password(password)?;
        users::update_password(state.pool(), caller.user_id, &password_hash).await?;
        tracing::info!(user = %caller.user_id, "password changed");
    }

    let user = users::update_profile(state.pool(), caller.user_id, name, phone).await?;
    Ok(ok(user))
}

/// `GET /api/user` (admin)
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<ApiResponse<Paged<User>>>, AppError> {
    let page = query.clamped();
    let items = users::list(state.pool(), page).await?;
    let total = users::count(state.pool()).await?;
    Ok(ok(Paged::new(items, page, total)))
}
