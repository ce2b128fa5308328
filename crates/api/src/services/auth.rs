//! Password hashing and signed bearer tokens.
//!
//! Tokens are two dot-separated base64url segments: the JSON claims and an
//! HMAC-SHA256 over the encoded claims, keyed by the server auth secret.
//! The API stays stateless; nothing about a token is stored server-side,
//! so revocation is by secret rotation only.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use marigold_core::{EmailError, UserId, UserRole};

/// Minimum password length for registration and password changes.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// How long an issued token stays valid.
const TOKEN_TTL_DAYS: i64 = 30;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),
    #[error("token is malformed or has a bad signature")]
    TokenInvalid,
    #[error("token has expired")]
    TokenExpired,
    #[error("token encoding failed: {0}")]
    TokenEncoding(String),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

/// Claims carried inside a signed token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: UserId,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
    /// Unique per-token id, so two tokens for the same user never collide.
    pub jti: Uuid,
}

/// Reject passwords below the minimum length.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

/// Hash a password with argon2id and a fresh random salt.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?;

    Ok(hash.to_string())
}

/// Check a password against a stored hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` if the password doesn't match.
/// Returns `AuthError::PasswordHash` if the stored hash is unparseable.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::PasswordHash(e.to_string()))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Issue a signed token for a user, valid for thirty days.
///
/// # Errors
///
/// Returns `AuthError::TokenEncoding` if the claims fail to serialize.
pub fn issue_token(
    secret: &SecretString,
    user_id: UserId,
    role: UserRole,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = TokenClaims {
        sub: user_id,
        role,
        iat: now.timestamp(),
        exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        jti: Uuid::new_v4(),
    };

    encode_token(secret, &claims)
}

/// Verify a token's signature and expiry, returning its claims.
///
/// # Errors
///
/// Returns `AuthError::TokenInvalid` for malformed or mis-signed tokens and
/// `AuthError::TokenExpired` for stale ones.
pub fn verify_token(secret: &SecretString, token: &str) -> Result<TokenClaims, AuthError> {
    verify_token_at(secret, token, Utc::now())
}

fn encode_token(secret: &SecretString, claims: &TokenClaims) -> Result<String, AuthError> {
    let claims_json =
        serde_json::to_vec(claims).map_err(|e| AuthError::TokenEncoding(e.to_string()))?;
    let payload = URL_SAFE_NO_PAD.encode(claims_json);

    let mut mac = mac_for(secret)?;
    mac.update(payload.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{payload}.{signature}"))
}

fn verify_token_at(
    secret: &SecretString,
    token: &str,
    now: DateTime<Utc>,
) -> Result<TokenClaims, AuthError> {
    let (payload, signature) = token.split_once('.').ok_or(AuthError::TokenInvalid)?;

    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| AuthError::TokenInvalid)?;

    // Mac::verify_slice is constant-time.
    let mut mac = mac_for(secret)?;
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AuthError::TokenInvalid)?;

    let claims_json = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::TokenInvalid)?;
    let claims: TokenClaims =
        serde_json::from_slice(&claims_json).map_err(|_| AuthError::TokenInvalid)?;

    if claims.exp <= now.timestamp() {
        return Err(AuthError::TokenExpired);
    }

    Ok(claims)
}

fn mac_for(secret: &SecretString) -> Result<HmacSha256, AuthError> {
    HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| AuthError::TokenEncoding(e.to_string()))
}
