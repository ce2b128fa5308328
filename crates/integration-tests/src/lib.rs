//! Integration tests for Marigold.
//!
//! # Running Tests
//!
//! ```bash
//! # Terminal 1: migrate, then start the API
//! cargo run -p marigold-cli -- migrate
//! cargo run -p marigold-api
//!
//! # Terminal 2: run the suite
//! cargo test -p marigold-integration-tests -- --ignored
//! ```
//!
//! Every test is `#[ignore]`d by default because the suite needs a running
//! server. `MARIGOLD_BASE_URL` points the tests at it (default
//! `http://localhost:4000`). Tests that need an admin account also read
//! `MARIGOLD_DATABASE_URL` (or `DATABASE_URL`) to grant the role directly,
//! and skip themselves when neither is set.

#![cfg_attr(not(test), forbid(unsafe_code))]

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Base URL of the API under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("MARIGOLD_BASE_URL").unwrap_or_else(|_| "http://localhost:4000".to_string())
}

/// Credentials of an account created through the public API.
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// One API caller with its own spoofed client address.
///
/// The server rate-limits per client IP and trusts proxy headers to find it,
/// so giving every caller a unique `x-forwarded-for` keeps one test's burst
/// from 429ing its neighbours. Tests that exercise the limiter itself reuse
/// a single caller on purpose.
pub struct Api {
    client: Client,
    base_url: String,
    ip: String,
    token: Option<String>,
}

impl Api {
    #[must_use]
    pub fn new() -> Self {
        let bytes = Uuid::new_v4().into_bytes();
        Self {
            client: Client::new(),
            base_url: base_url(),
            ip: format!("10.{}.{}.{}", bytes[0], bytes[1], bytes[2]),
            token: None,
        }
    }

    /// Register a fresh customer account and adopt its token.
    pub async fn register(&mut self) -> Credentials {
        let credentials = Credentials {
            email: format!("shopper-{}@example.com", Uuid::new_v4()),
            password: "integration-pass-1".to_string(),
        };

        let resp = self
            .post("/api/user/register")
            .json(&json!({
                "name": "Integration Shopper",
                "email": credentials.email,
                "password": credentials.password,
            }))
            .send()
            .await
            .expect("register request failed");

        let data = expect_data(resp).await;
        self.token = Some(
            data["token"]
                .as_str()
                .expect("register response missing token")
                .to_string(),
        );
        credentials
    }

    /// Log in and adopt the returned token.
    pub async fn login(&mut self, credentials: &Credentials) {
        let resp = self
            .post("/api/user/login")
            .json(&json!({
                "email": credentials.email,
                "password": credentials.password,
            }))
            .send()
            .await
            .expect("login request failed");

        let data = expect_data(resp).await;
        self.token = Some(
            data["token"]
                .as_str()
                .expect("login response missing token")
                .to_string(),
        );
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.decorate(self.client.get(self.url(path)))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.decorate(self.client.post(self.url(path)))
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.decorate(self.client.put(self.url(path)))
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.decorate(self.client.delete(self.url(path)))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn decorate(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header("x-forwarded-for", &self.ip);
        match &self.token {
            Some(token) => builder.header("x-auth-token", token),
            None => builder,
        }
    }
}

impl Default for Api {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an admin caller by registering a fresh account and granting it the
/// admin role directly in the database, then logging in again so the token
/// carries the new role.
///
/// Returns `None` when no database URL is configured; callers skip.
pub async fn admin() -> Option<Api> {
    let database_url = std::env::var("MARIGOLD_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()?;

    let mut api = Api::new();
    let credentials = api.register().await;

    let pool = sqlx::PgPool::connect(&database_url)
        .await
        .expect("could not connect to the test database");
    sqlx::query("UPDATE users SET role = 'admin' WHERE email = $1")
        .bind(&credentials.email)
        .execute(&pool)
        .await
        .expect("could not grant the admin role");

    api.login(&credentials).await;
    Some(api)
}

/// Unwrap a success envelope, returning its `data` payload.
///
/// # Panics
///
/// Panics with the response body when the request failed or the envelope is
/// not `{"success": true}`.
pub async fn expect_data(resp: Response) -> Value {
    let status = resp.status();
    let body: Value = resp.json().await.expect("response was not JSON");
    assert!(
        status.is_success() && body["success"] == json!(true),
        "expected a success envelope, got {status}: {body}"
    );
    body["data"].clone()
}

/// Unwrap a failure envelope, returning the status and message.
///
/// # Panics
///
/// Panics with the response body when the request unexpectedly succeeded.
pub async fn expect_failure(resp: Response) -> (StatusCode, String) {
    let status = resp.status();
    let body: Value = resp.json().await.expect("response was not JSON");
    assert!(
        !status.is_success() && body["success"] == json!(false),
        "expected a failure envelope, got {status}: {body}"
    );
    let message = body["message"]
        .as_str()
        .expect("failure envelope missing message")
        .to_string();
    (status, message)
}
