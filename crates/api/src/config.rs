//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MARIGOLD_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `MARIGOLD_BASE_URL` - Public URL of this API (used for payment redirect/callback URLs)
//! - `MARIGOLD_AUTH_SECRET` - Token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `MARIGOLD_HOST` - Bind address (default: 127.0.0.1)
//! - `MARIGOLD_PORT` - Listen port (default: 4000)
//! - `MARIGOLD_CORS_ORIGINS` - Comma-separated browser origins allowed by CORS
//! - `MARIGOLD_RATE_LIMIT_ALLOWLIST` - Comma-separated IPs exempt from API rate limits
//! - `MARIGOLD_SHIPPING_FEE` - Flat shipping fee in rupees (default: 49)
//! - `MARIGOLD_FREE_SHIPPING_THRESHOLD` - Subtotal at which shipping is waived (default: 999)
//! - `MARIGOLD_CURRENCY` - ISO currency code for checkout (default: INR)
//! - `PHONEPE_MERCHANT_ID` / `PHONEPE_SALT_KEY` / `PHONEPE_SALT_INDEX` / `PHONEPE_BASE_URL`
//! - `RAZORPAY_KEY_ID` / `RAZORPAY_KEY_SECRET` / `RAZORPAY_WEBHOOK_SECRET`
//! - `STRIPE_SECRET_KEY` / `STRIPE_WEBHOOK_SECRET`
//! - `SENTRY_DSN` / `SENTRY_ENVIRONMENT` / `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE`
//!
//! A payment gateway is enabled when its first variable is present; the rest of
//! its group then becomes required.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use marigold_core::CurrencyCode;

const MIN_AUTH_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of this API
    pub base_url: String,
    /// Token signing secret
    pub auth_secret: SecretString,
    /// Browser origins allowed by CORS
    pub cors_origins: Vec<String>,
    /// Client IPs exempt from API rate limiting
    pub rate_limit_allowlist: Vec<IpAddr>,
    /// Shipping fee configuration
    pub shipping: ShippingConfig,
    /// Currency used at checkout
    pub currency: CurrencyCode,
    /// Payment gateway configuration
    pub gateways: GatewayConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry tracing sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Flat-fee shipping with a free threshold.
#[derive(Debug, Clone, Copy)]
pub struct ShippingConfig {
    /// Flat fee applied to every order below the threshold.
    pub fee: Decimal,
    /// Subtotal (after discount) at which shipping becomes free.
    pub free_threshold: Decimal,
}

/// Enabled payment gateways.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub phonepe: Option<PhonepeConfig>,
    pub razorpay: Option<RazorpayConfig>,
    pub stripe: Option<StripeConfig>,
}

/// `PhonePe` PG configuration.
///
/// Implements `Debug` manually to redact the salt key.
#[derive(Clone)]
pub struct PhonepeConfig {
    /// Merchant ID assigned by `PhonePe`
    pub merchant_id: String,
    /// Salt key used for X-VERIFY checksums
    pub salt_key: SecretString,
    /// Salt key index (defaults to 1)
    pub salt_index: String,
    /// API base URL (defaults to the sandbox host)
    pub base_url: String,
}

impl std::fmt::Debug for PhonepeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhonepeConfig")
            .field("merchant_id", &self.merchant_id)
            .field("salt_key", &"[REDACTED]")
            .field("salt_index", &self.salt_index)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Razorpay configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct RazorpayConfig {
    /// Public key ID (safe to expose in browser checkout)
    pub key_id: String,
    /// API key secret (server-side only)
    pub key_secret: SecretString,
    /// Webhook signing secret
    pub webhook_secret: SecretString,
}

impl std::fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .finish()
    }
}

/// Stripe configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    /// API secret key (server-side only)
    pub secret_key: SecretString,
    /// Webhook signing secret
    pub webhook_secret: SecretString,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .finish()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("MARIGOLD_DATABASE_URL")?;
        let host = get_env_or_default("MARIGOLD_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("MARIGOLD_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("MARIGOLD_PORT", "4000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("MARIGOLD_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("MARIGOLD_BASE_URL")?;
        let auth_secret = get_validated_secret("MARIGOLD_AUTH_SECRET")?;
        validate_auth_secret(&auth_secret, "MARIGOLD_AUTH_SECRET")?;

        let cors_origins = parse_origin_list(
            "MARIGOLD_CORS_ORIGINS",
            &get_env_or_default("MARIGOLD_CORS_ORIGINS", ""),
        )?;
        let rate_limit_allowlist = parse_ip_list(
            "MARIGOLD_RATE_LIMIT_ALLOWLIST",
            &get_env_or_default("MARIGOLD_RATE_LIMIT_ALLOWLIST", ""),
        )?;

        let shipping = ShippingConfig {
            fee: parse_decimal("MARIGOLD_SHIPPING_FEE", "49")?,
            free_threshold: parse_decimal("MARIGOLD_FREE_SHIPPING_THRESHOLD", "999")?,
        };
        let currency = get_env_or_default("MARIGOLD_CURRENCY", "INR")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("MARIGOLD_CURRENCY".to_string(), e))?;

        let gateways = GatewayConfig {
            phonepe: PhonepeConfig::from_env()?,
            razorpay: RazorpayConfig::from_env()?,
            stripe: StripeConfig::from_env()?,
        };

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            auth_secret,
            cors_origins,
            rate_limit_allowlist,
            shipping,
            currency,
            gateways,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl PhonepeConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(merchant_id) = get_optional_env("PHONEPE_MERCHANT_ID") else {
            return Ok(None);
        };
        Ok(Some(Self {
            merchant_id,
            salt_key: get_validated_secret("PHONEPE_SALT_KEY")?,
            salt_index: get_env_or_default("PHONEPE_SALT_INDEX", "1"),
            base_url: get_env_or_default(
                "PHONEPE_BASE_URL",
                "https://api-preprod.phonepe.com/apis/pg-sandbox",
            ),
        }))
    }
}

impl RazorpayConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(key_id) = get_optional_env("RAZORPAY_KEY_ID") else {
            return Ok(None);
        };
        Ok(Some(Self {
            key_id,
            key_secret: get_validated_secret("RAZORPAY_KEY_SECRET")?,
            webhook_secret: get_validated_secret("RAZORPAY_WEBHOOK_SECRET")?,
        }))
    }
}

impl StripeConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(secret_key) = get_optional_env("STRIPE_SECRET_KEY") else {
            return Ok(None);
        };
        validate_secret_strength(&secret_key, "STRIPE_SECRET_KEY")?;
        Ok(Some(Self {
            secret_key: SecretString::from(secret_key),
            webhook_secret: get_validated_secret("STRIPE_WEBHOOK_SECRET")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a decimal environment variable with a default.
fn parse_decimal(key: &str, default: &str) -> Result<Decimal, ConfigError> {
    get_env_or_default(key, default)
        .parse::<Decimal>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a comma-separated list of browser origins.
///
/// Each entry must be a valid http(s) URL; trailing slashes are stripped so
/// the stored form matches the browser's `Origin` header.
fn parse_origin_list(key: &str, raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut origins = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let parsed = url::Url::parse(entry)
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), format!("{entry}: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("{entry}: origin must be http or https"),
            ));
        }
        origins.push(entry.trim_end_matches('/').to_string());
    }
    Ok(origins)
}

/// Parse a comma-separated list of IP addresses.
fn parse_ip_list(key: &str, raw: &str) -> Result<Vec<IpAddr>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            entry.parse::<IpAddr>().map_err(|e| {
                ConfigError::InvalidEnvVar(key.to_string(), format!("{entry}: {e}"))
            })
        })
        .collect()
}

/// Validate that the auth secret meets minimum length requirements.
fn validate_auth_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_AUTH_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_AUTH_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_shannon_entropy_high() {
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InsecureSecret(_, _)
        ));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InsecureSecret(_, _)
        ));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        // High-entropy random string
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_auth_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_auth_secret(&secret, "TEST_AUTH").is_err());
    }

    #[test]
    fn test_validate_auth_secret_valid_length() {
        let secret = SecretString::from("a".repeat(32));
        assert!(validate_auth_secret(&secret, "TEST_AUTH").is_ok());
    }

    #[test]
    fn test_parse_origin_list() {
        let origins = parse_origin_list(
            "TEST_ORIGINS",
            "https://www.marigoldshop.in/, http://localhost:5173",
        )
        .unwrap();
        assert_eq!(
            origins,
            vec![
                "https://www.marigoldshop.in".to_string(),
                "http://localhost:5173".to_string()
            ]
        );
    }

    #[test]
    fn test_parse_origin_list_rejects_bad_scheme() {
        assert!(parse_origin_list("TEST_ORIGINS", "ftp://files.example.net").is_err());
        assert!(parse_origin_list("TEST_ORIGINS", "not a url").is_err());
    }

    #[test]
    fn test_parse_origin_list_empty() {
        assert!(parse_origin_list("TEST_ORIGINS", "").unwrap().is_empty());
    }

    #[test]
    fn test_parse_ip_list() {
        let ips = parse_ip_list("TEST_IPS", "10.0.0.1, ::1").unwrap();
        assert_eq!(ips.len(), 2);
        assert!(parse_ip_list("TEST_IPS", "not-an-ip").is_err());
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        // Default is used when the variable is unset, so feed the default instead
        assert!(parse_decimal("MARIGOLD_TEST_UNSET_FEE", "49.50").is_ok());
        assert!(parse_decimal("MARIGOLD_TEST_UNSET_FEE", "forty nine").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = ApiConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 4000,
            base_url: "http://localhost:4000".to_string(),
            auth_secret: SecretString::from("x".repeat(32)),
            cors_origins: vec![],
            rate_limit_allowlist: vec![],
            shipping: ShippingConfig {
                fee: Decimal::new(49, 0),
                free_threshold: Decimal::new(999, 0),
            },
            currency: CurrencyCode::Inr,
            gateways: GatewayConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 4000);
    }

    #[test]
    fn test_gateway_config_debug_redacts_secrets() {
        let config = RazorpayConfig {
            key_id: "rzp_test_key_id".to_string(),
            key_secret: SecretString::from("rzp_super_private_value"),
            webhook_secret: SecretString::from("rzp_webhook_private_value"),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("rzp_test_key_id"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("rzp_super_private_value"));
        assert!(!debug_output.contains("rzp_webhook_private_value"));
    }
}
