//! Per-IP rate limiting.
//!
//! Two tiers:
//! - [`strict_rate_limiter`]: a tower layer for credential and contact
//!   endpoints (~10 requests/minute).
//! - [`ApiRateLimiter`]: a keyed limiter for everything else (~1/second with
//!   a burst of 50), applied by [`api_rate_limit`] and skipped for
//!   allowlisted addresses such as the shop's own frontend servers.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

use crate::error::AppError;
use crate::state::AppState;

/// Tokens replenished per second by the general limiter.
const GENERAL_PER_SECOND: NonZeroU32 = NonZeroU32::MIN;
/// Burst allowance of the general limiter.
const GENERAL_BURST: u32 = 50;

/// Proxy headers consulted for the real client IP, in order.
const IP_HEADERS: &[&str] = &[
    "cf-connecting-ip",
    "x-forwarded-for",
    "x-real-ip",
    "fly-client-ip",
];

/// Real client IP as reported by the proxy chain.
///
/// `x-forwarded-for` may carry a chain; only the first (client) entry counts.
#[must_use]
pub fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|value| value.trim().parse::<IpAddr>().ok())
    })
}

// =============================================================================
// Strict limiter for credential endpoints
// =============================================================================

/// Key extractor that prefers proxy headers and falls back to the peer
/// address, so the limiter also works when the API is hit directly.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &axum::http::Request<T>) -> Result<Self::Key, GovernorError> {
        if let Some(ip) = client_ip(req.headers()) {
            return Ok(ip);
        }

        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Layer for registration, login, and contact submissions: 1 token every
/// 6 seconds with a burst of 5, roughly 10 requests per minute per IP.
///
/// # Panics
///
/// This function will not panic. The configuration uses only valid positive
/// integers (`per_second(6)` and `burst_size(5)`), which are always accepted
/// by `GovernorConfigBuilder`.
#[must_use]
pub fn strict_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(6)
        .burst_size(5)
        .error_handler(governor_error_response)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}

/// Rewrite governor rejections into the JSON error envelope.
fn governor_error_response(error: GovernorError) -> Response {
    match error {
        GovernorError::TooManyRequests { .. } => AppError::RateLimited.into_response(),
        GovernorError::UnableToExtractKey | GovernorError::Other { .. } => {
            AppError::Internal("could not determine client address".to_string()).into_response()
        }
    }
}

// =============================================================================
// General API limiter with allowlist
// =============================================================================

/// Keyed per-IP limiter for the general API surface.
///
/// Addresses on the allowlist bypass the limiter entirely.
pub struct ApiRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
    allowlist: HashSet<IpAddr>,
}

impl ApiRateLimiter {
    /// # Panics
    ///
    /// This function will not panic: the burst size is a positive constant.
    #[must_use]
    pub fn new(allowlist: &[IpAddr]) -> Self {
        let quota = Quota::per_second(GENERAL_PER_SECOND)
            .allow_burst(NonZeroU32::new(GENERAL_BURST).expect("burst size is non-zero"));
        Self {
            limiter: RateLimiter::keyed(quota),
            allowlist: allowlist.iter().copied().collect(),
        }
    }

    /// Whether a request from `ip` may proceed.
    pub fn check(&self, ip: IpAddr) -> bool {
        if self.allowlist.contains(&ip) {
            return true;
        }
        self.limiter.check_key(&ip).is_ok()
    }
}

/// Middleware applying [`ApiRateLimiter`] to every request.
///
/// Requests whose client IP cannot be determined are allowed through.
pub async fn api_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(request.headers()).or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    });

    if let Some(ip) = ip {
        if !state.api_limiter().check(ip) {
            tracing::debug!(%ip, path = %request.uri().path(), "rate limited");
            return Err(AppError::RateLimited);
        }
    }

    Ok(next.run(request).await)
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
    fn test_client_ip_prefers_cloudflare_header() {
        let map = headers(&[
            ("x-forwarded-for", "203.0.113.9"),
            ("cf-connecting-ip", "198.51.100.7"),
        ]);
        assert_eq!(client_ip(&map), Some("198.51.100.7".parse().unwrap()));
    }

    #[test]
    fn test_client_ip_takes_first_forwarded_entry() {
        let map = headers(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1, 10.0.0.2")]);
        assert_eq!(client_ip(&map), Some("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn test_client_ip_ignores_garbage() {
        let map = headers(&[("x-forwarded-for", "not-an-ip")]);
        assert_eq!(client_ip(&map), None);
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn test_limiter_denies_after_burst() {
        let limiter = ApiRateLimiter::new(&[]);
        let ip: IpAddr = "203.0.113.50".parse().unwrap();

        let denied = (0..=GENERAL_BURST).any(|_| !limiter.check(ip));
        assert!(denied, "burst should be exhausted within {GENERAL_BURST} + 1 checks");
    }

    #[test]
    fn test_limiter_keys_are_independent() {
        let limiter = ApiRateLimiter::new(&[]);
        let busy: IpAddr = "203.0.113.51".parse().unwrap();
        let quiet: IpAddr = "203.0.113.52".parse().unwrap();

        for _ in 0..=GENERAL_BURST {
            let _ = limiter.check(busy);
        }
        assert!(limiter.check(quiet));
    }

    #[test]
    fn test_allowlisted_ip_is_never_limited() {
        let ip: IpAddr = "203.0.113.53".parse().unwrap();
        let limiter = ApiRateLimiter::new(&[ip]);

        assert!((0..GENERAL_BURST * 2).all(|_| limiter.check(ip)));
    }
}
