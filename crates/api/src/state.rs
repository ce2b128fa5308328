//! Shared application state.

use std::fmt;
use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::CatalogCache;
use crate::config::ApiConfig;
use crate::middleware::rate_limit::ApiRateLimiter;
use crate::services::payments::PaymentGateways;

/// Application state handed to every handler. Cheap to clone; everything
/// lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    payments: PaymentGateways,
    catalog_cache: CatalogCache,
    api_limiter: ApiRateLimiter,
}

impl AppState {
    #[must_use]
    pub fn new(config: ApiConfig, pool: PgPool) -> Self {
        let payments = PaymentGateways::new(&config.gateways);
        let api_limiter = ApiRateLimiter::new(&config.rate_limit_allowlist);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                payments,
                catalog_cache: CatalogCache::new(),
                api_limiter,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn payments(&self) -> &PaymentGateways {
        &self.inner.payments
    }

    #[must_use]
    pub fn catalog_cache(&self) -> &CatalogCache {
        &self.inner.catalog_cache
    }

    #[must_use]
    pub fn api_limiter(&self) -> &ApiRateLimiter {
        &self.inner.api_limiter
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("catalog_cache", &self.inner.catalog_cache)
            .finish_non_exhaustive()
    }
}
