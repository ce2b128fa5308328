//! In-process cache for hot public catalog reads.
//!
//! Categories, carousel slides, and product detail pages are read on nearly
//! every storefront request but change only through the admin panel, so they
//! sit behind a short-TTL `moka` cache. Every admin catalog write calls
//! [`CatalogCache::invalidate_all`]; the TTL is just a backstop for writes
//! that bypass the API (seeding, manual SQL).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::db::carousel::Slide;
use crate::db::categories::Category;
use crate::db::products::Product;

const CATALOG_TTL: Duration = Duration::from_secs(300);
const PRODUCT_CAPACITY: u64 = 1000;

const ACTIVE_KEY: &str = "active";

#[derive(Clone)]
pub struct CatalogCache {
    categories: Cache<&'static str, Arc<Vec<Category>>>,
    slides: Cache<&'static str, Arc<Vec<Slide>>>,
    /// Keyed by product slug.
    products: Cache<String, Arc<Product>>,
}

impl CatalogCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            categories: Cache::builder()
                .max_capacity(1)
                .time_to_live(CATALOG_TTL)
                .build(),
            slides: Cache::builder()
                .max_capacity(1)
                .time_to_live(CATALOG_TTL)
                .build(),
            products: Cache::builder()
                .max_capacity(PRODUCT_CAPACITY)
                .time_to_live(CATALOG_TTL)
                .build(),
        }
    }

    pub async fn categories(&self) -> Option<Arc<Vec<Category>>> {
        self.categories.get(&ACTIVE_KEY).await
    }

    pub async fn store_categories(&self, categories: Arc<Vec<Category>>) {
        self.categories.insert(ACTIVE_KEY, categories).await;
    }

    pub async fn slides(&self) -> Option<Arc<Vec<Slide>>> {
        self.slides.get(&ACTIVE_KEY).await
    }

    pub async fn store_slides(&self, slides: Arc<Vec<Slide>>) {
        self.slides.insert(ACTIVE_KEY, slides).await;
    }

    pub async fn product(&self, slug: &str) -> Option<Arc<Product>> {
        self.products.get(slug).await
    }

    pub async fn store_product(&self, product: Arc<Product>) {
        self.products.insert(product.slug.clone(), product).await;
    }

    /// Drop everything cached. Called after any admin catalog mutation;
    /// entries are cheap to rebuild and correctness beats hit rate here.
    pub fn invalidate_all(&self) {
        self.categories.invalidate_all();
        self.slides.invalidate_all();
        self.products.invalidate_all();
    }
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CatalogCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogCache")
            .field("products", &self.products.entry_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use marigold_core::CategoryId;

    use super::*;

    fn category(name: &str) -> Category {
        Category {
            id: CategoryId::new(1),
            name: name.to_string(),
            slug: name.to_lowercase(),
            image_url: None,
            position: 0,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_store_and_invalidate() {
        let cache = CatalogCache::new();
        assert!(cache.categories().await.is_none());

        cache
            .store_categories(Arc::new(vec![category("Kurtas")]))
            .await;
        assert_eq!(cache.categories().await.map(|c| c.len()), Some(1));

        cache.invalidate_all();
        assert!(cache.categories().await.is_none());
    }
}
