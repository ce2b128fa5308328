//! Seed the database with a demo catalog for local development.
//!
//! Inserts a small set of categories, products, carousel slides, and one
//! coupon. Safe to run repeatedly: rows are keyed on their slug or code and
//! existing rows are left untouched, so a re-run after local edits does not
//! clobber them.
//!
//! # Usage
//!
//! ```bash
//! mg-cli seed
//! ```
//!
//! # Environment Variables
//!
//! - `MARIGOLD_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)

use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur during seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Seed the demo catalog.
///
/// # Errors
///
/// Returns [`SeedError`] if the database is unreachable or a write fails.
pub async fn run() -> Result<(), SeedError> {
    dotenvy::dotenv().ok();

    let database_url =
        super::database_url().ok_or(SeedError::MissingEnvVar("MARIGOLD_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(&database_url).await?;

    let categories = seed_categories(&pool).await?;
    let products = seed_products(&pool).await?;
    let slides = seed_slides(&pool).await?;
    let coupons = seed_coupons(&pool).await?;

    tracing::info!("Seeding complete!");
    tracing::info!("  Categories inserted: {categories}");
    tracing::info!("  Products inserted: {products}");
    tracing::info!("  Slides inserted: {slides}");
    tracing::info!("  Coupons inserted: {coupons}");
    Ok(())
}

const CATEGORIES: &[(&str, &str, i32)] = &[
    ("Feeding Wear", "feeding-wear", 1),
    ("Maternity Dresses", "maternity-dresses", 2),
    ("Maternity Essentials", "maternity-essentials", 3),
];

async fn seed_categories(pool: &PgPool) -> Result<u64, SeedError> {
    let mut inserted = 0;
    for (name, slug, position) in CATEGORIES {
        let result = sqlx::query(
            "
            INSERT INTO categories (name, slug, position)
            VALUES ($1, $2, $3)
            ON CONFLICT (slug) DO NOTHING
            ",
        )
        .bind(name)
        .bind(slug)
        .bind(position)
        .execute(pool)
        .await?;

        inserted += result.rows_affected();
    }
    Ok(inserted)
}

struct DemoProduct {
    title: &'static str,
    slug: &'static str,
    description: &'static str,
    price: Decimal,
    mrp: Option<Decimal>,
    category: &'static str,
    sizes: &'static [&'static str],
    stock: i32,
    featured: bool,
}

const APPAREL_SIZES: &[&str] = &["S", "M", "L", "XL"];

fn demo_products() -> Vec<DemoProduct> {
    vec![
        DemoProduct {
            title: "Classic Nursing Tee",
            slug: "classic-nursing-tee",
            description: "Soft cotton tee with discreet side-lift nursing access.",
            price: Decimal::new(899_00, 2),
            mrp: Some(Decimal::new(1199_00, 2)),
            category: "feeding-wear",
            sizes: APPAREL_SIZES,
            stock: 40,
            featured: true,
        },
        DemoProduct {
            title: "Zip-Access Feeding Kurta",
            slug: "zip-access-feeding-kurta",
            description: "Everyday kurta with concealed vertical feeding zips.",
            price: Decimal::new(1299_00, 2),
            mrp: Some(Decimal::new(1699_00, 2)),
            category: "feeding-wear",
            sizes: APPAREL_SIZES,
            stock: 30,
            featured: true,
        },
        DemoProduct {
            title: "Wrap Maternity Dress",
            slug: "wrap-maternity-dress",
            description: "Adjustable wrap silhouette that works through every trimester.",
            price: Decimal::new(1799_00, 2),
            mrp: Some(Decimal::new(2399_00, 2)),
            category: "maternity-dresses",
            sizes: APPAREL_SIZES,
            stock: 25,
            featured: true,
        },
        DemoProduct {
            title: "Floral Maxi Maternity Dress",
            slug: "floral-maxi-maternity-dress",
            description: "Ankle-length maxi in breathable rayon with an empire waist.",
            price: Decimal::new(2099_00, 2),
            mrp: Some(Decimal::new(2799_00, 2)),
            category: "maternity-dresses",
            sizes: APPAREL_SIZES,
            stock: 20,
            featured: false,
        },
        DemoProduct {
            title: "Over-Bump Leggings",
            slug: "over-bump-leggings",
            description: "Full-panel leggings with a stay-put over-bump waistband.",
            price: Decimal::new(749_00, 2),
            mrp: Some(Decimal::new(999_00, 2)),
            category: "maternity-essentials",
            sizes: APPAREL_SIZES,
            stock: 60,
            featured: false,
        },
        DemoProduct {
            title: "Nursing Cover Scarf",
            slug: "nursing-cover-scarf",
            description: "Lightweight muslin scarf that doubles as a feeding cover.",
            price: Decimal::new(549_00, 2),
            mrp: None,
            category: "maternity-essentials",
            sizes: &[],
            stock: 35,
            featured: false,
        },
    ]
}

async fn seed_products(pool: &PgPool) -> Result<u64, SeedError> {
    let mut inserted = 0;
    for product in demo_products() {
        let category: Option<(i32,)> = sqlx::query_as("SELECT id FROM categories WHERE slug = $1")
            .bind(product.category)
            .fetch_optional(pool)
            .await?;

        let Some((category_id,)) = category else {
            tracing::warn!(
                "Skipping {}: category {} does not exist",
                product.slug,
                product.category
            );
            continue;
        };

        let image = format!("https://cdn.marigoldshop.in/demo/{}.jpg", product.slug);
        let result = sqlx::query(
            "
            INSERT INTO products
                (title, slug, description, price, mrp, images, sizes, category_id,
                 stock, featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (slug) DO NOTHING
            ",
        )
        .bind(product.title)
        .bind(product.slug)
        .bind(product.description)
        .bind(product.price)
        .bind(product.mrp)
        .bind(json!([image]))
        .bind(json!(product.sizes))
        .bind(category_id)
        .bind(product.stock)
        .bind(product.featured)
        .execute(pool)
        .await?;

        inserted += result.rows_affected();
    }
    Ok(inserted)
}

async fn seed_slides(pool: &PgPool) -> Result<u64, SeedError> {
    // Slides have no natural key, so seed only into an empty table.
    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM carousel_slides")
        .fetch_one(pool)
        .await?;

    if existing > 0 {
        return Ok(0);
    }

    let slides = [
        (
            Some("New: Feeding Kurtas"),
            "https://cdn.marigoldshop.in/demo/slide-feeding-kurtas.jpg",
            Some("/category/feeding-wear"),
            1,
        ),
        (
            None,
            "https://cdn.marigoldshop.in/demo/slide-monsoon-sale.jpg",
            Some("/category/maternity-dresses"),
            2,
        ),
    ];

    let mut inserted = 0;
    for (title, image_url, link_url, position) in slides {
        let result = sqlx::query(
            "
            INSERT INTO carousel_slides (title, image_url, link_url, position)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(title)
        .bind(image_url)
        .bind(link_url)
        .bind(position)
        .execute(pool)
        .await?;

        inserted += result.rows_affected();
    }
    Ok(inserted)
}

async fn seed_coupons(pool: &PgPool) -> Result<u64, SeedError> {
    let result = sqlx::query(
        "
        INSERT INTO coupons (code, kind, value, min_order_total, max_discount)
        VALUES ('WELCOME10', 'percent', 10, 999, 300)
        ON CONFLICT (code) DO NOTHING
        ",
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
