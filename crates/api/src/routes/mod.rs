//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                      - Liveness check
//! GET  /health/ready                - Readiness check (DB ping)
//!
//! # Accounts
//! POST /api/user/register           - Create account (strict rate limit)
//! POST /api/user/login              - Credential login (strict rate limit)
//! GET  /api/user/me                 - Own profile
//! PUT  /api/user/me                 - Update own profile
//! GET  /api/user                    - List accounts (admin)
//!
//! # Catalog
//! GET    /api/products              - Active products (category/q/featured filters, paged)
//! GET    /api/products/{id}         - Product detail by numeric id or slug
//! GET    /api/products/admin/all    - All products incl. hidden (admin)
//! POST   /api/products              - Create product (admin)
//! PUT    /api/products/{id}         - Update product (admin)
//! DELETE /api/products/{id}         - Delete product (admin)
//! GET    /api/categories            - Active categories, display order
//! GET    /api/categories/all        - All categories (admin)
//! POST   /api/categories            - Create category (admin)
//! PUT    /api/categories/{id}       - Update category (admin)
//! DELETE /api/categories/{id}       - Delete category (admin)
//! GET    /api/carousel              - Active slides, display order
//! GET    /api/carousel/all          - All slides (admin)
//! POST   /api/carousel              - Create slide (admin)
//! PUT    /api/carousel/{id}         - Update slide (admin)
//! DELETE /api/carousel/{id}         - Delete slide (admin)
//!
//! # Coupons
//! POST   /api/coupons/apply         - Preview a coupon against the caller's cart
//! GET    /api/coupons               - List coupons (admin)
//! POST   /api/coupons               - Create coupon (admin)
//! PUT    /api/coupons/{id}          - Update coupon (admin)
//! DELETE /api/coupons/{id}          - Delete coupon (admin)
//!
//! # Cart (requires auth)
//! GET    /api/cart                  - Hydrated cart with live product details
//! POST   /api/cart/items            - Add / merge a line
//! PUT    /api/cart/items            - Set a line's quantity (0 removes)
//! DELETE /api/cart/items            - Remove a line
//! DELETE /api/cart                  - Clear the cart
//!
//! # Orders
//! POST /api/orders                  - Place an order from the cart
//! GET  /api/orders                  - Own orders, newest first
//! GET  /api/orders/{id}             - Order detail (owner or admin)
//! GET  /api/orders/admin/all        - All orders with filters (admin)
//! PUT  /api/orders/{id}/status      - Move order status (admin)
//! PUT  /api/orders/{id}/notes       - Set internal notes (admin)
//!
//! # Payments
//! POST /api/payment/initiate        - Start a gateway payment for an order
//! POST /api/payment/verify/razorpay - Client-side Razorpay handshake
//! POST /api/payment/webhook/razorpay  - Razorpay webhook (signature auth)
//! POST /api/payment/webhook/stripe    - Stripe webhook (signature auth)
//! POST /api/payment/callback/phonepe  - PhonePe server callback (checksum auth)
//! GET  /api/payment/{order_id}/status - Poll payment state after redirect
//!
//! # Contact
//! POST /api/contact                 - Submit a message (strict rate limit)
//! GET  /api/contact                 - List messages (admin)
//! PUT  /api/contact/{id}/resolve    - Mark a message handled (admin)
//! ```

pub mod carousel;
pub mod cart;
pub mod categories;
pub mod contact;
pub mod coupons;
pub mod orders;
pub mod payments;
pub mod products;
pub mod users;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};

use serde::Deserialize;

use crate::db::Page;
use crate::middleware::rate_limit::{api_rate_limit, strict_rate_limiter};
use crate::state::AppState;

/// Pagination query string shared by every list endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn clamped(&self) -> Page {
        Page::clamped(self.page, self.per_page)
    }
}

/// Derives a URL slug from a display title. Lowercases, keeps ASCII
/// alphanumerics, and collapses everything else into single hyphens.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Create the account routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route_layer(strict_rate_limiter())
        .route("/me", get(users::me).put(users::update_me))
        .route("/", get(users::list))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::list).post(products::create))
        .route("/admin/all", get(products::admin_list))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::list).post(categories::create))
        .route("/all", get(categories::admin_list))
        .route("/{id}", put(categories::update).delete(categories::delete))
}

/// Create the carousel routes router.
pub fn carousel_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(carousel::list).post(carousel::create))
        .route("/all", get(carousel::admin_list))
        .route("/{id}", put(carousel::update).delete(carousel::delete))
}

/// Create the coupon routes router.
pub fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/apply", post(coupons::apply))
        .route("/", get(coupons::list).post(coupons::create))
        .route("/{id}", put(coupons::update).delete(coupons::delete))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route(
            "/items",
            post(cart::add_item)
                .put(cart::set_item)
                .delete(cart::remove_item),
        )
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(orders::place).get(orders::list_mine))
        .route("/admin/all", get(orders::admin_list))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", put(orders::update_status))
        .route("/{id}/notes", put(orders::update_notes))
}

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/initiate", post(payments::initiate))
        .route("/verify/razorpay", post(payments::verify_razorpay))
        .route("/webhook/razorpay", post(payments::razorpay_webhook))
        .route("/webhook/stripe", post(payments::stripe_webhook))
        .route("/callback/phonepe", post(payments::phonepe_callback))
        .route("/{order_id}/status", get(payments::status))
}

/// Create the contact routes router.
pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(contact::submit))
        .route_layer(strict_rate_limiter())
        .route("/", get(contact::list))
        .route("/{id}/resolve", put(contact::resolve))
}

/// Create all `/api` routes, with the general per-IP limiter applied.
pub fn routes(state: &AppState) -> Router<AppState> {
    let api = Router::new()
        .nest("/user", user_routes())
        .nest("/products", product_routes())
        .nest("/categories", category_routes())
        .nest("/carousel", carousel_routes())
        .nest("/coupons", coupon_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .nest("/payment", payment_routes())
        .nest("/contact", contact_routes())
        .layer(from_fn_with_state(state.clone(), api_rate_limit));

    Router::new().nest("/api", api)
}
