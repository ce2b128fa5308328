//! Integration tests for the cart, coupons, and checkout.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied
//! - The API server running (cargo run -p marigold-api)
//! - `MARIGOLD_DATABASE_URL` so the suite can promote an admin account;
//!   every test here seeds its own catalog and skips silently without it
//!
//! Run with: cargo test -p marigold-integration-tests -- --ignored

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use uuid::Uuid;

use marigold_integration_tests::{Api, admin, expect_data, expect_failure};

/// Short unique suffix for titles and codes created by a test run.
fn suffix() -> String {
    Uuid::new_v4().simple().to_string().chars().take(8).collect()
}

/// Parse a money field; every decimal in a response serializes as a string.
fn money(value: &Value) -> Decimal {
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected a money string, got {value}"))
        .parse()
        .expect("invalid decimal")
}

/// Seed a product through the admin API.
async fn create_product(
    admin: &Api,
    title: &str,
    price: &str,
    sizes: &[&str],
    stock: i32,
) -> Value {
    let resp = admin
        .post("/api/products")
        .json(&json!({
            "title": title,
            "price": price,
            "sizes": sizes,
            "stock": stock,
        }))
        .send()
        .await
        .expect("Failed to create product");
    expect_data(resp).await
}

async fn delete_product(admin: &Api, id: i64) {
    let resp = admin
        .delete(&format!("/api/products/{id}"))
        .send()
        .await
        .expect("Failed to delete product");
    expect_data(resp).await;
}

/// Current stock straight from the database path, bypassing the slug cache.
async fn live_stock(api: &Api, id: i64) -> i64 {
    let resp = api
        .get(&format!("/api/products/{id}"))
        .send()
        .await
        .expect("Failed to fetch product");
    expect_data(resp).await["stock"]
        .as_i64()
        .expect("stock missing")
}

fn shipping_info() -> Value {
    json!({
        "name": "Asha Rao",
        "phone": "+91 98200 11223",
        "addressLine": "14 Lotus Residency, MG Road",
        "city": "Pune",
        "state": "Maharashtra",
        "postalCode": "411001",
    })
}

/// Place an order from the caller's current cart and return it.
async fn place_order(api: &Api, extra: Value) -> Value {
    let mut body = json!({
        "shippingInfo": shipping_info(),
        "gateway": "razorpay",
    });
    if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            body.insert(key.clone(), value.clone());
        }
    }

    let resp = api
        .post("/api/orders")
        .json(&body)
        .send()
        .await
        .expect("Failed to place order");
    expect_data(resp).await
}

// ============================================================================
// Cart Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_cart_requires_auth() {
    let resp = Api::new()
        .get("/api/cart")
        .send()
        .await
        .expect("Failed to fetch cart");
    let (status, _) = expect_failure(resp).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running API server and database access"]
async fn test_cart_roundtrip() {
    let Some(admin) = admin().await else {
        return; // No database URL configured, skip
    };
    let product = create_product(
        &admin,
        &format!("Cart Tee {}", suffix()),
        "1299.00",
        &["S", "M"],
        10,
    )
    .await;
    let product_id = product["id"].as_i64().expect("product id missing");

    let mut shopper = Api::new();
    shopper.register().await;

    // Sized products insist on a size.
    let resp = shopper
        .post("/api/cart/items")
        .json(&json!({ "productId": product_id, "quantity": 1 }))
        .send()
        .await
        .expect("Failed to add item");
    let (status, message) = expect_failure(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(message.contains("size must be chosen"), "got: {message}");

    // And the size has to be one the product actually carries.
    let resp = shopper
        .post("/api/cart/items")
        .json(&json!({ "productId": product_id, "size": "XXL", "quantity": 1 }))
        .send()
        .await
        .expect("Failed to add item");
    let (status, message) = expect_failure(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(message.contains("not available"), "got: {message}");

    // A valid add returns the hydrated cart.
    let resp = shopper
        .post("/api/cart/items")
        .json(&json!({ "productId": product_id, "size": "M", "quantity": 2 }))
        .send()
        .await
        .expect("Failed to add item");
    let cart = expect_data(resp).await;
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(cart["items"][0]["quantity"], json!(2));
    assert_eq!(cart["items"][0]["size"], json!("M"));
    assert_eq!(money(&cart["items"][0]["lineTotal"]), money(&json!("2598.00")));
    assert_eq!(money(&cart["subtotal"]), money(&json!("2598.00")));

    // Adding the same line again merges quantities.
    let resp = shopper
        .post("/api/cart/items")
        .json(&json!({ "productId": product_id, "size": "M", "quantity": 1 }))
        .send()
        .await
        .expect("Failed to add item");
    let cart = expect_data(resp).await;
    assert_eq!(cart["items"][0]["quantity"], json!(3));

    // Setting beyond the shelf clamps to stock.
    let resp = shopper
        .put("/api/cart/items")
        .json(&json!({ "productId": product_id, "size": "M", "quantity": 25 }))
        .send()
        .await
        .expect("Failed to set quantity");
    let cart = expect_data(resp).await;
    assert_eq!(cart["items"][0]["quantity"], json!(10));

    // Zero removes the line.
    let resp = shopper
        .put("/api/cart/items")
        .json(&json!({ "productId": product_id, "size": "M", "quantity": 0 }))
        .send()
        .await
        .expect("Failed to set quantity");
    let cart = expect_data(resp).await;
    assert_eq!(cart["items"], json!([]));
    assert_eq!(money(&cart["subtotal"]), Decimal::ZERO);

    // Removing a line that is not there is a 404.
    let resp = shopper
        .delete("/api/cart/items")
        .json(&json!({ "productId": product_id, "size": "M" }))
        .send()
        .await
        .expect("Failed to remove item");
    let (status, _) = expect_failure(resp).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    delete_product(&admin, product_id).await;
}

#[tokio::test]
#[ignore = "Requires running API server and database access"]
async fn test_cart_rejects_out_of_stock() {
    let Some(admin) = admin().await else {
        return; // No database URL configured, skip
    };
    let product = create_product(
        &admin,
        &format!("Sold Out Tee {}", suffix()),
        "899.00",
        &[],
        0,
    )
    .await;
    let product_id = product["id"].as_i64().expect("product id missing");

    let mut shopper = Api::new();
    shopper.register().await;

    let resp = shopper
        .post("/api/cart/items")
        .json(&json!({ "productId": product_id, "quantity": 1 }))
        .send()
        .await
        .expect("Failed to add item");
    let (status, message) = expect_failure(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(message.contains("out of stock"), "got: {message}");

    delete_product(&admin, product_id).await;
}

// ============================================================================
// Checkout Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and database access"]
async fn test_checkout_happy_path() {
    let Some(admin) = admin().await else {
        return; // No database URL configured, skip
    };
    let product = create_product(
        &admin,
        &format!("Checkout Tee {}", suffix()),
        "1299.00",
        &["S", "M"],
        10,
    )
    .await;
    let product_id = product["id"].as_i64().expect("product id missing");

    let mut shopper = Api::new();
    let credentials = shopper.register().await;

    let resp = shopper
        .post("/api/cart/items")
        .json(&json!({ "productId": product_id, "size": "M", "quantity": 2 }))
        .send()
        .await
        .expect("Failed to add item");
    expect_data(resp).await;

    let order = place_order(&shopper, json!({ "notes": "Ring the bell twice" })).await;

    let order_id = order["id"].as_str().expect("order id missing").to_string();
    let order_number = order["orderNumber"]
        .as_str()
        .expect("order number missing")
        .to_string();
    assert!(order_number.starts_with("MG-"), "got: {order_number}");
    assert_eq!(order["status"], json!("placed"));
    assert_eq!(order["paymentStatus"], json!("created"));
    assert_eq!(order["paymentGateway"], json!("razorpay"));
    assert_eq!(order["paymentRef"], Value::Null);
    assert_eq!(order["customerEmail"], json!(credentials.email));
    assert_eq!(order["shippingInfo"]["city"], json!("Pune"));
    assert_eq!(order["notes"], json!("Ring the bell twice"));

    // One snapshotted line, priced at purchase time.
    let items = order["cartItems"].as_array().expect("cartItems missing");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], json!(2));
    assert_eq!(money(&items[0]["unitPrice"]), money(&json!("1299.00")));

    // Totals hold together whatever the shipping configuration is.
    let subtotal = money(&order["subtotal"]);
    let discount = money(&order["discount"]);
    let fee = money(&order["shippingFee"]);
    assert_eq!(subtotal, money(&json!("2598.00")));
    assert_eq!(discount, Decimal::ZERO);
    assert_eq!(money(&order["total"]), subtotal - discount + fee);

    // Placement emptied the cart and reserved the stock.
    let resp = shopper
        .get("/api/cart")
        .send()
        .await
        .expect("Failed to fetch cart");
    let cart = expect_data(resp).await;
    assert_eq!(cart["items"], json!([]));
    assert_eq!(live_stock(&shopper, product_id).await, 8);

    // The order shows up in the customer's history and detail view.
    let resp = shopper
        .get("/api/orders")
        .send()
        .await
        .expect("Failed to list orders");
    let history = expect_data(resp).await;
    let found = history["items"]
        .as_array()
        .expect("items missing")
        .iter()
        .any(|o| o["orderNumber"] == json!(order_number));
    assert!(found, "order missing from history");

    let resp = shopper
        .get(&format!("/api/orders/{order_id}"))
        .send()
        .await
        .expect("Failed to fetch order");
    let detail = expect_data(resp).await;
    assert_eq!(detail["orderNumber"], json!(order_number));

    // Someone else's order id reads as missing, not forbidden.
    let mut stranger = Api::new();
    stranger.register().await;
    let resp = stranger
        .get(&format!("/api/orders/{order_id}"))
        .send()
        .await
        .expect("Failed to fetch order");
    let (status, message) = expect_failure(resp).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(message, "order not found");

    // Admins get the owning account inline.
    let resp = admin
        .get(&format!("/api/orders/{order_id}"))
        .send()
        .await
        .expect("Failed to fetch order");
    let detail = expect_data(resp).await;
    assert_eq!(detail["user"]["email"], json!(credentials.email));

    delete_product(&admin, product_id).await;
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_checkout_rejects_empty_cart() {
    let mut shopper = Api::new();
    shopper.register().await;

    let resp = shopper
        .post("/api/orders")
        .json(&json!({ "shippingInfo": shipping_info(), "gateway": "razorpay" }))
        .send()
        .await
        .expect("Failed to place order");
    let (status, message) = expect_failure(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "cart is empty");
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_checkout_requires_complete_shipping_info() {
    let mut shopper = Api::new();
    shopper.register().await;

    // postalCode missing entirely
    let resp = shopper
        .post("/api/orders")
        .json(&json!({
            "shippingInfo": {
                "name": "Asha Rao",
                "phone": "+91 98200 11223",
                "addressLine": "14 Lotus Residency",
                "city": "Pune",
                "state": "Maharashtra",
            },
            "gateway": "razorpay",
        }))
        .send()
        .await
        .expect("Failed to place order");
    let (status, _) = expect_failure(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Order Management Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and database access"]
async fn test_order_status_transitions() {
    let Some(admin) = admin().await else {
        return; // No database URL configured, skip
    };
    let product = create_product(
        &admin,
        &format!("Status Tee {}", suffix()),
        "999.00",
        &[],
        5,
    )
    .await;
    let product_id = product["id"].as_i64().expect("product id missing");

    let mut shopper = Api::new();
    shopper.register().await;
    let resp = shopper
        .post("/api/cart/items")
        .json(&json!({ "productId": product_id, "quantity": 1 }))
        .send()
        .await
        .expect("Failed to add item");
    expect_data(resp).await;
    let order = place_order(&shopper, json!({})).await;
    let order_id = order["id"].as_str().expect("order id missing").to_string();
    let order_number = order["orderNumber"]
        .as_str()
        .expect("order number missing")
        .to_string();

    // Customers cannot move statuses.
    let resp = shopper
        .put(&format!("/api/orders/{order_id}/status"))
        .json(&json!({ "status": "confirmed" }))
        .send()
        .await
        .expect("Failed to update status");
    let (status, _) = expect_failure(resp).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // placed -> confirmed is legal.
    let resp = admin
        .put(&format!("/api/orders/{order_id}/status"))
        .json(&json!({ "status": "confirmed" }))
        .send()
        .await
        .expect("Failed to update status");
    let updated = expect_data(resp).await;
    assert_eq!(updated["status"], json!("confirmed"));

    // confirmed -> delivered skips shipped and is rejected.
    let resp = admin
        .put(&format!("/api/orders/{order_id}/status"))
        .json(&json!({ "status": "delivered" }))
        .send()
        .await
        .expect("Failed to update status");
    let (status, message) = expect_failure(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "cannot move order from confirmed to delivered");

    // The full legal path runs to the terminal state.
    for next in ["shipped", "delivered"] {
        let resp = admin
            .put(&format!("/api/orders/{order_id}/status"))
            .json(&json!({ "status": next }))
            .send()
            .await
            .expect("Failed to update status");
        let updated = expect_data(resp).await;
        assert_eq!(updated["status"], json!(next));
    }

    let resp = admin
        .put(&format!("/api/orders/{order_id}/status"))
        .json(&json!({ "status": "cancelled" }))
        .send()
        .await
        .expect("Failed to update status");
    let (status, _) = expect_failure(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Admin notes are editable after the fact; blanks clear them.
    let resp = admin
        .put(&format!("/api/orders/{order_id}/notes"))
        .json(&json!({ "notes": "Gift wrap requested" }))
        .send()
        .await
        .expect("Failed to update notes");
    let updated = expect_data(resp).await;
    assert_eq!(updated["notes"], json!("Gift wrap requested"));

    let resp = admin
        .put(&format!("/api/orders/{order_id}/notes"))
        .json(&json!({ "notes": "   " }))
        .send()
        .await
        .expect("Failed to update notes");
    let updated = expect_data(resp).await;
    assert_eq!(updated["notes"], Value::Null);

    // The admin listing can find the order by its number.
    let resp = admin
        .get(&format!("/api/orders/admin/all?q={order_number}"))
        .send()
        .await
        .expect("Failed to list orders");
    let data = expect_data(resp).await;
    let found = data["items"]
        .as_array()
        .expect("items missing")
        .iter()
        .any(|o| o["orderNumber"] == json!(order_number));
    assert!(found, "order missing from admin listing");

    delete_product(&admin, product_id).await;
}

#[tokio::test]
#[ignore = "Requires running API server and database access"]
async fn test_cancellation_restores_stock() {
    let Some(admin) = admin().await else {
        return; // No database URL configured, skip
    };
    let product = create_product(
        &admin,
        &format!("Restock Tee {}", suffix()),
        "799.00",
        &[],
        5,
    )
    .await;
    let product_id = product["id"].as_i64().expect("product id missing");

    let mut shopper = Api::new();
    shopper.register().await;
    let resp = shopper
        .post("/api/cart/items")
        .json(&json!({ "productId": product_id, "quantity": 2 }))
        .send()
        .await
        .expect("Failed to add item");
    expect_data(resp).await;
    let order = place_order(&shopper, json!({})).await;
    let order_id = order["id"].as_str().expect("order id missing");

    assert_eq!(live_stock(&shopper, product_id).await, 3);

    let resp = admin
        .put(&format!("/api/orders/{order_id}/status"))
        .json(&json!({ "status": "cancelled" }))
        .send()
        .await
        .expect("Failed to cancel order");
    let cancelled = expect_data(resp).await;
    assert_eq!(cancelled["status"], json!("cancelled"));

    assert_eq!(live_stock(&shopper, product_id).await, 5);

    // Cancelled is terminal; the quantities must not restore twice.
    let resp = admin
        .put(&format!("/api/orders/{order_id}/status"))
        .json(&json!({ "status": "cancelled" }))
        .send()
        .await
        .expect("Failed to cancel order");
    let (status, _) = expect_failure(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(live_stock(&shopper, product_id).await, 5);

    delete_product(&admin, product_id).await;
}

// ============================================================================
// Coupon Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and database access"]
async fn test_coupon_preview_and_redemption() {
    let Some(admin) = admin().await else {
        return; // No database URL configured, skip
    };
    let code = format!("IT{}", suffix().to_uppercase());
    let resp = admin
        .post("/api/coupons")
        .json(&json!({
            "code": code,
            "kind": "percent",
            "value": "10",
            "minOrderTotal": "500",
        }))
        .send()
        .await
        .expect("Failed to create coupon");
    let coupon = expect_data(resp).await;
    let coupon_id = coupon["id"].as_i64().expect("coupon id missing");
    assert_eq!(coupon["code"], json!(code));

    let product = create_product(
        &admin,
        &format!("Coupon Tee {}", suffix()),
        "1299.00",
        &[],
        10,
    )
    .await;
    let product_id = product["id"].as_i64().expect("product id missing");

    let mut shopper = Api::new();
    shopper.register().await;

    // Nothing to discount yet.
    let resp = shopper
        .post("/api/coupons/apply")
        .json(&json!({ "code": code }))
        .send()
        .await
        .expect("Failed to apply coupon");
    let (status, message) = expect_failure(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "cart is empty");

    let resp = shopper
        .post("/api/cart/items")
        .json(&json!({ "productId": product_id, "quantity": 2 }))
        .send()
        .await
        .expect("Failed to add item");
    expect_data(resp).await;

    // A code that does not exist.
    let resp = shopper
        .post("/api/coupons/apply")
        .json(&json!({ "code": "DEFINITELY-NOT-A-CODE" }))
        .send()
        .await
        .expect("Failed to apply coupon");
    let (status, message) = expect_failure(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "invalid coupon code");

    // The preview prices the current cart without consuming a use.
    let resp = shopper
        .post("/api/coupons/apply")
        .json(&json!({ "code": code }))
        .send()
        .await
        .expect("Failed to apply coupon");
    let preview = expect_data(resp).await;
    assert_eq!(preview["code"], json!(code));
    assert_eq!(preview["kind"], json!("percent"));
    assert_eq!(money(&preview["subtotal"]), money(&json!("2598.00")));
    assert_eq!(money(&preview["discount"]), money(&json!("259.80")));

    // Redeeming at checkout carries the same discount into the order.
    let order = place_order(&shopper, json!({ "couponCode": code })).await;
    assert_eq!(order["couponCode"], json!(code));
    let subtotal = money(&order["subtotal"]);
    let discount = money(&order["discount"]);
    let fee = money(&order["shippingFee"]);
    assert_eq!(discount, money(&json!("259.80")));
    assert_eq!(money(&order["total"]), subtotal - discount + fee);

    delete_product(&admin, product_id).await;
    let resp = admin
        .delete(&format!("/api/coupons/{coupon_id}"))
        .send()
        .await
        .expect("Failed to delete coupon");
    expect_data(resp).await;
}

#[tokio::test]
#[ignore = "Requires running API server and database access"]
async fn test_coupon_below_minimum_is_rejected() {
    let Some(admin) = admin().await else {
        return; // No database URL configured, skip
    };
    let code = format!("MIN{}", suffix().to_uppercase());
    let resp = admin
        .post("/api/coupons")
        .json(&json!({
            "code": code,
            "kind": "flat",
            "value": "100",
            "minOrderTotal": "99999",
        }))
        .send()
        .await
        .expect("Failed to create coupon");
    let coupon = expect_data(resp).await;
    let coupon_id = coupon["id"].as_i64().expect("coupon id missing");

    let product = create_product(
        &admin,
        &format!("Small Basket Tee {}", suffix()),
        "499.00",
        &[],
        5,
    )
    .await;
    let product_id = product["id"].as_i64().expect("product id missing");

    let mut shopper = Api::new();
    shopper.register().await;
    let resp = shopper
        .post("/api/cart/items")
        .json(&json!({ "productId": product_id, "quantity": 1 }))
        .send()
        .await
        .expect("Failed to add item");
    expect_data(resp).await;

    let resp = shopper
        .post("/api/coupons/apply")
        .json(&json!({ "code": code }))
        .send()
        .await
        .expect("Failed to apply coupon");
    let (status, message) = expect_failure(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(message.contains("order must be at least"), "got: {message}");

    delete_product(&admin, product_id).await;
    let resp = admin
        .delete(&format!("/api/coupons/{coupon_id}"))
        .send()
        .await
        .expect("Failed to delete coupon");
    expect_data(resp).await;
}

#[tokio::test]
#[ignore = "Requires running API server and database access"]
async fn test_coupon_usage_limit_is_enforced() {
    let Some(admin) = admin().await else {
        return; // No database URL configured, skip
    };
    let code = format!("ONCE{}", suffix().to_uppercase());
    let resp = admin
        .post("/api/coupons")
        .json(&json!({
            "code": code,
            "kind": "flat",
            "value": "200",
            "usageLimit": 1,
        }))
        .send()
        .await
        .expect("Failed to create coupon");
    let coupon = expect_data(resp).await;
    let coupon_id = coupon["id"].as_i64().expect("coupon id missing");

    let product = create_product(
        &admin,
        &format!("Limited Tee {}", suffix()),
        "1499.00",
        &[],
        10,
    )
    .await;
    let product_id = product["id"].as_i64().expect("product id missing");

    // First redemption spends the only use.
    let mut first = Api::new();
    first.register().await;
    let resp = first
        .post("/api/cart/items")
        .json(&json!({ "productId": product_id, "quantity": 1 }))
        .send()
        .await
        .expect("Failed to add item");
    expect_data(resp).await;
    let order = place_order(&first, json!({ "couponCode": code })).await;
    assert_eq!(money(&order["discount"]), money(&json!("200.00")));

    // The second shopper finds it exhausted.
    let mut second = Api::new();
    second.register().await;
    let resp = second
        .post("/api/cart/items")
        .json(&json!({ "productId": product_id, "quantity": 1 }))
        .send()
        .await
        .expect("Failed to add item");
    expect_data(resp).await;

    let resp = second
        .post("/api/orders")
        .json(&json!({
            "shippingInfo": shipping_info(),
            "gateway": "razorpay",
            "couponCode": code,
        }))
        .send()
        .await
        .expect("Failed to place order");
    let (status, message) = expect_failure(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "coupon usage limit reached");

    delete_product(&admin, product_id).await;
    let resp = admin
        .delete(&format!("/api/coupons/{coupon_id}"))
        .send()
        .await
        .expect("Failed to delete coupon");
    expect_data(resp).await;
}
