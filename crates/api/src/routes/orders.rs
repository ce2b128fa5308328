//! Order routes: checkout, customer order history, and admin management.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use marigold_core::{OrderStatus, PaymentStatus, UserId};

use crate::db::Page;
use crate::db::orders::{self, Order, OrderFilter};
use crate::db::users::{self, User};
use crate::error::{ApiJson, ApiPath, ApiQuery, ApiResponse, AppError, Paged, ok};
use crate::middleware::auth::{CurrentUser, RequireAdmin};
use crate::routes::PageQuery;
use crate::services::checkout::{self, PlaceOrderRequest};
use crate::state::AppState;

/// `POST /api/orders`
///
/// Places an order from the caller's cart. Pricing, stock reservation, and
/// coupon redemption all happen inside [`checkout::place_order`].
pub async fn place(
    State(state): State<AppState>,
    caller: CurrentUser,
    ApiJson(body): ApiJson<PlaceOrderRequest>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let user = users::find_by_id(state.pool(), caller.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".to_string()))?;

    let order = checkout::place_order(state.pool(), &state.config().shipping, &user, body).await?;
    Ok(ok(order))
}

/// `GET /api/orders`
pub async fn list_mine(
    State(state): State<AppState>,
    caller: CurrentUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<ApiResponse<Paged<Order>>>, AppError> {
    let page = query.clamped();
    let items = orders::list_for_user(state.pool(), caller.user_id, page).await?;
    let total = orders::count_for_user(state.pool(), caller.user_id).await?;
    Ok(ok(Paged::new(items, page, total)))
}

/// Query string for `GET /api/orders/admin/all`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminListQuery {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// Matches order number or customer email.
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// `GET /api/orders/admin/all` (admin)
pub async fn admin_list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiQuery(query): ApiQuery<AdminListQuery>,
) -> Result<Json<ApiResponse<Paged<Order>>>, AppError> {
    let page = Page::clamped(query.page, query.per_page);
    let filter = OrderFilter {
        status: query.status,
        payment_status: query.payment_status,
        search: query.q.filter(|q| !q.trim().is_empty()),
    };

    let items = orders::list_all(state.pool(), &filter, page).await?;
    let total = orders::count_all(state.pool(), &filter).await?;
    Ok(ok(Paged::new(items, page, total)))
}

/// The slice of an account shown next to an order in the admin panel.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email.into_inner(),
        }
    }
}

/// An order plus its owning account, for admin detail views.
#[derive(Debug, Serialize)]
pub struct AdminOrderView {
    #[serde(flatten)]
    pub order: Order,
    pub user: Option<UserSummary>,
}

/// `GET /api/orders/{id}`
///
/// Customers see their own orders; admins see any order with the owning
/// account attached. A foreign order id gets a 404 rather than a 403 so
/// the response does not confirm the order exists.
pub async fn show(
    State(state): State<AppState>,
    caller: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    let order = orders::find_by_id(state.pool(), id)
        .await?
        .ok_or_else(|| AppError::not_found("order"))?;

    if caller.is_admin() {
        let user = match order.user_id {
            Some(user_id) => users::find_by_id(state.pool(), user_id).await?,
            None => None,
        };
        let view = AdminOrderView {
            order,
            user: user.map(UserSummary::from),
        };
        return Ok(ok(view).into_response());
    }

    if order.user_id != Some(caller.user_id) {
        return Err(AppError::not_found("order"));
    }
    Ok(ok(order).into_response())
}

/// Body for `PUT /api/orders/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

/// `PUT /api/orders/{id}/status` (admin)
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let order = checkout::update_order_status(state.pool(), id, body.status).await?;
    Ok(ok(order))
}

/// Body for `PUT /api/orders/{id}/notes`.
#[derive(Debug, Deserialize)]
pub struct NotesRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

/// `PUT /api/orders/{id}/notes` (admin)
pub async fn update_notes(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<NotesRequest>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let notes = body
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|notes| !notes.is_empty());
    let order = orders::update_notes(state.pool(), id, notes).await?;
    Ok(ok(order))
}
