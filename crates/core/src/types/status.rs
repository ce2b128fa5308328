//! Role and status enums shared across the API and CLI.
//!
//! These enums are stored as `TEXT` columns. The database layer converts
//! through [`std::str::FromStr`] so an unexpected value surfaces as a data
//! corruption error instead of a panic.

use serde::{Deserialize, Serialize};

/// Account role attached to every user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Regular shopper.
    #[default]
    Customer,
    /// Staff account with access to the admin surface.
    Admin,
}

impl UserRole {
    /// The role as its stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

/// Fulfillment state of an order.
///
/// Orders move forward through `Placed -> Confirmed -> Shipped -> Delivered`.
/// Cancellation is allowed only before shipment. [`OrderStatus::can_transition_to`]
/// is the single source of truth; the admin status endpoint rejects anything
/// the table does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order accepted and stock reserved.
    #[default]
    Placed,
    /// Payment confirmed or manually approved.
    Confirmed,
    /// Handed to the courier.
    Shipped,
    /// Delivered to the customer. Terminal.
    Delivered,
    /// Cancelled before shipment. Terminal, stock restored.
    Cancelled,
}

impl OrderStatus {
    /// The status as its stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Placed => "placed",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether a transition from `self` to `next` is legal.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Placed, Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(Self::Placed),
            "confirmed" => Ok(Self::Confirmed),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Payment state of an order, driven by gateway callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Gateway order created, customer not yet redirected.
    #[default]
    Created,
    /// Customer redirected, awaiting the gateway's verdict.
    Pending,
    /// Gateway confirmed the charge.
    Paid,
    /// Gateway rejected or the customer abandoned the charge.
    Failed,
    /// Charge returned to the customer outside this system.
    Refunded,
}

impl PaymentStatus {
    /// The status as its stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            _ => Err(format!("invalid payment status: {s}")),
        }
    }
}

/// The payment gateway an order was routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentGateway {
    Phonepe,
    Razorpay,
    Stripe,
}

impl PaymentGateway {
    /// The gateway as its stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Phonepe => "phonepe",
            Self::Razorpay => "razorpay",
            Self::Stripe => "stripe",
        }
    }
}

impl std::fmt::Display for PaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentGateway {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "phonepe" => Ok(Self::Phonepe),
            "razorpay" => Ok(Self::Razorpay),
            "stripe" => Ok(Self::Stripe),
            _ => Err(format!("invalid payment gateway: {s}")),
        }
    }
}
