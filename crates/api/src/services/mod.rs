//! Business logic that sits between the HTTP handlers and the repositories.

pub mod auth;
pub mod checkout;
pub mod payments;
