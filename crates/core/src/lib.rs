//! Marigold Core - Shared domain types.
//!
//! This crate provides common types used across all Marigold components:
//! - `api` - Public REST backend for the storefront
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money amounts, emails,
//!   and the order/payment status machines

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
