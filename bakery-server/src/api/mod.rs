//! API route modules
//!
//! # Structure
//!
//! - [`health`] — liveness check
//! - [`products`] — catalog management and manual stock adjustment
//! - [`checkout`] — order creation (web storefront and POS)
//! - [`orders`] — order listing and status changes
//! - [`stock_movements`] — read-only audit trail

pub mod checkout;
pub mod health;
pub mod orders;
pub mod products;
pub mod stock_movements;

// Re-export common types for handlers
pub use crate::utils::{AppResponse, AppResult};
