//! Shared types for the bakery inventory core
//!
//! Domain models (products, orders, stock movements), the stock error
//! taxonomy, and quantity/ID utilities used by the server and its clients.

pub mod error;
pub mod models;
pub mod quantity;
pub mod util;

// Re-exports
pub use error::{StockError, StockResult};
pub use models::{
    CustomerInfo, MovementType, Order, OrderLine, OrderStatus, Product, ResolvedTarget,
    SalesChannel, StockKind, StockMovement, UnitKind, Variant,
};
pub use serde::{Deserialize, Serialize};
