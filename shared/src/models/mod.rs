//! Domain models shared across the workspace

pub mod order;
pub mod product;
pub mod stock_movement;

pub use order::{CustomerInfo, Order, OrderLine, OrderStatus, ResolvedTarget, SalesChannel};
pub use product::{Product, StockKind, UnitKind, Variant};
pub use stock_movement::{MovementType, StockMovement};
