//! Stock error taxonomy
//!
//! Typed errors for the ledger engines. The distinction that matters to
//! callers is `InsufficientStock` (a real business answer with the exact
//! shortfall, never retried) versus `TransactionConflict` (transient, retry).

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors surfaced by the deduction/reversal/propagation engines
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StockError {
    /// A line asked for more than the ledger holds. Rejects the whole order;
    /// carries enough detail for the UI to name the product and the real
    /// available quantity.
    #[error("insufficient stock for '{name}': requested {requested}, available {available}")]
    InsufficientStock {
        line_id: String,
        name: String,
        requested: Decimal,
        available: Decimal,
    },

    /// The line's product id has no ledger entry.
    #[error("product not found: {0}")]
    ProductNotFound(String),

    /// A variant name was expected but is not in the product's variant list.
    #[error("variant '{variant}' not found on product {product_id}")]
    VariantNotFound { product_id: String, variant: String },

    /// Optimistic-concurrency conflict that survived the retry budget.
    /// Nothing was written; the caller may simply try again.
    #[error("concurrent stock update conflict, try again")]
    TransactionConflict,

    /// Malformed input (non-positive quantity, fractional unit count, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Store-level failure outside the taxonomy above.
    #[error("store error: {0}")]
    Store(String),
}

impl StockError {
    /// Collapse not-found resolution failures into the insufficient-stock
    /// shape with `available = 0`: a vanished product is simply not sellable,
    /// and the UI treats both cases identically.
    pub fn into_unsellable(self, line_id: &str, name: &str, requested: Decimal) -> StockError {
        match self {
            StockError::ProductNotFound(_) | StockError::VariantNotFound { .. } => {
                StockError::InsufficientStock {
                    line_id: line_id.to_string(),
                    name: name.to_string(),
                    requested,
                    available: Decimal::ZERO,
                }
            }
            other => other,
        }
    }

    /// True for errors the deduction engine may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, StockError::TransactionConflict)
    }
}

/// Result type for stock operations
pub type StockResult<T> = Result<T, StockError>;
