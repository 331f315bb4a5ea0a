//! Stock ledger engines
//!
//! The ledger is the set of quantity fields on product documents. Every
//! mutation flows through one of the engines here:
//!
//! - [`resolver`] maps an order line to the ledger entries that must move
//! - [`deduction`] performs the all-or-nothing check-and-deduct at checkout
//! - [`reversal`] restocks on cancellation and re-deducts on reactivation
//! - [`propagator`] recomputes derived pack quantities after parent changes
//! - [`adjust`] applies audited manual stock corrections
//!
//! No other code path writes `stock` fields.

pub mod adjust;
pub mod deduction;
pub mod propagator;
pub mod resolver;
pub mod reversal;

pub use adjust::{StockAdjustment, adjust_stock};
pub use deduction::{CheckoutLine, CheckoutRequest, DeductionEngine, DeductionOutcome};
pub use resolver::{ResolvedLine, resolve_line};
pub use reversal::ReversalEngine;

/// Attempts before an optimistic-conflict abort is surfaced to the caller
pub const RETRY_BUDGET: u32 = 5;

/// Base backoff between conflict retries
pub const RETRY_BACKOFF_MS: u64 = 10;
