//! Repository Module
//!
//! CRUD operations over the SurrealDB tables. All ledger quantity writes go
//! through [`crate::db::txn::LedgerTxn`] — repositories never mutate
//! `stock` fields outside a version-checked transaction.

pub mod order;
pub mod product;
pub mod stock_movement;

pub use order::OrderRepository;
pub use product::{ProductCreate, ProductRepository, ProductUpdate};
pub use stock_movement::StockMovementRepository;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Optimistic write conflict")]
    Conflict,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<surrealdb::Error> for RepoError {
    fn from(err: surrealdb::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Accept both `table:key` and bare `key` forms for record ids
pub fn strip_table_prefix<'a>(table: &str, id: &'a str) -> &'a str {
    id.strip_prefix(table)
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(id)
}

/// Base repository with database reference
#[derive(Clone)]
pub struct BaseRepository {
    db: Surreal<Db>,
}

impl BaseRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Surreal<Db> {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_only_matching_table_prefix() {
        assert_eq!(strip_table_prefix("product", "product:abc"), "abc");
        assert_eq!(strip_table_prefix("product", "abc"), "abc");
        assert_eq!(strip_table_prefix("product", "order:abc"), "order:abc");
        // Hyphenated keys keep their tail intact
        assert_eq!(strip_table_prefix("product", "product:bread-pack"), "bread-pack");
    }
}
