//! Stock Movement Repository
//!
//! Read side of the audit trail. Movements are appended inside ledger
//! transactions and are never updated or deleted.

use shared::StockMovement;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use super::{BaseRepository, RepoResult, strip_table_prefix};

const PRODUCT_TABLE: &str = "product";

#[derive(Clone)]
pub struct StockMovementRepository {
    base: BaseRepository,
}

impl StockMovementRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// List movements, newest first
    pub async fn find_all(&self, limit: i64, offset: i64) -> RepoResult<Vec<StockMovement>> {
        let movements: Vec<StockMovement> = self
            .base
            .db()
            .query(
                "SELECT *, record::id(id) AS id FROM stock_movement \
                 ORDER BY date DESC LIMIT $limit START $offset",
            )
            .bind(("limit", limit))
            .bind(("offset", offset))
            .await?
            .take(0)?;
        Ok(movements)
    }

    /// Movement history for one product, newest first
    pub async fn find_by_product(&self, product_id: &str) -> RepoResult<Vec<StockMovement>> {
        let key = strip_table_prefix(PRODUCT_TABLE, product_id).to_string();
        let movements: Vec<StockMovement> = self
            .base
            .db()
            .query(
                "SELECT *, record::id(id) AS id FROM stock_movement \
                 WHERE product_id = $key ORDER BY date DESC",
            )
            .bind(("key", key))
            .await?
            .take(0)?;
        Ok(movements)
    }
}
