//! Order Repository
//!
//! Orders are created inside the deduction engine's ledger transaction;
//! this repository covers reads and status bookkeeping.

use shared::{Order, OrderStatus};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use super::{BaseRepository, RepoError, RepoResult, strip_table_prefix};

const ORDER_TABLE: &str = "order";

#[derive(Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// List orders, newest first
    pub async fn find_all(&self, limit: i64, offset: i64) -> RepoResult<Vec<Order>> {
        let orders: Vec<Order> = self
            .base
            .db()
            .query(
                "SELECT *, record::id(id) AS id FROM order \
                 ORDER BY created_at DESC LIMIT $limit START $offset",
            )
            .bind(("limit", limit))
            .bind(("offset", offset))
            .await?
            .take(0)?;
        Ok(orders)
    }

    /// Find order by id
    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Order>> {
        let key = strip_table_prefix(ORDER_TABLE, id).to_string();
        let order: Option<Order> = self
            .base
            .db()
            .query("SELECT *, record::id(id) AS id FROM ONLY type::thing('order', $key)")
            .bind(("key", key))
            .await?
            .take(0)?;
        Ok(order)
    }

    /// Persist a status transition only if the stored status still matches
    /// `expected`. Returns `None` when a concurrent writer transitioned the
    /// order first; the caller must re-read and decide again.
    pub async fn update_status_when(
        &self,
        id: &str,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> RepoResult<Option<Order>> {
        let key = strip_table_prefix(ORDER_TABLE, id).to_string();
        let orders: Vec<Order> = self
            .base
            .db()
            .query(
                "UPDATE type::thing('order', $key) SET status = $status \
                 WHERE status = $expected \
                 RETURN *, record::id(id) AS id",
            )
            .bind(("key", key))
            .bind(("expected", expected))
            .bind(("status", status))
            .await?
            .take(0)?;
        Ok(orders.into_iter().next())
    }

    /// Payment-approval webhook: flips visibility only, never touches stock
    pub async fn mark_payment_approved(&self, id: &str) -> RepoResult<Order> {
        let key = strip_table_prefix(ORDER_TABLE, id).to_string();
        let orders: Vec<Order> = self
            .base
            .db()
            .query(
                "UPDATE type::thing('order', $key) SET payment_approved = true \
                 RETURN *, record::id(id) AS id",
            )
            .bind(("key", key.clone()))
            .await?
            .take(0)?;
        orders
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::NotFound(format!("Order {} not found", key)))
    }
}
