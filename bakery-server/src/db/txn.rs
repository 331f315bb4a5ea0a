//! Ledger transaction builder
//!
//! Composes a single SurrealQL transaction out of version-checked product
//! writes, an optional order creation, and append-only audit movements, so a
//! checkout commits its entire effect or none of it.
//!
//! Every product write is guarded by an optimistic version check: the
//! transaction re-reads the stored `version` and `THROW`s if it no longer
//! matches the one the caller read, which cancels the whole transaction.
//! Callers re-read and retry on [`TxnError::Conflict`].

use serde_json::Value;
use shared::{Order, Product, StockMovement};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

/// Marker thrown inside the transaction on a version mismatch
const VERSION_CONFLICT: &str = "ledger-version-conflict";

/// Outcome of a ledger transaction commit
#[derive(Debug, thiserror::Error)]
pub enum TxnError {
    /// A concurrent writer got there first; nothing was written
    #[error("ledger version conflict")]
    Conflict,

    #[error("transaction failed: {0}")]
    Db(String),
}

/// One atomic check-and-write against the ledger store
pub struct LedgerTxn {
    statements: Vec<String>,
    binds: Vec<(String, Value)>,
    product_count: usize,
    movement_count: usize,
}

impl LedgerTxn {
    pub fn new() -> Self {
        Self {
            statements: Vec::new(),
            binds: Vec::new(),
            product_count: 0,
            movement_count: 0,
        }
    }

    /// Stage a version-checked full-document product write.
    ///
    /// `product.version` must be the version that was read; the staged
    /// document is written with the version already bumped.
    pub fn cas_product(&mut self, product: &Product) -> Result<(), TxnError> {
        let key = product
            .id
            .clone()
            .ok_or_else(|| TxnError::Db("product without id in ledger write".into()))?;
        let expected = product.version;

        let mut bumped = product.clone();
        bumped.version = expected + 1;
        let doc = content_without_id(&bumped)?;

        let i = self.product_count;
        self.statements.push(format!(
            "LET $cur{i} = (SELECT VALUE version FROM ONLY type::thing('product', $pk{i}));\n\
             IF $cur{i} != $pv{i} {{ THROW '{VERSION_CONFLICT}' }};\n\
             UPDATE type::thing('product', $pk{i}) CONTENT $pd{i};"
        ));
        self.binds.push((format!("pk{i}"), Value::String(key)));
        self.binds.push((format!("pv{i}"), Value::from(expected)));
        self.binds.push((format!("pd{i}"), doc));
        self.product_count += 1;
        Ok(())
    }

    /// Stage the order record; committed atomically with the ledger writes
    pub fn create_order(&mut self, order: &Order) -> Result<(), TxnError> {
        let key = order
            .id
            .clone()
            .ok_or_else(|| TxnError::Db("order without id in ledger write".into()))?;
        let doc = content_without_id(order)?;
        self.statements
            .push("CREATE type::thing('order', $ok) CONTENT $od;".to_string());
        self.binds.push(("ok".to_string(), Value::String(key)));
        self.binds.push(("od".to_string(), doc));
        Ok(())
    }

    /// Stage one append-only audit movement
    pub fn create_movement(&mut self, movement: &StockMovement) -> Result<(), TxnError> {
        let key = movement
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let mut mv = movement.clone();
        mv.id = Some(key.clone());
        let doc = content_without_id(&mv)?;

        let j = self.movement_count;
        self.statements
            .push(format!("CREATE type::thing('stock_movement', $mk{j}) CONTENT $md{j};"));
        self.binds.push((format!("mk{j}"), Value::String(key)));
        self.binds.push((format!("md{j}"), doc));
        self.movement_count += 1;
        Ok(())
    }

    /// Execute as one transaction. On [`TxnError::Conflict`] nothing was
    /// written and the caller may re-read and retry.
    pub async fn commit(self, db: &Surreal<Db>) -> Result<(), TxnError> {
        let sql = format!(
            "BEGIN TRANSACTION;\n{}\nCOMMIT TRANSACTION;",
            self.statements.join("\n")
        );

        let mut query = db.query(sql);
        for (name, value) in self.binds {
            query = query.bind((name, value));
        }

        let mut response = query.await.map_err(classify)?;
        let errors = response.take_errors();
        if errors.is_empty() {
            return Ok(());
        }
        let messages: Vec<String> = errors.into_values().map(|e| e.to_string()).collect();
        if messages
            .iter()
            .any(|m| m.contains(VERSION_CONFLICT) || is_engine_retry(m))
        {
            return Err(TxnError::Conflict);
        }
        // Statements after the aborting one all carry the generic
        // failed-transaction text; surface the specific error when present
        let msg = messages
            .iter()
            .find(|m| !m.contains("failed transaction"))
            .or_else(|| messages.first())
            .cloned()
            .unwrap_or_default();
        Err(TxnError::Db(msg))
    }
}

impl Default for LedgerTxn {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize an entity for `CONTENT`, dropping the client-side `id` field
/// (the record id is carried by `type::thing`)
fn content_without_id<T: serde::Serialize>(entity: &T) -> Result<Value, TxnError> {
    let mut value = serde_json::to_value(entity).map_err(|e| TxnError::Db(e.to_string()))?;
    if let Some(obj) = value.as_object_mut() {
        obj.remove("id");
    }
    Ok(value)
}

/// The embedded engines abort an optimistic transaction with a documented
/// retryable error ("read or write conflict"); our own version THROW is
/// matched per statement against [`VERSION_CONFLICT`] instead.
fn is_engine_retry(msg: &str) -> bool {
    msg.contains("read or write conflict")
}

fn classify(err: surrealdb::Error) -> TxnError {
    let msg = err.to_string();
    if is_engine_retry(&msg) {
        TxnError::Conflict
    } else {
        TxnError::Db(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::{MovementType, StockKind};

    use crate::db::DbService;
    use crate::db::repository::ProductRepository;

    fn product(key: &str, quantity: Decimal) -> Product {
        let mut p = Product::new(key.to_string(), Decimal::ONE, StockKind::simple(quantity));
        p.id = Some(key.to_string());
        p
    }

    async fn seed(repo: &ProductRepository, p: &Product) {
        repo.insert_raw(p).await.unwrap();
    }

    #[tokio::test]
    async fn commit_writes_product_and_movement() {
        let svc = DbService::open_memory().await.unwrap();
        let repo = ProductRepository::new(svc.db.clone());
        let mut p = product("flour", Decimal::from(20));
        seed(&repo, &p).await;

        p.set_flat_quantity(Decimal::from(14));
        let mut txn = LedgerTxn::new();
        txn.cas_product(&p).unwrap();
        txn.create_movement(&StockMovement::new(
            "flour",
            "flour",
            MovementType::Out,
            Decimal::from(6),
            "web sale",
        ))
        .unwrap();
        txn.commit(&svc.db).await.unwrap();

        let stored = repo.find_by_id("flour").await.unwrap().unwrap();
        assert_eq!(stored.stock.flat_quantity(), Some(Decimal::from(14)));
        assert_eq!(stored.version, p.version + 1);
    }

    #[tokio::test]
    async fn stale_version_aborts_everything() {
        let svc = DbService::open_memory().await.unwrap();
        let repo = ProductRepository::new(svc.db.clone());
        let p = product("flour", Decimal::from(20));
        seed(&repo, &p).await;

        // Another writer bumps the version first
        let mut winner = repo.find_by_id("flour").await.unwrap().unwrap();
        winner.set_flat_quantity(Decimal::from(19));
        let mut txn = LedgerTxn::new();
        txn.cas_product(&winner).unwrap();
        txn.commit(&svc.db).await.unwrap();

        // The stale writer must fail without writing its movement
        let mut stale = p.clone();
        stale.set_flat_quantity(Decimal::from(10));
        let mut txn = LedgerTxn::new();
        txn.cas_product(&stale).unwrap();
        txn.create_movement(&StockMovement::new(
            "flour",
            "flour",
            MovementType::Out,
            Decimal::TEN,
            "web sale",
        ))
        .unwrap();
        let result = txn.commit(&svc.db).await;
        assert!(matches!(result, Err(TxnError::Conflict)));

        let stored = repo.find_by_id("flour").await.unwrap().unwrap();
        assert_eq!(stored.stock.flat_quantity(), Some(Decimal::from(19)));

        let movements = crate::db::repository::StockMovementRepository::new(svc.db.clone())
            .find_all(10, 0)
            .await
            .unwrap();
        assert_eq!(movements.len(), 0, "the loser's movement was rolled back");
    }
}
