//! Child-Sync Propagator
//!
//! Keeps derived pack quantities consistent with their parent's flat stock.
//! Runs after any committed parent change (checkout, reversal, manual
//! adjustment). Propagation is a projection, not stock movement: it writes
//! no audit entries and is idempotent, so re-running it after a partial
//! failure converges. Failures are logged and never surfaced to the caller;
//! the committed parent change stands either way.

use rust_decimal::Decimal;
use shared::quantity;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use super::{RETRY_BACKOFF_MS, RETRY_BUDGET};
use crate::db::repository::ProductRepository;
use crate::db::txn::{LedgerTxn, TxnError};

/// Re-project every dependent of `parent_id` from the parent's new quantity
pub async fn propagate(db: &Surreal<Db>, parent_id: &str, new_parent_quantity: Decimal) {
    let repo = ProductRepository::new(db.clone());
    let dependents = match repo.find_dependents(parent_id).await {
        Ok(deps) => deps,
        Err(e) => {
            tracing::error!(parent_id = %parent_id, error = %e, "child-sync: dependents lookup failed");
            return;
        }
    };

    for dependent in dependents {
        let Some(child_id) = dependent.id.clone() else {
            continue;
        };
        if let Err(e) = sync_child(db, &repo, &child_id, new_parent_quantity).await {
            tracing::error!(
                parent_id = %parent_id,
                child_id = %child_id,
                error = %e,
                "child-sync: projection write failed"
            );
        }
    }
}

/// Propagate a batch of parent updates, as produced by a deduction outcome
pub async fn propagate_all(db: &Surreal<Db>, updated_parents: &[(String, Decimal)]) {
    for (parent_id, new_quantity) in updated_parents {
        propagate(db, parent_id, *new_quantity).await;
    }
}

/// CAS-write one child's projection, re-reading on conflict
async fn sync_child(
    db: &Surreal<Db>,
    repo: &ProductRepository,
    child_id: &str,
    parent_quantity: Decimal,
) -> Result<(), TxnError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let Some(mut child) = repo
            .find_by_id(child_id)
            .await
            .map_err(|e| TxnError::Db(e.to_string()))?
        else {
            // Deleted between lookup and sync; nothing to project
            return Ok(());
        };
        let ratio = match &child.stock {
            shared::StockKind::Derived { units_to_deduct, .. } => *units_to_deduct,
            _ => return Ok(()),
        };

        let projected = quantity::derived_quantity(parent_quantity, ratio);
        if child.stock.flat_quantity() == Some(projected) {
            return Ok(());
        }
        child.set_flat_quantity(projected);

        let mut txn = LedgerTxn::new();
        txn.cas_product(&child)?;
        match txn.commit(db).await {
            Ok(()) => return Ok(()),
            Err(TxnError::Conflict) if attempt < RETRY_BUDGET => {
                tokio::time::sleep(std::time::Duration::from_millis(
                    RETRY_BACKOFF_MS * attempt as u64,
                ))
                .await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::StockKind;

    use crate::db::DbService;
    use crate::db::repository::ProductCreate;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    async fn seed_pair(repo: &ProductRepository, parent_qty: &str, ratio: &str) {
        repo.create(ProductCreate {
            id: Some("flour-bag".into()),
            name: "Flour Bag".into(),
            price: d("5.00"),
            wholesale_price: None,
            unit_kind: None,
            is_visible: None,
            stock: StockKind::simple(d(parent_qty)),
        })
        .await
        .unwrap();
        repo.create(ProductCreate {
            id: Some("bread-pack".into()),
            name: "Bread Pack".into(),
            price: d("12.00"),
            wholesale_price: None,
            unit_kind: None,
            is_visible: None,
            stock: StockKind::derived("flour-bag", d(ratio)),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn projection_floors_the_division() {
        let svc = DbService::open_memory().await.unwrap();
        let repo = ProductRepository::new(svc.db.clone());
        seed_pair(&repo, "20", "2").await;

        propagate(&svc.db, "flour-bag", d("13")).await;
        let pack = repo.find_by_id("bread-pack").await.unwrap().unwrap();
        assert_eq!(pack.stock.flat_quantity(), Some(d("6")));
        assert!(matches!(pack.stock, StockKind::Derived { in_stock: true, .. }));
    }

    #[tokio::test]
    async fn zero_parent_marks_children_out_of_stock() {
        let svc = DbService::open_memory().await.unwrap();
        let repo = ProductRepository::new(svc.db.clone());
        seed_pair(&repo, "20", "2").await;
        propagate(&svc.db, "flour-bag", d("20")).await;

        propagate(&svc.db, "flour-bag", Decimal::ZERO).await;
        let pack = repo.find_by_id("bread-pack").await.unwrap().unwrap();
        assert_eq!(pack.stock.flat_quantity(), Some(Decimal::ZERO));
        assert!(matches!(pack.stock, StockKind::Derived { in_stock: false, .. }));
    }

    #[tokio::test]
    async fn unchanged_projection_skips_the_write() {
        let svc = DbService::open_memory().await.unwrap();
        let repo = ProductRepository::new(svc.db.clone());
        seed_pair(&repo, "20", "2").await;

        propagate(&svc.db, "flour-bag", d("13")).await;
        let first = repo.find_by_id("bread-pack").await.unwrap().unwrap();

        // Same parent quantity again: idempotent, no version bump
        propagate(&svc.db, "flour-bag", d("13")).await;
        let second = repo.find_by_id("bread-pack").await.unwrap().unwrap();
        assert_eq!(second.version, first.version);
    }

    #[tokio::test]
    async fn parent_without_dependents_is_a_no_op() {
        let svc = DbService::open_memory().await.unwrap();
        let repo = ProductRepository::new(svc.db.clone());
        repo.create(ProductCreate {
            id: Some("croissant".into()),
            name: "Croissant".into(),
            price: d("2.00"),
            wholesale_price: None,
            unit_kind: None,
            is_visible: None,
            stock: StockKind::simple(d("10")),
        })
        .await
        .unwrap();

        propagate(&svc.db, "croissant", d("9")).await;
        let stored = repo.find_by_id("croissant").await.unwrap().unwrap();
        assert_eq!(stored.stock.flat_quantity(), Some(d("10")));
    }
}
