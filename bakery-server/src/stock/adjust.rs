//! Manual stock adjustment
//!
//! Back-office corrections: set a flat or variant quantity to an absolute
//! value, recording the difference as an audit movement. Derived packs are
//! projections and cannot be adjusted directly; the parent is the ledger.

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{MovementType, Product, StockError, StockKind, StockMovement, StockResult, quantity};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use super::{RETRY_BACKOFF_MS, RETRY_BUDGET, propagator};
use crate::db::repository::ProductRepository;
use crate::db::txn::{LedgerTxn, TxnError};

/// An absolute quantity correction against one ledger entry
#[derive(Debug, Clone, Deserialize)]
pub struct StockAdjustment {
    /// Variant name for variant products; None targets flat stock
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_quantity: Decimal,
    /// Free-text category for the audit trail ("stocktake", "breakage", ...)
    pub reason: String,
    #[serde(default)]
    pub observation: Option<String>,
}

/// Set a ledger entry to an absolute quantity, with an audit movement for
/// the difference, then re-project any dependent packs.
pub async fn adjust_stock(
    db: &Surreal<Db>,
    product_id: &str,
    adjustment: &StockAdjustment,
) -> StockResult<Product> {
    if adjustment.new_quantity < Decimal::ZERO {
        return Err(StockError::Validation("quantity cannot be negative".into()));
    }
    if adjustment.reason.trim().is_empty() {
        return Err(StockError::Validation("a reason is required".into()));
    }
    let new_quantity = quantity::round(adjustment.new_quantity);
    let repo = ProductRepository::new(db.clone());

    let mut attempt = 0;
    let product = loop {
        attempt += 1;
        let mut product = repo
            .find_by_id(product_id)
            .await
            .map_err(|e| StockError::Store(e.to_string()))?
            .ok_or_else(|| StockError::ProductNotFound(product_id.to_string()))?;

        if product.stock.is_derived() {
            return Err(StockError::Validation(
                "derived stock is a projection; adjust the parent product".into(),
            ));
        }

        let current = match &adjustment.variant {
            Some(v) => {
                product
                    .stock
                    .variant(v)
                    .ok_or_else(|| StockError::VariantNotFound {
                        product_id: product_id.to_string(),
                        variant: v.clone(),
                    })?
                    .quantity
            }
            None => product
                .stock
                .flat_quantity()
                .ok_or_else(|| StockError::Validation("variant name required".into()))?,
        };

        let diff = quantity::sub(new_quantity, current);
        if diff.is_zero() {
            return Ok(product);
        }

        match &adjustment.variant {
            Some(v) => {
                product.set_variant_quantity(v, new_quantity);
            }
            None => product.set_flat_quantity(new_quantity),
        }

        let display = match &adjustment.variant {
            Some(v) => format!("{} ({})", product.name, v),
            None => product.name.clone(),
        };
        let movement_type = if diff > Decimal::ZERO {
            MovementType::In
        } else {
            MovementType::Out
        };
        let mut movement = StockMovement::new(
            product_id,
            display,
            movement_type,
            diff.abs(),
            adjustment.reason.clone(),
        );
        if let Some(obs) = &adjustment.observation {
            movement = movement.with_observation(obs.clone());
        }

        let mut txn = LedgerTxn::new();
        txn.cas_product(&product)
            .map_err(|e| StockError::Store(e.to_string()))?;
        txn.create_movement(&movement)
            .map_err(|e| StockError::Store(e.to_string()))?;
        match txn.commit(db).await {
            Ok(()) => {
                tracing::info!(
                    product_id = %product_id,
                    new_quantity = %new_quantity,
                    reason = %adjustment.reason,
                    "stock adjusted"
                );
                product.version += 1;
                break product;
            }
            Err(TxnError::Conflict) if attempt < RETRY_BUDGET => {
                tokio::time::sleep(std::time::Duration::from_millis(
                    RETRY_BACKOFF_MS * attempt as u64,
                ))
                .await;
            }
            Err(TxnError::Conflict) => return Err(StockError::TransactionConflict),
            Err(TxnError::Db(msg)) => return Err(StockError::Store(msg)),
        }
    };

    if let (StockKind::Simple { .. }, Some(q)) = (&product.stock, product.stock.flat_quantity()) {
        propagator::propagate(db, product_id, q).await;
    }
    Ok(product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Variant;

    use crate::db::DbService;
    use crate::db::repository::{ProductCreate, StockMovementRepository};

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn adjustment(qty: &str, reason: &str) -> StockAdjustment {
        StockAdjustment {
            variant: None,
            new_quantity: d(qty),
            reason: reason.into(),
            observation: None,
        }
    }

    async fn setup() -> (DbService, ProductRepository) {
        let svc = DbService::open_memory().await.unwrap();
        let repo = ProductRepository::new(svc.db.clone());
        (svc, repo)
    }

    #[tokio::test]
    async fn stocktake_correction_records_the_difference() {
        let (svc, repo) = setup().await;
        repo.create(ProductCreate {
            id: Some("flour-bag".into()),
            name: "Flour Bag".into(),
            price: d("5.00"),
            wholesale_price: None,
            unit_kind: None,
            is_visible: None,
            stock: StockKind::simple(d("20")),
        })
        .await
        .unwrap();

        let product = adjust_stock(&svc.db, "flour-bag", &adjustment("17", "stocktake"))
            .await
            .unwrap();
        assert_eq!(product.stock.flat_quantity(), Some(d("17")));

        let movements = StockMovementRepository::new(svc.db)
            .find_by_product("flour-bag")
            .await
            .unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].movement_type, MovementType::Out);
        assert_eq!(movements[0].quantity, d("3"));
        assert_eq!(movements[0].reason, "stocktake");
    }

    #[tokio::test]
    async fn variant_adjustment_targets_one_variant() {
        let (svc, repo) = setup().await;
        repo.create(ProductCreate {
            id: Some("t-shirt".into()),
            name: "T-Shirt".into(),
            price: d("10.00"),
            wholesale_price: None,
            unit_kind: None,
            is_visible: None,
            stock: StockKind::Variants {
                variants: vec![Variant::new("Red", d("2")), Variant::new("Blue", d("5"))],
            },
        })
        .await
        .unwrap();

        let mut adj = adjustment("8", "delivery");
        adj.variant = Some("Red".into());
        let product = adjust_stock(&svc.db, "t-shirt", &adj).await.unwrap();
        assert_eq!(product.stock.variant("Red").unwrap().quantity, d("8"));
        assert_eq!(product.stock.variant("Blue").unwrap().quantity, d("5"));
    }

    #[tokio::test]
    async fn derived_products_cannot_be_adjusted() {
        let (svc, repo) = setup().await;
        repo.create(ProductCreate {
            id: Some("flour-bag".into()),
            name: "Flour Bag".into(),
            price: d("5.00"),
            wholesale_price: None,
            unit_kind: None,
            is_visible: None,
            stock: StockKind::simple(d("20")),
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
            stock: StockKind::derived("flour-bag", d("2")),
        })
        .await
        .unwrap();

        let err = adjust_stock(&svc.db, "bread-pack", &adjustment("5", "stocktake"))
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::Validation(_)));
    }

    #[tokio::test]
    async fn same_quantity_is_a_no_op() {
        let (svc, repo) = setup().await;
        repo.create(ProductCreate {
            id: Some("flour-bag".into()),
            name: "Flour Bag".into(),
            price: d("5.00"),
            wholesale_price: None,
            unit_kind: None,
            is_visible: None,
            stock: StockKind::simple(d("20")),
        })
        .await
        .unwrap();

        adjust_stock(&svc.db, "flour-bag", &adjustment("20", "stocktake"))
            .await
            .unwrap();
        let movements = StockMovementRepository::new(svc.db)
            .find_all(10, 0)
            .await
            .unwrap();
        assert!(movements.is_empty());
    }

    #[tokio::test]
    async fn parent_adjustment_reprojects_packs() {
        let (svc, repo) = setup().await;
        repo.create(ProductCreate {
            id: Some("flour-bag".into()),
            name: "Flour Bag".into(),
            price: d("5.00"),
            wholesale_price: None,
            unit_kind: None,
            is_visible: None,
            stock: StockKind::simple(d("20")),
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
            stock: StockKind::derived("flour-bag", d("2")),
        })
        .await
        .unwrap();

        adjust_stock(&svc.db, "flour-bag", &adjustment("7", "breakage"))
            .await
            .unwrap();
        let pack = repo.find_by_id("bread-pack").await.unwrap().unwrap();
        assert_eq!(pack.stock.flat_quantity(), Some(d("3")));
    }
}
