//! Reversal Engine
//!
//! Applies the stock effect of an order status change. Stock only moves when
//! the change crosses the cancellation boundary: entering the cancelled state
//! restocks every line, leaving it re-deducts. Reversal is deliberately
//! best-effort per line (catalog entries may have been deleted or reshaped
//! since the sale); a failed line is logged and skipped, and the status
//! transition itself always completes.

use rust_decimal::Decimal;
use shared::{
    MovementType, Order, OrderLine, OrderStatus, ResolvedTarget, StockError, StockKind,
    StockMovement, StockResult, quantity,
};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use super::{RETRY_BACKOFF_MS, RETRY_BUDGET, propagator, resolver};
use crate::db::repository::{OrderRepository, ProductRepository};
use crate::db::txn::{LedgerTxn, TxnError};

#[derive(Clone)]
pub struct ReversalEngine {
    db: Surreal<Db>,
}

impl ReversalEngine {
    pub fn new(db: Surreal<Db>) -> Self {
        Self { db }
    }

    /// Persist a status change, restocking or re-deducting when the change
    /// crosses into or out of the cancelled state.
    ///
    /// The status write is conditional on the status that was read, so two
    /// concurrent terminals cancelling the same order cross the boundary
    /// exactly once; the loser re-reads and sees a no-op.
    pub async fn apply_status_change(
        &self,
        order_id: &str,
        new_status: OrderStatus,
    ) -> StockResult<Order> {
        let orders = OrderRepository::new(self.db.clone());

        let mut attempt = 0;
        loop {
            attempt += 1;
            let order = orders
                .find_by_id(order_id)
                .await
                .map_err(|e| StockError::Store(e.to_string()))?
                .ok_or_else(|| StockError::ProductNotFound(format!("order {order_id}")))?;
            if order.status == new_status {
                return Ok(order);
            }

            // Claim the transition before any stock moves
            let Some(updated) = orders
                .update_status_when(order_id, order.status, new_status)
                .await
                .map_err(|e| StockError::Store(e.to_string()))?
            else {
                if attempt < RETRY_BUDGET {
                    continue;
                }
                return Err(StockError::TransactionConflict);
            };

            let was_cancelled = order.status.is_cancelled();
            let now_cancelled = new_status.is_cancelled();
            if was_cancelled != now_cancelled {
                let direction = if now_cancelled {
                    Reversal::Restock
                } else {
                    Reversal::Rededuct
                };
                let touched = self.reverse_lines(&updated, direction).await;
                propagator::propagate_all(&self.db, &touched).await;
            }

            return Ok(updated);
        }
    }

    /// Best-effort per-line reversal; returns the flat-stock products whose
    /// quantity changed, for child-sync
    async fn reverse_lines(&self, order: &Order, direction: Reversal) -> Vec<(String, Decimal)> {
        let repo = ProductRepository::new(self.db.clone());
        let order_id = order.id.as_deref().unwrap_or_default();
        let mut touched = Vec::new();

        for line in &order.lines {
            match self.reverse_line(&repo, order_id, line, direction).await {
                Ok(Some(update)) => touched.push(update),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        order_id = %order_id,
                        line_id = %line.line_id,
                        error = %e,
                        "reversal: line skipped"
                    );
                }
            }
        }
        touched
    }

    /// Reverse one line against its ledger target, with CAS retry
    async fn reverse_line(
        &self,
        repo: &ProductRepository,
        order_id: &str,
        line: &OrderLine,
        direction: Reversal,
    ) -> StockResult<Option<(String, Decimal)>> {
        let target = self.line_target(repo, line).await?;
        let ledger_id = target.ledger_product_id().to_string();
        let delta = match &target {
            ResolvedTarget::Parent {
                units_to_deduct, ..
            } => quantity::mul(line.quantity, *units_to_deduct),
            _ => line.quantity,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut product = repo
                .find_by_id(&ledger_id)
                .await
                .map_err(|e| StockError::Store(e.to_string()))?
                .ok_or_else(|| StockError::ProductNotFound(ledger_id.clone()))?;

            let (current, variant) = match &target {
                ResolvedTarget::Variant { variant, .. } => {
                    let v = product
                        .stock
                        .variant(variant)
                        .ok_or_else(|| StockError::VariantNotFound {
                            product_id: ledger_id.clone(),
                            variant: variant.clone(),
                        })?;
                    (v.quantity, Some(variant.clone()))
                }
                _ => (
                    product.stock.flat_quantity().unwrap_or(Decimal::ZERO),
                    None,
                ),
            };

            // Re-deduction is clamped: a cancelled order may overlap stock
            // that was already sold again, so only what is present comes back
            // out, and the movement records what actually moved
            let (new_quantity, applied, movement_type, reason) = match direction {
                Reversal::Restock => (
                    quantity::add(current, delta),
                    delta,
                    MovementType::In,
                    "order cancelled",
                ),
                Reversal::Rededuct => {
                    let next = quantity::sub_clamped(current, delta);
                    (next, quantity::sub(current, next), MovementType::Out, "order reactivated")
                }
            };
            if applied.is_zero() {
                return Ok(None);
            }
            match &variant {
                Some(v) => {
                    product.set_variant_quantity(v, new_quantity);
                }
                None => product.set_flat_quantity(new_quantity),
            }

            let display = match &variant {
                Some(v) => format!("{} ({})", product.name, v),
                None => product.name.clone(),
            };
            let mut txn = LedgerTxn::new();
            txn.cas_product(&product)
                .map_err(|e| StockError::Store(e.to_string()))?;
            txn.create_movement(
                &StockMovement::new(ledger_id.clone(), display, movement_type, applied, reason)
                    .with_observation(format!("order {order_id}")),
            )
            .map_err(|e| StockError::Store(e.to_string()))?;

            match txn.commit(&self.db).await {
                Ok(()) => {
                    let update = matches!(product.stock, StockKind::Simple { .. })
                        .then(|| product.stock.flat_quantity())
                        .flatten()
                        .map(|q| (ledger_id.clone(), q));
                    return Ok(update);
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
        }
    }

    /// The snapshot taken at deduction time, or a fresh resolution for
    /// orders that predate snapshots
    async fn line_target(
        &self,
        repo: &ProductRepository,
        line: &OrderLine,
    ) -> StockResult<ResolvedTarget> {
        if let Some(target) = &line.resolved {
            return Ok(target.clone());
        }
        let resolved =
            resolver::resolve_line(repo, &line.line_id, &line.name, line.quantity).await?;
        Ok(resolved.target)
    }
}

/// Which side of the cancellation boundary a status change crosses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reversal {
    /// Entering cancelled: stock comes back
    Restock,
    /// Leaving cancelled: stock goes back out, clamped at zero
    Rededuct,
}
