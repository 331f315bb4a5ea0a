//! Transactional Deduction Engine
//!
//! All-or-nothing check-and-deduct at checkout, shared by the web storefront
//! and both POS channels. Every implicated ledger entry is read, validated,
//! and rewritten in one version-checked transaction together with the order
//! record and one audit movement per target; a single insufficient line
//! rejects the whole order. Child-sync propagation for touched parents runs
//! after commit, best-effort.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    CustomerInfo, MovementType, Order, OrderLine, Product, ResolvedTarget, SalesChannel,
    StockError, StockKind, StockMovement, StockResult, quantity, util,
};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use super::{RETRY_BACKOFF_MS, RETRY_BUDGET, propagator, resolver};
use crate::db::repository::ProductRepository;
use crate::db::txn::{LedgerTxn, TxnError};

/// One cart line as submitted at checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutLine {
    /// Bare product id or `{productId}-{variantName}`
    pub line_id: String,
    /// Display name, possibly `Name (Variant)`
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
}

/// A checkout request from any sales channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub lines: Vec<CheckoutLine>,
    #[serde(default)]
    pub customer: CustomerInfo,
    pub channel: SalesChannel,
}

/// Result of a committed deduction
#[derive(Debug, Clone, Serialize)]
pub struct DeductionOutcome {
    pub order_id: String,
    /// Flat-stock products whose quantity changed, with their new quantity;
    /// input to child-sync propagation
    pub updated_parents: Vec<(String, Decimal)>,
}

/// One coalesced ledger target inside a deduction attempt
struct TargetAgg {
    product_idx: usize,
    variant: Option<String>,
    delta: Decimal,
    /// First contributing line, for error reporting
    line_id: String,
    /// Display name for movements and errors
    display: String,
}

#[derive(Clone)]
pub struct DeductionEngine {
    db: Surreal<Db>,
    retry_budget: u32,
}

impl DeductionEngine {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            db,
            retry_budget: RETRY_BUDGET,
        }
    }

    /// Check-and-deduct all lines atomically, create the order, and then
    /// propagate derived quantities for every touched parent.
    pub async fn deduct(&self, request: &CheckoutRequest) -> StockResult<DeductionOutcome> {
        if request.lines.is_empty() {
            return Err(StockError::Validation("order has no lines".into()));
        }

        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            match self.try_deduct(request).await {
                Err(e) if e.is_transient() && attempt < self.retry_budget => {
                    tracing::debug!(attempt, "deduction conflict, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(
                        RETRY_BACKOFF_MS * attempt as u64,
                    ))
                    .await;
                }
                other => break other?,
            }
        };

        // Best-effort follow-up, deliberately outside the transaction:
        // a propagation failure must not fail an already-committed checkout
        propagator::propagate_all(&self.db, &outcome.updated_parents).await;

        tracing::info!(
            order_id = %outcome.order_id,
            lines = request.lines.len(),
            channel = ?request.channel,
            "checkout committed"
        );
        Ok(outcome)
    }

    /// One optimistic attempt: read, validate, commit
    async fn try_deduct(&self, request: &CheckoutRequest) -> StockResult<DeductionOutcome> {
        let repo = ProductRepository::new(self.db.clone());

        // 1. Resolve every line; a vanished product/variant is reported as
        //    unsellable (insufficient with zero available)
        let mut resolved = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let r = resolver::resolve_line(&repo, &line.line_id, &line.name, line.quantity)
                .await
                .map_err(|e| e.into_unsellable(&line.line_id, &line.name, line.quantity))?;
            resolved.push(r);
        }

        // 2. Coalesce deltas per ledger target; several lines may move the
        //    same entry (two pack sizes of one parent, repeated lines)
        let mut products: Vec<Product> = Vec::new();
        let mut targets: Vec<TargetAgg> = Vec::new();
        for (line, r) in request.lines.iter().zip(&resolved) {
            let key = r.ledger.id.clone().unwrap_or_default();
            let product_idx = match products.iter().position(|p| p.id.as_deref() == Some(key.as_str())) {
                Some(i) => i,
                None => {
                    products.push(r.ledger.clone());
                    products.len() - 1
                }
            };
            let variant = match &r.target {
                ResolvedTarget::Variant { variant, .. } => Some(variant.clone()),
                _ => None,
            };
            match targets
                .iter_mut()
                .find(|t| t.product_idx == product_idx && t.variant == variant)
            {
                Some(t) => t.delta = quantity::add(t.delta, r.delta),
                None => {
                    let display = match &variant {
                        Some(v) => format!("{} ({})", r.ledger.name, v),
                        None => r.ledger.name.clone(),
                    };
                    targets.push(TargetAgg {
                        product_idx,
                        variant,
                        delta: r.delta,
                        line_id: line.line_id.clone(),
                        display,
                    });
                }
            }
        }

        // 3. Validate every target; any shortfall rejects the whole order
        for t in &targets {
            let product = &products[t.product_idx];
            let available = match &t.variant {
                Some(v) => {
                    product
                        .stock
                        .variant(v)
                        .ok_or_else(|| StockError::VariantNotFound {
                            product_id: product.id.clone().unwrap_or_default(),
                            variant: v.clone(),
                        })?
                        .quantity
                }
                None => product.stock.flat_quantity().unwrap_or(Decimal::ZERO),
            };
            if available < t.delta {
                return Err(StockError::InsufficientStock {
                    line_id: t.line_id.clone(),
                    name: t.display.clone(),
                    requested: t.delta,
                    available,
                });
            }
        }

        // 4. Apply the deltas to the in-memory documents
        for t in &targets {
            let product = &mut products[t.product_idx];
            match &t.variant {
                Some(v) => {
                    let current = product.stock.variant(v).map(|x| x.quantity).unwrap_or_default();
                    product.set_variant_quantity(v, quantity::sub(current, t.delta));
                }
                None => {
                    let current = product.stock.flat_quantity().unwrap_or_default();
                    product.set_flat_quantity(quantity::sub(current, t.delta));
                }
            }
        }

        // 5. Build the order with per-line resolution snapshots
        let order_id = util::snowflake_id().to_string();
        let mut total = Decimal::ZERO;
        let mut order_lines = Vec::with_capacity(request.lines.len());
        for (line, r) in request.lines.iter().zip(&resolved) {
            let unit_price = price_for(&r.sellable, request.channel);
            total += unit_price * r.requested;
            order_lines.push(OrderLine {
                line_id: line.line_id.clone(),
                name: line.name.clone(),
                unit_price,
                quantity: r.requested,
                resolved: Some(r.target.clone()),
            });
        }
        let order = Order {
            id: Some(order_id.clone()),
            lines: order_lines,
            total: total.round_dp(2),
            customer: request.customer.clone(),
            channel: request.channel,
            status: request.channel.initial_status(),
            // POS sales are settled at the counter; web orders wait for the
            // payment-approval webhook
            payment_approved: !matches!(request.channel, SalesChannel::Web),
            created_at: util::now_millis(),
        };

        // 6. Single atomic commit: ledger writes + order + audit movements
        let reason = match request.channel {
            SalesChannel::Web => "web sale",
            SalesChannel::PosRetail | SalesChannel::PosWholesale => "POS sale",
        };
        let mut txn = LedgerTxn::new();
        for product in &products {
            txn.cas_product(product).map_err(store_err)?;
        }
        txn.create_order(&order).map_err(store_err)?;
        for t in &targets {
            let product = &products[t.product_idx];
            let movement = StockMovement::new(
                product.id.clone().unwrap_or_default(),
                t.display.clone(),
                MovementType::Out,
                t.delta,
                reason,
            )
            .with_observation(format!("order {order_id}"));
            txn.create_movement(&movement).map_err(store_err)?;
        }
        match txn.commit(&self.db).await {
            Ok(()) => {}
            Err(TxnError::Conflict) => return Err(StockError::TransactionConflict),
            Err(TxnError::Db(msg)) => return Err(StockError::Store(msg)),
        }

        // 7. Every flat-stock product we rewrote is a potential pack parent
        let updated_parents = products
            .iter()
            .filter(|p| matches!(p.stock, StockKind::Simple { .. }))
            .filter_map(|p| {
                Some((p.id.clone()?, p.stock.flat_quantity()?))
            })
            .collect();

        Ok(DeductionOutcome {
            order_id,
            updated_parents,
        })
    }
}

/// Unit price at time of sale; POS wholesale uses the wholesale price when
/// the product carries one
fn price_for(product: &Product, channel: SalesChannel) -> Decimal {
    if channel.is_wholesale() {
        product.wholesale_price.unwrap_or(product.price)
    } else {
        product.price
    }
}

fn store_err(e: TxnError) -> StockError {
    StockError::Store(e.to_string())
}
