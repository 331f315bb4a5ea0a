//! POS checkout session
//!
//! One state machine per terminal session. The terminal walks
//! Browsing -> ItemEntry -> CartReview -> Submitting and ends an attempt in
//! either Success or StockConflict. A conflict names the short line and
//! accepts an inline stock correction, which re-checks that one line exactly
//! once and then returns the session to CartReview; the cart itself is never
//! rebuilt. All stock effects go through the deduction engine, so a POS sale
//! and a racing web checkout contend on the same ledger versions.

use rust_decimal::Decimal;
use shared::{CustomerInfo, SalesChannel, StockError, quantity};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::db::repository::ProductRepository;
use crate::stock::adjust::{StockAdjustment, adjust_stock};
use crate::stock::deduction::{CheckoutLine, CheckoutRequest, DeductionEngine};
use crate::stock::resolver;

/// Where a session currently is
#[derive(Debug, Clone, PartialEq)]
pub enum PosStage {
    Browsing,
    /// A product is selected and the terminal prompts for a quantity
    /// (weight for weighed goods, a whole count otherwise)
    ItemEntry {
        line_id: String,
        name: String,
        integral: bool,
    },
    CartReview,
    Submitting,
    Success {
        order_id: String,
    },
    /// The submit was rejected; names the short line so the operator can
    /// correct the shelf count inline
    StockConflict {
        line_id: String,
        name: String,
        requested: Decimal,
        available: Decimal,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PosError {
    #[error("action not valid while {0}")]
    InvalidStage(&'static str),

    #[error(transparent)]
    Stock(#[from] StockError),
}

pub type PosResult<T> = Result<T, PosError>;

pub struct PosSession {
    db: Surreal<Db>,
    channel: SalesChannel,
    customer: CustomerInfo,
    cart: Vec<CheckoutLine>,
    stage: PosStage,
}

impl PosSession {
    pub fn new(db: Surreal<Db>, channel: SalesChannel) -> Self {
        Self {
            db,
            channel,
            customer: CustomerInfo::default(),
            cart: Vec::new(),
            stage: PosStage::Browsing,
        }
    }

    pub fn stage(&self) -> &PosStage {
        &self.stage
    }

    pub fn cart(&self) -> &[CheckoutLine] {
        &self.cart
    }

    pub fn set_customer(&mut self, customer: CustomerInfo) {
        self.customer = customer;
    }

    /// Browsing/CartReview -> ItemEntry. Resolves the tapped catalog entry so
    /// the quantity prompt knows whether to ask for a weight or a count.
    pub async fn select_product(&mut self, line_id: &str, name: &str) -> PosResult<()> {
        match self.stage {
            PosStage::Browsing | PosStage::CartReview => {}
            _ => return Err(PosError::InvalidStage(self.stage_name())),
        }
        let repo = ProductRepository::new(self.db.clone());
        let resolved = resolver::resolve_line(&repo, line_id, name, Decimal::ONE).await?;
        self.stage = PosStage::ItemEntry {
            line_id: line_id.to_string(),
            name: name.to_string(),
            integral: resolved.sellable.unit_kind.is_integral(),
        };
        Ok(())
    }

    /// ItemEntry -> CartReview. Validates the entered quantity against the
    /// product's unit kind and merges it into the cart.
    pub fn enter_quantity(&mut self, entered: Decimal) -> PosResult<()> {
        let PosStage::ItemEntry {
            line_id,
            name,
            integral,
        } = &self.stage
        else {
            return Err(PosError::InvalidStage(self.stage_name()));
        };
        quantity::validate_requested(entered, *integral, line_id)?;

        match self.cart.iter_mut().find(|l| &l.line_id == line_id) {
            Some(line) => line.quantity = quantity::add(line.quantity, entered),
            None => self.cart.push(CheckoutLine {
                line_id: line_id.clone(),
                name: name.clone(),
                quantity: entered,
            }),
        }
        self.stage = PosStage::CartReview;
        Ok(())
    }

    /// Abandon the quantity prompt
    pub fn cancel_entry(&mut self) -> PosResult<()> {
        if !matches!(self.stage, PosStage::ItemEntry { .. }) {
            return Err(PosError::InvalidStage(self.stage_name()));
        }
        self.stage = if self.cart.is_empty() {
            PosStage::Browsing
        } else {
            PosStage::CartReview
        };
        Ok(())
    }

    pub fn remove_line(&mut self, line_id: &str) -> PosResult<()> {
        if !matches!(self.stage, PosStage::CartReview) {
            return Err(PosError::InvalidStage(self.stage_name()));
        }
        self.cart.retain(|l| l.line_id != line_id);
        if self.cart.is_empty() {
            self.stage = PosStage::Browsing;
        }
        Ok(())
    }

    /// Back to the catalog to add another item
    pub fn browse(&mut self) -> PosResult<()> {
        if !matches!(self.stage, PosStage::CartReview) {
            return Err(PosError::InvalidStage(self.stage_name()));
        }
        self.stage = PosStage::Browsing;
        Ok(())
    }

    /// Only reachable from Browsing with a non-empty cart
    pub fn review(&mut self) -> PosResult<()> {
        if !matches!(self.stage, PosStage::Browsing) || self.cart.is_empty() {
            return Err(PosError::InvalidStage(self.stage_name()));
        }
        self.stage = PosStage::CartReview;
        Ok(())
    }

    /// CartReview -> Submitting -> Success | StockConflict.
    /// Store-level conflicts are retried inside the engine; only a genuine
    /// shortfall surfaces here.
    pub async fn submit(&mut self) -> PosResult<&PosStage> {
        if !matches!(self.stage, PosStage::CartReview) {
            return Err(PosError::InvalidStage(self.stage_name()));
        }
        self.stage = PosStage::Submitting;

        let engine = DeductionEngine::new(self.db.clone());
        let request = CheckoutRequest {
            lines: self.cart.clone(),
            customer: self.customer.clone(),
            channel: self.channel,
        };
        self.stage = match engine.deduct(&request).await {
            Ok(outcome) => PosStage::Success {
                order_id: outcome.order_id,
            },
            Err(StockError::InsufficientStock {
                line_id,
                name,
                requested,
                available,
            }) => PosStage::StockConflict {
                line_id,
                name,
                requested,
                available,
            },
            Err(e) => {
                self.stage = PosStage::CartReview;
                return Err(e.into());
            }
        };
        Ok(&self.stage)
    }

    /// Inline shelf-count correction from a StockConflict: adjusts the short
    /// line's ledger entry, re-checks that single line once, and returns to
    /// CartReview. A still-short line stays in the cart for the operator to
    /// edit; nothing is resubmitted automatically.
    pub async fn correct_stock(&mut self, counted_quantity: Decimal) -> PosResult<&PosStage> {
        let PosStage::StockConflict { line_id, name, .. } = &self.stage else {
            return Err(PosError::InvalidStage(self.stage_name()));
        };
        let (line_id, name) = (line_id.clone(), name.clone());

        let repo = ProductRepository::new(self.db.clone());
        let cart_quantity = self
            .cart
            .iter()
            .find(|l| l.line_id == line_id)
            .map(|l| l.quantity)
            .unwrap_or(Decimal::ONE);
        let resolved = resolver::resolve_line(&repo, &line_id, &name, cart_quantity).await?;

        let variant = match &resolved.target {
            shared::ResolvedTarget::Variant { variant, .. } => Some(variant.clone()),
            _ => None,
        };
        adjust_stock(
            &self.db,
            resolved.target.ledger_product_id(),
            &StockAdjustment {
                variant,
                new_quantity: counted_quantity,
                reason: "POS shelf count".into(),
                observation: Some(format!("correction for {line_id}")),
            },
        )
        .await?;

        // The one retry of the original add: re-resolve and re-check the
        // single conflicted line against the corrected ledger
        let resolved = resolver::resolve_line(&repo, &line_id, &name, cart_quantity).await?;
        let available = match &resolved.target {
            shared::ResolvedTarget::Variant { variant, .. } => resolved
                .ledger
                .stock
                .variant(variant)
                .map(|v| v.quantity)
                .unwrap_or(Decimal::ZERO),
            _ => resolved.ledger.stock.flat_quantity().unwrap_or(Decimal::ZERO),
        };
        if available < resolved.delta {
            tracing::warn!(
                line_id = %line_id,
                available = %available,
                "POS correction left the line short"
            );
        }
        self.stage = PosStage::CartReview;
        Ok(&self.stage)
    }

    fn stage_name(&self) -> &'static str {
        match self.stage {
            PosStage::Browsing => "browsing",
            PosStage::ItemEntry { .. } => "entering an item",
            PosStage::CartReview => "reviewing the cart",
            PosStage::Submitting => "submitting",
            PosStage::Success { .. } => "completed",
            PosStage::StockConflict { .. } => "resolving a stock conflict",
        }
    }
}
