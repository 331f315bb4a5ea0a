//! Stock Movement Model
//!
//! Append-only audit records, one per ledger mutation (deductions, restocks,
//! manual corrections). Never updated or deleted, and never authoritative for
//! current stock — the ledger lives on the product documents.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::util::now_millis;

/// Direction of a ledger mutation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    In,
    Out,
}

/// Immutable audit record for one ledger mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockMovement {
    pub id: Option<String>,
    pub product_id: String,
    pub product_name: String,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    /// Free-text category ("web sale", "order cancelled", ...)
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    /// UTC milliseconds
    pub date: i64,
}

impl StockMovement {
    pub fn new(
        product_id: impl Into<String>,
        product_name: impl Into<String>,
        movement_type: MovementType,
        quantity: Decimal,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            product_id: product_id.into(),
            product_name: product_name.into(),
            movement_type,
            quantity,
            reason: reason.into(),
            observation: None,
            date: now_millis(),
        }
    }

    pub fn with_observation(mut self, observation: impl Into<String>) -> Self {
        self.observation = Some(observation.into());
        self
    }
}
