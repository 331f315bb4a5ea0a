//! Order Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order status
///
/// One vocabulary for every sales channel; channel-specific display naming
/// is a UI concern.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Preparing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OrderStatus::Cancelled)
    }
}

/// Where the order was taken
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SalesChannel {
    Web,
    PosRetail,
    PosWholesale,
}

impl SalesChannel {
    /// Initial status for a freshly checked-out order
    pub fn initial_status(&self) -> OrderStatus {
        OrderStatus::Pending
    }

    /// POS sales may price at wholesale
    pub fn is_wholesale(&self) -> bool {
        matches!(self, SalesChannel::PosWholesale)
    }
}

/// Ledger target a line resolved to at deduction time
///
/// Persisted on the order line so cancellation restocks the same bucket the
/// sale deducted from, even if the catalog changed in between.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "target", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolvedTarget {
    /// The product's flat stock
    Flat { product_id: String },
    /// A specific variant's stock
    Variant { product_id: String, variant: String },
    /// A derived line: the parent's flat stock moves by
    /// `quantity * units_to_deduct`
    Parent {
        parent_id: String,
        #[serde(with = "rust_decimal::serde::float")]
        units_to_deduct: Decimal,
    },
}

impl ResolvedTarget {
    /// Product document holding the ledger entry this target mutates
    pub fn ledger_product_id(&self) -> &str {
        match self {
            ResolvedTarget::Flat { product_id } | ResolvedTarget::Variant { product_id, .. } => {
                product_id
            }
            ResolvedTarget::Parent { parent_id, .. } => parent_id,
        }
    }
}

/// One line of an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    /// Bare product id, or `{productId}-{variantName}` for a variant line
    pub line_id: String,
    /// Display name; may embed the variant as `Name (VariantName)`
    pub name: String,
    /// Unit price at time of sale
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    /// Resolution snapshot taken at deduction time. Absent on orders
    /// predating the field; reversal re-resolves those against the current
    /// catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<ResolvedTarget>,
}

/// Customer / delivery metadata captured at checkout
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CustomerInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Option<String>,
    pub lines: Vec<OrderLine>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub customer: CustomerInfo,
    pub channel: SalesChannel,
    pub status: OrderStatus,
    /// Set by the payment-approval webhook; gates storefront visibility and
    /// never touches stock (reserved at creation time).
    #[serde(default)]
    pub payment_approved: bool,
    /// Creation time, UTC milliseconds
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_screaming_snake() {
        let json = serde_json::to_string(&OrderStatus::Cancelled).unwrap();
        assert_eq!(json, "\"CANCELLED\"");
    }

    #[test]
    fn resolved_target_points_at_ledger_document() {
        let t = ResolvedTarget::Parent {
            parent_id: "product:flour".into(),
            units_to_deduct: Decimal::TWO,
        };
        assert_eq!(t.ledger_product_id(), "product:flour");

        let t = ResolvedTarget::Variant {
            product_id: "product:shirt".into(),
            variant: "Red".into(),
        };
        assert_eq!(t.ledger_product_id(), "product:shirt");
    }

    #[test]
    fn lines_without_snapshot_deserialize() {
        let json = r#"{"line_id":"product:a","name":"A","unit_price":2.5,"quantity":1}"#;
        let line: OrderLine = serde_json::from_str(json).unwrap();
        assert!(line.resolved.is_none());
    }
}
