//! Product Model
//!
//! A product's stock shape is a tagged variant: flat stock, per-variant
//! stock, or a derived pack whose quantity is a projection of its parent's.
//! The tag makes the "either flat or variants, never both" rule a type-level
//! guarantee instead of a field-checking discipline.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::quantity;

/// How a product is measured at the counter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitKind {
    /// Counted in whole units
    #[default]
    Unit,
    /// Sold by weight in kilograms, up to 3 decimal places
    Weight,
}

impl UnitKind {
    /// Whether requested quantities must be whole numbers
    pub fn is_integral(&self) -> bool {
        matches!(self, UnitKind::Unit)
    }
}

/// A named variant of a product with its own ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Variant {
    /// Unique within the product
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    pub in_stock: bool,
    /// Override image for this variant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Variant {
    pub fn new(name: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            name: name.into(),
            in_stock: quantity > Decimal::ZERO,
            quantity,
            image: None,
        }
    }
}

/// Stock shape of a product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockKind {
    /// Single flat quantity
    Simple {
        #[serde(with = "rust_decimal::serde::float")]
        quantity: Decimal,
        in_stock: bool,
    },
    /// Per-variant quantities; the list is non-empty and names are unique
    Variants { variants: Vec<Variant> },
    /// Pack SKU: one unit consumes `units_to_deduct` units of the parent's
    /// flat stock. `quantity` is the persisted projection
    /// `floor(parent / units_to_deduct)` and is never edited directly.
    Derived {
        parent_id: String,
        #[serde(with = "rust_decimal::serde::float")]
        units_to_deduct: Decimal,
        #[serde(with = "rust_decimal::serde::float")]
        quantity: Decimal,
        in_stock: bool,
    },
}

impl StockKind {
    pub fn simple(quantity: Decimal) -> Self {
        StockKind::Simple {
            in_stock: quantity > Decimal::ZERO,
            quantity,
        }
    }

    pub fn derived(parent_id: impl Into<String>, units_to_deduct: Decimal) -> Self {
        StockKind::Derived {
            parent_id: parent_id.into(),
            units_to_deduct,
            quantity: Decimal::ZERO,
            in_stock: false,
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, StockKind::Derived { .. })
    }

    /// Flat quantity for Simple/Derived shapes; None for variant products
    pub fn flat_quantity(&self) -> Option<Decimal> {
        match self {
            StockKind::Simple { quantity, .. } | StockKind::Derived { quantity, .. } => {
                Some(*quantity)
            }
            StockKind::Variants { .. } => None,
        }
    }

    /// Look up a variant by exact name
    pub fn variant(&self, name: &str) -> Option<&Variant> {
        match self {
            StockKind::Variants { variants } => variants.iter().find(|v| v.name == name),
            _ => None,
        }
    }
}

/// Product entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Option<String>,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub wholesale_price: Option<Decimal>,
    #[serde(default)]
    pub unit_kind: UnitKind,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    pub stock: StockKind,
    /// Optimistic concurrency counter, bumped on every ledger write
    #[serde(default)]
    pub version: i64,
}

fn default_true() -> bool {
    true
}

impl Product {
    pub fn new(name: impl Into<String>, price: Decimal, stock: StockKind) -> Self {
        Self {
            id: None,
            name: name.into(),
            price,
            wholesale_price: None,
            unit_kind: UnitKind::Unit,
            is_visible: true,
            stock,
            version: 0,
        }
    }

    /// Apply a flat-stock mutation, keeping `in_stock` in lockstep with the
    /// quantity. Panics never; variant products are left untouched (callers
    /// mutate variants through [`Product::set_variant_quantity`]).
    pub fn set_flat_quantity(&mut self, new_quantity: Decimal) {
        let new_quantity = quantity::round(new_quantity);
        match &mut self.stock {
            StockKind::Simple { quantity, in_stock }
            | StockKind::Derived {
                quantity, in_stock, ..
            } => {
                *quantity = new_quantity;
                *in_stock = new_quantity > Decimal::ZERO;
            }
            StockKind::Variants { .. } => {}
        }
    }

    /// Apply a variant-stock mutation; returns false if the variant is gone.
    pub fn set_variant_quantity(&mut self, name: &str, new_quantity: Decimal) -> bool {
        let new_quantity = quantity::round(new_quantity);
        if let StockKind::Variants { variants } = &mut self.stock
            && let Some(v) = variants.iter_mut().find(|v| v.name == name)
        {
            v.quantity = new_quantity;
            v.in_stock = new_quantity > Decimal::ZERO;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn flat_mutation_keeps_in_stock_in_lockstep() {
        let mut p = Product::new("Baguette", d("1.20"), StockKind::simple(d("5")));
        p.set_flat_quantity(Decimal::ZERO);
        assert_eq!(p.stock, StockKind::Simple { quantity: Decimal::ZERO, in_stock: false });
        p.set_flat_quantity(d("0.001"));
        assert!(matches!(p.stock, StockKind::Simple { in_stock: true, .. }));
    }

    #[test]
    fn variant_mutation_flips_in_stock() {
        let mut p = Product::new(
            "T-Shirt",
            d("10"),
            StockKind::Variants {
                variants: vec![Variant::new("Red", d("5")), Variant::new("Blue", d("0"))],
            },
        );
        assert!(p.set_variant_quantity("Red", Decimal::ZERO));
        assert!(!p.stock.variant("Red").unwrap().in_stock);
        assert!(!p.set_variant_quantity("Green", d("1")));
    }

    #[test]
    fn decimal_fields_use_json_numbers_on_the_wire() {
        let json = r#"{
            "id": "flour",
            "name": "Flour",
            "price": 2.5,
            "stock": { "kind": "SIMPLE", "quantity": 12.5, "in_stock": true }
        }"#;
        let p: Product = serde_json::from_str(json).unwrap();
        assert_eq!(p.price, d("2.5"));
        assert_eq!(p.stock.flat_quantity(), Some(d("12.5")));

        let back = serde_json::to_value(&p).unwrap();
        assert!(back["price"].is_number());
        assert_eq!(back["stock"]["quantity"], serde_json::json!(12.5));
    }

    #[test]
    fn stock_kind_round_trips_through_serde() {
        let kinds = vec![
            StockKind::simple(d("3.25")),
            StockKind::Variants { variants: vec![Variant::new("Red", d("1"))] },
            StockKind::derived("product:flour", d("2")),
        ];
        for kind in kinds {
            let json = serde_json::to_string(&kind).unwrap();
            let back: StockKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
    }
}
