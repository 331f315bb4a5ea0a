//! Quantity arithmetic using rust_decimal for precision
//!
//! Ledger quantities are decimal with up to 3 fractional digits (weight
//! products sell in kilograms). All arithmetic rounds back to 3 places after
//! each operation so repeated deduct/restock cycles never accumulate drift.

use rust_decimal::prelude::*;

use crate::error::StockError;

/// Rounding precision for stock quantities (3 decimal places, half-up)
pub const QUANTITY_PLACES: u32 = 3;

/// Maximum allowed quantity per order line
pub const MAX_LINE_QUANTITY: Decimal = Decimal::from_parts(9999, 0, 0, false, 0);

/// Round a quantity to ledger precision.
#[inline]
pub fn round(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(
        QUANTITY_PLACES,
        rust_decimal::RoundingStrategy::MidpointAwayFromZero,
    )
}

/// `a + b`, rounded to ledger precision.
#[inline]
pub fn add(a: Decimal, b: Decimal) -> Decimal {
    round(a + b)
}

/// `a - b`, rounded to ledger precision.
#[inline]
pub fn sub(a: Decimal, b: Decimal) -> Decimal {
    round(a - b)
}

/// `a - b`, floor-clamped at zero.
///
/// Used by order reactivation: re-deducting must never drive the ledger
/// negative, even if stock was corrected downwards while the order sat
/// cancelled.
#[inline]
pub fn sub_clamped(a: Decimal, b: Decimal) -> Decimal {
    round(a - b).max(Decimal::ZERO)
}

/// `a * b`, rounded to ledger precision.
#[inline]
pub fn mul(a: Decimal, b: Decimal) -> Decimal {
    round(a * b)
}

/// Derived-product projection: `floor(parent_quantity / units_to_deduct)`.
///
/// A pack SKU's quantity is always a whole number of packs; partial packs do
/// not exist. Returns zero for a non-positive parent quantity.
pub fn derived_quantity(parent_quantity: Decimal, units_to_deduct: Decimal) -> Decimal {
    if units_to_deduct <= Decimal::ZERO || parent_quantity <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (parent_quantity / units_to_deduct).floor()
}

/// Validate a requested order-line quantity.
///
/// Weight products accept up to 3 decimal places; unit products must be
/// integral. Zero and negative quantities are rejected on every path.
pub fn validate_requested(
    quantity: Decimal,
    integral: bool,
    line_id: &str,
) -> Result<(), StockError> {
    if quantity <= Decimal::ZERO {
        return Err(StockError::Validation(format!(
            "quantity must be positive for line {line_id}, got {quantity}"
        )));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(StockError::Validation(format!(
            "quantity exceeds maximum allowed ({MAX_LINE_QUANTITY}) for line {line_id}"
        )));
    }
    if quantity != round(quantity) {
        return Err(StockError::Validation(format!(
            "quantity for line {line_id} has more than {QUANTITY_PLACES} decimal places"
        )));
    }
    if integral && quantity.fract() != Decimal::ZERO {
        return Err(StockError::Validation(format!(
            "unit-counted product in line {line_id} requires a whole quantity, got {quantity}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn arithmetic_rounds_to_three_places() {
        assert_eq!(add(d("0.1"), d("0.0005")), d("0.101"));
        assert_eq!(sub(d("0.1"), d("0.0005")), d("0.100"));
        // Midpoints round up, not to even
        assert_eq!(round(d("0.0025")), d("0.003"));
        assert_eq!(round(d("0.0035")), d("0.004"));
    }

    #[test]
    fn repeated_cycles_do_not_drift() {
        let start = d("20.000");
        let delta = d("1.333");
        let mut q = start;
        for _ in 0..100 {
            q = sub(q, delta);
            q = add(q, delta);
        }
        assert_eq!(q, start);
    }

    #[test]
    fn clamp_floors_at_zero() {
        assert_eq!(sub_clamped(d("1.5"), d("2")), Decimal::ZERO);
        assert_eq!(sub_clamped(d("3"), d("2")), d("1"));
    }

    #[test]
    fn derived_projection_floors() {
        assert_eq!(derived_quantity(d("20"), d("2")), d("10"));
        assert_eq!(derived_quantity(d("15"), d("2")), d("7"));
        assert_eq!(derived_quantity(d("1"), d("2")), Decimal::ZERO);
        assert_eq!(derived_quantity(d("-3"), d("2")), Decimal::ZERO);
        assert_eq!(derived_quantity(d("10"), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn unit_products_require_whole_quantities() {
        assert!(validate_requested(d("2"), true, "a").is_ok());
        assert!(validate_requested(d("2.5"), true, "a").is_err());
        assert!(validate_requested(d("2.5"), false, "a").is_ok());
        assert!(validate_requested(d("0"), false, "a").is_err());
        assert!(validate_requested(d("0.0001"), false, "a").is_err());
    }
}
