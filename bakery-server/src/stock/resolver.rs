//! Dependency Resolver
//!
//! Maps an order line's identity to the ledger entry that must actually
//! move. Three shapes exist:
//!
//! - a derived pack line moves the *parent's* flat stock by
//!   `quantity * units_to_deduct`
//! - a variant line (`{productId}-{variantName}`) moves that variant's stock
//! - everything else moves the product's flat stock
//!
//! Variant identity is recovered from the id suffix when the exact suffix
//! matches a declared variant name, falling back to the `(Name)` pattern in
//! the display name — product ids may legitimately contain hyphens, so the
//! suffix split is tried right-to-left.

use rust_decimal::Decimal;
use shared::{Product, ResolvedTarget, StockError, StockKind, StockResult, quantity};

use crate::db::repository::ProductRepository;

/// A line mapped to its ledger target
#[derive(Debug, Clone)]
pub struct ResolvedLine {
    /// The product actually sold (price, unit kind)
    pub sellable: Product,
    /// The document whose ledger entry moves (the parent for pack lines)
    pub ledger: Product,
    pub target: ResolvedTarget,
    /// Requested sellable quantity
    pub requested: Decimal,
    /// Effective ledger delta
    pub delta: Decimal,
}

/// Extract a variant name from a `Name (Variant)` display string
pub fn variant_from_display(display_name: &str) -> Option<&str> {
    let trimmed = display_name.trim_end();
    if !trimmed.ends_with(')') {
        return None;
    }
    let open = trimmed.rfind('(')?;
    let inner = &trimmed[open + 1..trimmed.len() - 1];
    let inner = inner.trim();
    (!inner.is_empty()).then_some(inner)
}

/// Candidate `(product id, variant name)` splits of a composite line id,
/// rightmost hyphen first
fn suffix_splits(line_id: &str) -> impl Iterator<Item = (&str, &str)> {
    line_id
        .match_indices('-')
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .map(|(i, _)| (&line_id[..i], &line_id[i + 1..]))
        .filter(|(prefix, suffix)| !prefix.is_empty() && !suffix.is_empty())
}

/// Resolve one order line against the current catalog
pub async fn resolve_line(
    repo: &ProductRepository,
    line_id: &str,
    display_name: &str,
    requested: Decimal,
) -> StockResult<ResolvedLine> {
    // 1. The line id names a product directly
    if let Some(product) = find(repo, line_id).await? {
        return resolve_product(repo, product, line_id, display_name, requested).await;
    }

    // 2. Composite id: try `{productId}-{variantName}` splits right-to-left,
    //    stopping at the first prefix that names a product
    for (prefix, suffix) in suffix_splits(line_id) {
        let Some(product) = find(repo, prefix).await? else {
            continue;
        };
        if !matches!(product.stock, StockKind::Variants { .. }) {
            // The id split landed on a product without variants; treat the
            // whole line id as unknown rather than silently selling the prefix
            return Err(StockError::ProductNotFound(line_id.to_string()));
        }
        // Exact suffix match wins; otherwise the display name may carry the
        // variant (ids with hyphens inside the variant name)
        let name = if product.stock.variant(suffix).is_some() {
            suffix.to_string()
        } else if let Some(display) = variant_from_display(display_name)
            && product.stock.variant(display).is_some()
        {
            display.to_string()
        } else {
            return Err(StockError::VariantNotFound {
                product_id: prefix.to_string(),
                variant: suffix.to_string(),
            });
        };
        validate(&product, line_id, requested)?;
        let target = ResolvedTarget::Variant {
            product_id: product.id.clone().unwrap_or_default(),
            variant: name,
        };
        return Ok(ResolvedLine {
            ledger: product.clone(),
            sellable: product,
            target,
            requested,
            delta: requested,
        });
    }

    Err(StockError::ProductNotFound(line_id.to_string()))
}

async fn resolve_product(
    repo: &ProductRepository,
    product: Product,
    line_id: &str,
    display_name: &str,
    requested: Decimal,
) -> StockResult<ResolvedLine> {
    validate(&product, line_id, requested)?;
    let product_id = product.id.clone().unwrap_or_default();

    match &product.stock {
        // Pack: the parent's flat ledger moves; packs have no variants
        StockKind::Derived {
            parent_id,
            units_to_deduct,
            ..
        } => {
            let parent = find(repo, parent_id)
                .await?
                .ok_or_else(|| StockError::ProductNotFound(parent_id.clone()))?;
            if parent.stock.is_derived() || parent.stock.flat_quantity().is_none() {
                return Err(StockError::Validation(format!(
                    "parent {parent_id} cannot back pack {product_id}"
                )));
            }
            let target = ResolvedTarget::Parent {
                parent_id: parent.id.clone().unwrap_or_default(),
                units_to_deduct: *units_to_deduct,
            };
            let delta = quantity::mul(requested, *units_to_deduct);
            Ok(ResolvedLine {
                sellable: product,
                ledger: parent,
                target,
                requested,
                delta,
            })
        }
        // Variant product addressed by bare id: the display name must carry
        // the variant; flat fallback would move a ledger that doesn't exist
        StockKind::Variants { .. } => {
            let Some(display) = variant_from_display(display_name) else {
                return Err(StockError::VariantNotFound {
                    product_id,
                    variant: "<none>".to_string(),
                });
            };
            if product.stock.variant(display).is_none() {
                return Err(StockError::VariantNotFound {
                    product_id,
                    variant: display.to_string(),
                });
            }
            let target = ResolvedTarget::Variant {
                product_id,
                variant: display.to_string(),
            };
            Ok(ResolvedLine {
                ledger: product.clone(),
                sellable: product,
                target,
                requested,
                delta: requested,
            })
        }
        StockKind::Simple { .. } => {
            let target = ResolvedTarget::Flat { product_id };
            Ok(ResolvedLine {
                ledger: product.clone(),
                sellable: product,
                target,
                requested,
                delta: requested,
            })
        }
    }
}

fn validate(product: &Product, line_id: &str, requested: Decimal) -> StockResult<()> {
    quantity::validate_requested(requested, product.unit_kind.is_integral(), line_id)
}

async fn find(repo: &ProductRepository, id: &str) -> StockResult<Option<Product>> {
    repo.find_by_id(id)
        .await
        .map_err(|e| StockError::Store(e.to_string()))
}
