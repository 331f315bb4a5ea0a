//! Product Repository

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{Product, StockKind, UnitKind, quantity};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use super::{BaseRepository, RepoError, RepoResult, strip_table_prefix};
use crate::db::txn::{LedgerTxn, TxnError};

const PRODUCT_TABLE: &str = "product";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCreate {
    /// Caller-supplied key; a UUID is generated when absent
    pub id: Option<String>,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub wholesale_price: Option<Decimal>,
    pub unit_kind: Option<UnitKind>,
    pub is_visible: Option<bool>,
    pub stock: StockKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub wholesale_price: Option<Decimal>,
    pub unit_kind: Option<UnitKind>,
    pub is_visible: Option<bool>,
    /// Replaces the whole stock shape; derived projections are recomputed
    pub stock: Option<StockKind>,
}

// =============================================================================
// Product Repository
// =============================================================================

#[derive(Clone)]
pub struct ProductRepository {
    base: BaseRepository,
}

impl ProductRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub fn db(&self) -> &Surreal<Db> {
        self.base.db()
    }

    /// Find all products
    pub async fn find_all(&self) -> RepoResult<Vec<Product>> {
        let products: Vec<Product> = self
            .base
            .db()
            .query("SELECT *, record::id(id) AS id FROM product ORDER BY name")
            .await?
            .take(0)?;
        Ok(products)
    }

    /// Find product by id (accepts `product:key` or bare `key`)
    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Product>> {
        let key = strip_table_prefix(PRODUCT_TABLE, id).to_string();
        let product: Option<Product> = self
            .base
            .db()
            .query("SELECT *, record::id(id) AS id FROM ONLY type::thing('product', $key)")
            .bind(("key", key))
            .await?
            .take(0)?;
        Ok(product)
    }

    /// Find every derived product that consumes the given parent
    pub async fn find_dependents(&self, parent_id: &str) -> RepoResult<Vec<Product>> {
        let parent = strip_table_prefix(PRODUCT_TABLE, parent_id).to_string();
        let products: Vec<Product> = self
            .base
            .db()
            .query(
                "SELECT *, record::id(id) AS id FROM product \
                 WHERE stock.kind = 'DERIVED' AND stock.parent_id = $parent",
            )
            .bind(("parent", parent))
            .await?
            .take(0)?;
        Ok(products)
    }

    /// Create a new product
    pub async fn create(&self, data: ProductCreate) -> RepoResult<Product> {
        let key = data
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        if self.find_by_id(&key).await?.is_some() {
            return Err(RepoError::Duplicate(format!("Product {} already exists", key)));
        }

        let stock = self.normalize_stock(&key, data.stock).await?;

        let mut product = Product::new(data.name, data.price, stock);
        product.id = Some(key);
        product.wholesale_price = data.wholesale_price;
        product.unit_kind = data.unit_kind.unwrap_or_default();
        product.is_visible = data.is_visible.unwrap_or(true);

        self.insert_raw(&product).await?;
        Ok(product)
    }

    /// Update a product; ledger-safe via version CAS
    pub async fn update(&self, id: &str, data: ProductUpdate) -> RepoResult<Product> {
        let mut product = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Product {} not found", id)))?;
        let key = product.id.clone().unwrap_or_default();

        if let Some(v) = data.name {
            product.name = v;
        }
        if let Some(v) = data.price {
            product.price = v;
        }
        if let Some(v) = data.wholesale_price {
            product.wholesale_price = Some(v);
        }
        if let Some(v) = data.unit_kind {
            product.unit_kind = v;
        }
        if let Some(v) = data.is_visible {
            product.is_visible = v;
        }
        if let Some(stock) = data.stock {
            if stock.is_derived() && !self.find_dependents(&key).await?.is_empty() {
                return Err(RepoError::Validation(format!(
                    "Product {} has dependent packs and cannot itself become derived",
                    key
                )));
            }
            product.stock = self.normalize_stock(&key, stock).await?;
        }

        let mut txn = LedgerTxn::new();
        txn.cas_product(&product)
            .map_err(|e| RepoError::Database(e.to_string()))?;
        match txn.commit(self.base.db()).await {
            Ok(()) => {
                product.version += 1;
                Ok(product)
            }
            Err(TxnError::Conflict) => Err(RepoError::Conflict),
            Err(TxnError::Db(msg)) => Err(RepoError::Database(msg)),
        }
    }

    /// Hard delete a product
    pub async fn delete(&self, id: &str) -> RepoResult<()> {
        let key = strip_table_prefix(PRODUCT_TABLE, id).to_string();
        if !self.find_dependents(&key).await?.is_empty() {
            return Err(RepoError::Validation(format!(
                "Product {} still has dependent packs",
                key
            )));
        }
        if self.find_by_id(&key).await?.is_none() {
            return Err(RepoError::NotFound(format!("Product {} not found", key)));
        }
        self.base
            .db()
            .query("DELETE type::thing('product', $key) RETURN NONE")
            .bind(("key", key))
            .await?
            .check()?;
        Ok(())
    }

    /// Write a full product document without a version check.
    ///
    /// Seeding/creation only — concurrent ledger writes go through
    /// [`LedgerTxn::cas_product`].
    pub async fn insert_raw(&self, product: &Product) -> RepoResult<()> {
        let key = product
            .id
            .clone()
            .ok_or_else(|| RepoError::Validation("product requires an id".into()))?;
        let mut doc = serde_json::to_value(product)
            .map_err(|e| RepoError::Database(e.to_string()))?;
        if let Some(obj) = doc.as_object_mut() {
            obj.remove("id");
        }
        self.base
            .db()
            .query("CREATE type::thing('product', $key) CONTENT $doc")
            .bind(("key", key))
            .bind(("doc", doc))
            .await?
            .check()?;
        Ok(())
    }

    /// Validate a stock shape and restore its invariants: rounded
    /// quantities, `in_stock` in lockstep, derived projections recomputed
    /// from the parent's current ledger.
    async fn normalize_stock(&self, key: &str, stock: StockKind) -> RepoResult<StockKind> {
        match stock {
            StockKind::Simple { quantity: q, .. } => {
                if q < Decimal::ZERO {
                    return Err(RepoError::Validation("stock quantity cannot be negative".into()));
                }
                Ok(StockKind::simple(quantity::round(q)))
            }
            StockKind::Variants { mut variants } => {
                if variants.is_empty() {
                    return Err(RepoError::Validation("variants cannot be empty".into()));
                }
                let mut seen = std::collections::HashSet::new();
                for v in &mut variants {
                    if !seen.insert(v.name.clone()) {
                        return Err(RepoError::Validation(format!(
                            "duplicate variant name '{}'",
                            v.name
                        )));
                    }
                    if v.quantity < Decimal::ZERO {
                        return Err(RepoError::Validation(format!(
                            "variant '{}' quantity cannot be negative",
                            v.name
                        )));
                    }
                    v.quantity = quantity::round(v.quantity);
                    v.in_stock = v.quantity > Decimal::ZERO;
                }
                Ok(StockKind::Variants { variants })
            }
            StockKind::Derived {
                parent_id,
                units_to_deduct,
                ..
            } => {
                if units_to_deduct <= Decimal::ZERO {
                    return Err(RepoError::Validation(
                        "units_to_deduct must be positive".into(),
                    ));
                }
                let parent_key = strip_table_prefix(PRODUCT_TABLE, &parent_id).to_string();
                if parent_key == key {
                    return Err(RepoError::Validation(
                        "a product cannot derive from itself".into(),
                    ));
                }
                let parent = self
                    .find_by_id(&parent_key)
                    .await?
                    .ok_or_else(|| RepoError::NotFound(format!("Parent product {} not found", parent_key)))?;
                // Dependency graph has depth exactly 1
                if parent.stock.is_derived() {
                    return Err(RepoError::Validation(format!(
                        "parent {} is itself derived; dependency chains are not allowed",
                        parent_key
                    )));
                }
                let parent_quantity = parent.stock.flat_quantity().ok_or_else(|| {
                    RepoError::Validation(format!(
                        "parent {} has variant stock and cannot back a pack",
                        parent_key
                    ))
                })?;
                let projected = quantity::derived_quantity(parent_quantity, units_to_deduct);
                Ok(StockKind::Derived {
                    parent_id: parent_key,
                    units_to_deduct,
                    in_stock: projected > Decimal::ZERO,
                    quantity: projected,
                })
            }
        }
    }
}
