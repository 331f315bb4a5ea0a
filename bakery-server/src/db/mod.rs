//! Database Module
//!
//! Owns the embedded SurrealDB instance (RocksDB on disk in production,
//! in-memory engine in tests) and applies the schema at startup.

pub mod repository;
pub mod txn;

use std::path::Path;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem, RocksDb};

use crate::utils::AppError;

const NAMESPACE: &str = "bakery";
const DATABASE: &str = "store";

/// Database service — owns the embedded SurrealDB handle
#[derive(Clone)]
pub struct DbService {
    pub db: Surreal<Db>,
}

impl DbService {
    /// Open the on-disk store under the given work directory
    pub async fn open(work_dir: &str) -> Result<Self, AppError> {
        let db_path = Path::new(work_dir).join("store.db");
        let db: Surreal<Db> = Surreal::new::<RocksDb>(db_path.as_path())
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database: {e}")))?;
        Self::init(db).await
    }

    /// Open a throwaway in-memory store (tests, demos)
    pub async fn open_memory() -> Result<Self, AppError> {
        let db: Surreal<Db> = Surreal::new::<Mem>(())
            .await
            .map_err(|e| AppError::Database(format!("Failed to open in-memory database: {e}")))?;
        Self::init(db).await
    }

    async fn init(db: Surreal<Db>) -> Result<Self, AppError> {
        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| AppError::Database(format!("Failed to select namespace: {e}")))?;

        // Schemaless tables; the index speeds up the child-sync dependents
        // lookup on every parent quantity change
        db.query(
            "DEFINE TABLE IF NOT EXISTS product SCHEMALESS;
             DEFINE TABLE IF NOT EXISTS order SCHEMALESS;
             DEFINE TABLE IF NOT EXISTS stock_movement SCHEMALESS;
             DEFINE INDEX IF NOT EXISTS product_parent ON product FIELDS stock.parent_id;",
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to define schema: {e}")))?;

        tracing::info!("Database ready (ns={}, db={})", NAMESPACE, DATABASE);
        Ok(Self { db })
    }
}
