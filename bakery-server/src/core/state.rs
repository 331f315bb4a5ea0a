use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::core::Config;
use crate::db::DbService;
use crate::stock::{DeductionEngine, ReversalEngine};

#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub db: Surreal<Db>,
    pub deduction: DeductionEngine,
    pub reversal: ReversalEngine,
}

impl ServerState {
    pub async fn initialize(config: &Config) -> Result<Self, crate::utils::AppError> {
        // 1. Open the embedded store under the work directory
        std::fs::create_dir_all(&config.work_dir)
            .map_err(|e| crate::utils::AppError::Internal(format!("work dir: {e}")))?;
        let db_service = DbService::open(&config.work_dir).await?;
        let db = db_service.db;

        // 2. Wire up the stock engines over the shared handle
        let deduction = DeductionEngine::new(db.clone());
        let reversal = ReversalEngine::new(db.clone());

        Ok(Self {
            config: config.clone(),
            db,
            deduction,
            reversal,
        })
    }

    /// In-memory state for tests
    pub async fn for_tests() -> Self {
        let db = DbService::open_memory()
            .await
            .expect("in-memory store")
            .db;
        Self {
            config: Config {
                work_dir: String::new(),
                http_port: 0,
                environment: "test".into(),
                log_to_file: false,
            },
            deduction: DeductionEngine::new(db.clone()),
            reversal: ReversalEngine::new(db.clone()),
            db,
        }
    }
}
