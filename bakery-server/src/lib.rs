//! Bakery storefront server
//!
//! Inventory core for a bakery storefront and back office: a stock ledger
//! on product documents, a transactional check-and-deduct checkout shared by
//! the web shop and the POS terminals, reversal on order cancellation, and
//! derived pack quantities kept in sync with their parent stock.

pub mod api;
pub mod core;
pub mod db;
pub mod pos;
pub mod stock;
pub mod utils;

pub use crate::core::{Config, Server, ServerState};
pub use utils::{AppError, AppResult, init_logger};

/// Load .env, read configuration, and initialize logging; called once at
/// startup before anything else touches the environment
pub fn setup_environment() -> Config {
    dotenv::dotenv().ok();
    let config = Config::from_env();
    if config.log_to_file {
        let log_dir = std::path::Path::new(&config.work_dir).join("logs");
        let _ = std::fs::create_dir_all(&log_dir);
        utils::logger::init_logger_with_file(None, log_dir.to_str());
    } else {
        init_logger();
    }
    config
}
