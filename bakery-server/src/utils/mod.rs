//! Utility module — error types, logging, result aliases

pub mod error;
pub mod logger;
pub mod result;

pub use error::{AppError, AppResponse, ok};
pub use logger::init_logger;
pub use result::AppResult;
