//! Unified Error Handling
//!
//! Application-wide error type and response structure. Stock errors keep
//! their detail through the HTTP edge: insufficient stock always names the
//! specific line and the real available quantity, never a generic error.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::StockError;
use tracing::error;

/// Unified API response structure
#[derive(Debug, Serialize)]
pub struct AppResponse<T> {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Application-level error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== Business Logic Errors ==========
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("insufficient stock for '{name}'")]
    InsufficientStock {
        line_id: String,
        name: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Concurrent update conflict, try again")]
    TryAgain,

    // ========== System Errors ==========
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Wire payload for an insufficient-stock rejection
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsufficientStockBody {
    line_id: String,
    name: String,
    #[serde(with = "rust_decimal::serde::float")]
    requested: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    available: Decimal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::InsufficientStock {
                line_id,
                name,
                requested,
                available,
            } => {
                let message =
                    format!("Insufficient stock for '{name}': {available} available, {requested} requested");
                let body = Json(AppResponse {
                    code: "E4001".to_string(),
                    message,
                    data: Some(InsufficientStockBody {
                        line_id,
                        name,
                        requested,
                        available,
                    }),
                });
                (StatusCode::CONFLICT, body).into_response()
            }
            other => {
                let (status, code, message) = match &other {
                    AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "E0003", msg.clone()),
                    AppError::Conflict(msg) => (StatusCode::CONFLICT, "E0004", msg.clone()),
                    AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "E0002", msg.clone()),
                    AppError::TryAgain => (
                        StatusCode::CONFLICT,
                        "E4002",
                        "Stock is being updated concurrently, please try again".to_string(),
                    ),
                    AppError::Database(msg) => {
                        error!(target: "database", error = %msg, "Database error occurred");
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "E9002",
                            "Database error".to_string(),
                        )
                    }
                    AppError::Internal(msg) => {
                        error!(target: "internal", error = %msg, "Internal error occurred");
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "E9001",
                            "Internal server error".to_string(),
                        )
                    }
                    AppError::InsufficientStock { .. } => unreachable!(),
                };

                let body = Json(AppResponse::<()> {
                    code: code.to_string(),
                    message,
                    data: None,
                });
                (status, body).into_response()
            }
        }
    }
}

impl From<StockError> for AppError {
    fn from(e: StockError) -> Self {
        match e {
            StockError::InsufficientStock {
                line_id,
                name,
                requested,
                available,
            } => AppError::InsufficientStock {
                line_id,
                name,
                requested,
                available,
            },
            // A vanished product/variant is reported as unsellable, not as a
            // distinct UI path
            StockError::ProductNotFound(id) => AppError::InsufficientStock {
                line_id: id.clone(),
                name: id,
                requested: Decimal::ZERO,
                available: Decimal::ZERO,
            },
            StockError::VariantNotFound { product_id, variant } => AppError::InsufficientStock {
                line_id: format!("{product_id}-{variant}"),
                name: format!("{product_id} ({variant})"),
                requested: Decimal::ZERO,
                available: Decimal::ZERO,
            },
            StockError::TransactionConflict => AppError::TryAgain,
            StockError::Validation(msg) => AppError::Validation(msg),
            StockError::Store(msg) => AppError::Database(msg),
        }
    }
}

impl From<crate::db::repository::RepoError> for AppError {
    fn from(e: crate::db::repository::RepoError) -> Self {
        use crate::db::repository::RepoError;
        match e {
            RepoError::NotFound(msg) => AppError::NotFound(msg),
            RepoError::Duplicate(msg) => AppError::Conflict(msg),
            RepoError::Validation(msg) => AppError::Validation(msg),
            RepoError::Conflict => AppError::TryAgain,
            RepoError::Database(msg) => AppError::Database(msg),
        }
    }
}

// ========== Helper functions ==========

/// Create a successful response
pub fn ok<T: Serialize>(data: T) -> Json<AppResponse<T>> {
    Json(AppResponse {
        code: "E0000".to_string(),
        message: "Success".to_string(),
        data: Some(data),
    })
}
