//! Product API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shared::{Product, StockMovement};

use crate::core::ServerState;
use crate::db::repository::{ProductCreate, ProductRepository, ProductUpdate, StockMovementRepository};
use crate::stock::{StockAdjustment, adjust_stock};
use crate::utils::{AppResponse, AppResult, ok};

/// GET /api/products - list the catalog
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<Vec<Product>>> {
    let repo = ProductRepository::new(state.db.clone());
    let products = repo.find_all().await?;
    Ok(Json(products))
}

/// GET /api/products/:id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Product>> {
    let repo = ProductRepository::new(state.db.clone());
    let product = repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| crate::utils::AppError::NotFound(format!("Product {id}")))?;
    Ok(Json(product))
}

/// POST /api/products
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<ProductCreate>,
) -> AppResult<Json<Product>> {
    let repo = ProductRepository::new(state.db.clone());
    let product = repo.create(payload).await?;
    Ok(Json(product))
}

/// PUT /api/products/:id
pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<ProductUpdate>,
) -> AppResult<Json<Product>> {
    let repo = ProductRepository::new(state.db.clone());
    let product = repo.update(&id, payload).await?;
    Ok(Json(product))
}

/// DELETE /api/products/:id
pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<()>>> {
    let repo = ProductRepository::new(state.db.clone());
    repo.delete(&id).await?;
    Ok(ok(()))
}

/// POST /api/products/:id/adjust - audited manual stock correction
pub async fn adjust(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<StockAdjustment>,
) -> AppResult<Json<Product>> {
    let product = adjust_stock(&state.db, &id, &payload).await?;
    Ok(Json(product))
}

/// GET /api/products/:id/movements - audit trail for one product
pub async fn movements(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<StockMovement>>> {
    let repo = StockMovementRepository::new(state.db.clone());
    let movements = repo.find_by_product(&id).await?;
    Ok(Json(movements))
}
