//! Order API Handlers
//!
//! Status changes route through the reversal engine, which restocks or
//! re-deducts when the transition crosses the cancelled boundary.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::{Order, OrderStatus};

use crate::core::ServerState;
use crate::db::repository::OrderRepository;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct StatusPayload {
    pub status: OrderStatus,
}

/// GET /api/orders - newest first
pub async fn list(
    State(state): State<ServerState>,
    Query(page): Query<Pagination>,
) -> AppResult<Json<Vec<Order>>> {
    let repo = OrderRepository::new(state.db.clone());
    let orders = repo.find_all(page.limit.clamp(1, 500), page.offset.max(0)).await?;
    Ok(Json(orders))
}

/// GET /api/orders/:id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let repo = OrderRepository::new(state.db.clone());
    let order = repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {id}")))?;
    Ok(Json(order))
}

/// PUT /api/orders/:id/status
pub async fn set_status(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<StatusPayload>,
) -> AppResult<Json<Order>> {
    let order = state.reversal.apply_status_change(&id, payload.status).await?;
    Ok(Json(order))
}
