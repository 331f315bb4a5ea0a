use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use shared::StockMovement;

use crate::core::ServerState;
use crate::db::repository::StockMovementRepository;
use crate::utils::AppResult;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

/// GET /api/stock-movements - audit trail, newest first
pub async fn list(
    State(state): State<ServerState>,
    Query(page): Query<Pagination>,
) -> AppResult<Json<Vec<StockMovement>>> {
    let repo = StockMovementRepository::new(state.db.clone());
    let movements = repo
        .find_all(page.limit.clamp(1, 1000), page.offset.max(0))
        .await?;
    Ok(Json(movements))
}
