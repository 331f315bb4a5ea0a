//! Checkout API Handlers
//!
//! Order creation reserves stock before any payment happens; the
//! payment-approval webhook only flips a flag and never touches the ledger.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use shared::Order;
use validator::Validate;

use crate::core::ServerState;
use crate::db::repository::OrderRepository;
use crate::stock::CheckoutRequest;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Validate, serde::Deserialize)]
pub struct CheckoutPayload {
    #[validate(length(min = 1, message = "order has no lines"), nested)]
    pub lines: Vec<LinePayload>,
    #[serde(default)]
    pub customer: shared::CustomerInfo,
    pub channel: shared::SalesChannel,
}

// Serialize as well: validator embeds the offending value in error params
#[derive(Debug, Validate, serde::Serialize, serde::Deserialize)]
pub struct LinePayload {
    #[validate(length(min = 1))]
    pub line_id: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: rust_decimal::Decimal,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
}

/// POST /api/checkout - all-or-nothing order creation
pub async fn checkout(
    State(state): State<ServerState>,
    Json(payload): Json<CheckoutPayload>,
) -> AppResult<Json<CheckoutResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let request = CheckoutRequest {
        lines: payload
            .lines
            .into_iter()
            .map(|l| crate::stock::CheckoutLine {
                line_id: l.line_id,
                name: l.name,
                quantity: l.quantity,
            })
            .collect(),
        customer: payload.customer,
        channel: payload.channel,
    };
    let outcome = state.deduction.deduct(&request).await?;
    Ok(Json(CheckoutResponse {
        order_id: outcome.order_id,
    }))
}

/// POST /api/checkout/:id/payment-approved - payment gateway webhook.
/// Stock was reserved at order creation; re-deducting here would double
/// count, so this only records the approval.
pub async fn payment_approved(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let repo = OrderRepository::new(state.db.clone());
    let order = repo.mark_payment_approved(&id).await?;
    Ok(Json(order))
}
