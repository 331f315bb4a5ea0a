//! Checkout API module

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/checkout", checkout_routes())
}

fn checkout_routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::checkout))
        .route("/{id}/payment-approved", post(handler::payment_approved))
}
