use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::AppState;

pub fn create_router(_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        // Orders
        .route("/orders", post(handlers::order::submit_order))
        .route(
            "/orders/:symbol/:order_id",
            delete(handlers::order::cancel_order),
        )
        // Market data
        .route("/orderbook/:symbol", get(handlers::market::get_orderbook))
        .route("/bbo/:symbol", get(handlers::market::get_bbo))
        .route("/trades", get(handlers::market::get_trades))
        .route("/symbols", get(handlers::market::get_symbols))
}
