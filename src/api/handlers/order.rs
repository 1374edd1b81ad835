//! Order API Handlers
//!
//! Order submission and cancellation over the matching engine. Validation
//! failures come back as 400 with a structured error body; an unfillable FOK
//! is a business rejection and comes back 200 with `success: false`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::{EngineError, Order, OrderSpec, OrderStatus, OrderType, Side, Trade};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitOrderRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    #[serde(default)]
    pub price: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Order state as returned to clients; decimals serialize as strings
#[derive(Debug, Serialize)]
pub struct OrderView {
    pub order_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<Decimal>,
    pub quantity: Decimal,
    pub filled_quantity: Decimal,
    pub remaining: Decimal,
    pub status: OrderStatus,
    /// Engine sequence assigned on acceptance
    pub sequence: u64,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            symbol: order.symbol.clone(),
            side: order.side,
            order_type: order.order_type,
            price: order.price,
            quantity: order.quantity,
            filled_quantity: order.filled_quantity(),
            remaining: order.remaining,
            status: order.status,
            sequence: order.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TradeView {
    pub trade_id: Uuid,
    pub symbol: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub maker_order_id: Uuid,
    pub taker_order_id: Uuid,
    pub aggressor_side: Side,
    pub sequence: u64,
}

impl From<&Trade> for TradeView {
    fn from(trade: &Trade) -> Self {
        Self {
            trade_id: trade.trade_id,
            symbol: trade.symbol.clone(),
            price: trade.price,
            quantity: trade.quantity,
            maker_order_id: trade.maker_order_id,
            taker_order_id: trade.taker_order_id,
            aggressor_side: trade.aggressor_side,
            sequence: trade.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitOrderResponse {
    pub success: bool,
    pub order: OrderView,
    pub trades: Vec<TradeView>,
    /// Wall-clock stamp for display; ordering is carried by `sequence`
    pub timestamp: i64,
}

#[derive(Debug, Serialize)]
pub struct CancelOrderResponse {
    pub success: bool,
    pub order_id: Uuid,
}

fn error_code(err: &EngineError) -> &'static str {
    match err {
        EngineError::UnknownSymbol(_) => "UNKNOWN_SYMBOL",
        EngineError::InvalidQuantity(_) => "INVALID_QUANTITY",
        EngineError::InvalidPrice(_) => "INVALID_PRICE",
        EngineError::MissingPrice(_) => "PRICE_REQUIRED",
        EngineError::ScaleViolation { .. } => "SCALE_VIOLATION",
        EngineError::DuplicateOrder(_) => "DUPLICATE_ORDER",
    }
}

/// Submit a new order
/// POST /orders
pub async fn submit_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitOrderRequest>,
) -> Result<Json<SubmitOrderResponse>, (StatusCode, Json<ErrorResponse>)> {
    let spec = OrderSpec {
        symbol: req.symbol,
        side: req.side,
        order_type: req.order_type,
        quantity: req.quantity,
        price: req.price,
    };

    let result = state.engine.submit(spec).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
                code: error_code(&e).to_string(),
            }),
        )
    })?;

    Ok(Json(SubmitOrderResponse {
        success: !result.is_rejected(),
        order: OrderView::from(&result.order),
        trades: result.trades.iter().map(TradeView::from).collect(),
        timestamp: chrono::Utc::now().timestamp_millis(),
    }))
}

/// Cancel a resting order
/// DELETE /orders/:symbol/:order_id
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path((symbol, order_id)): Path<(String, Uuid)>,
) -> Result<Json<CancelOrderResponse>, (StatusCode, Json<ErrorResponse>)> {
    let cancelled = state.engine.cancel(&symbol, order_id).map_err(|e| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: e.to_string(),
                code: error_code(&e).to_string(),
            }),
        )
    })?;

    if !cancelled {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("order not found: {order_id}"),
                code: "ORDER_NOT_FOUND".to_string(),
            }),
        ));
    }

    Ok(Json(CancelOrderResponse {
        success: true,
        order_id,
    }))
}
