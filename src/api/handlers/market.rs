//! Market Data API Handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::engine::SymbolSpec;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

fn unknown_symbol(symbol: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("unknown trading pair: {symbol}"),
            code: "UNKNOWN_SYMBOL".to_string(),
        }),
    )
}

#[derive(Debug, Deserialize)]
pub struct OrderbookQuery {
    pub depth: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct OrderbookResponse {
    pub symbol: String,
    pub bids: Vec<[String; 2]>, // [price, quantity]
    pub asks: Vec<[String; 2]>,
    /// Engine sequence at capture
    pub sequence: u64,
    pub timestamp: i64,
}

#[derive(Debug, Serialize)]
pub struct BboResponse {
    pub symbol: String,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub spread: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct TradesQuery {
    pub symbol: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct Trade {
    pub trade_id: String,
    pub symbol: String,
    pub price: String,
    pub quantity: String,
    pub side: String,
    pub sequence: u64,
}

#[derive(Debug, Serialize)]
pub struct TradesResponse {
    pub trades: Vec<Trade>,
}

#[derive(Debug, Serialize)]
pub struct SymbolsResponse {
    pub symbols: Vec<SymbolSpec>,
}

/// Get aggregated orderbook for a symbol
/// GET /orderbook/:symbol?depth=20
pub async fn get_orderbook(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<OrderbookQuery>,
) -> Result<Json<OrderbookResponse>, (StatusCode, Json<ErrorResponse>)> {
    let snapshot = state
        .engine
        .orderbook(&symbol, query.depth)
        .map_err(|_| unknown_symbol(&symbol))?;

    let to_strings = |levels: Vec<[Decimal; 2]>| -> Vec<[String; 2]> {
        levels
            .into_iter()
            .map(|[price, qty]| [price.to_string(), qty.to_string()])
            .collect()
    };

    Ok(Json(OrderbookResponse {
        symbol: snapshot.symbol,
        bids: to_strings(snapshot.bids),
        asks: to_strings(snapshot.asks),
        sequence: snapshot.timestamp,
        timestamp: chrono::Utc::now().timestamp_millis(),
    }))
}

/// Get best bid and offer for a symbol
/// GET /bbo/:symbol
pub async fn get_bbo(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<BboResponse>, (StatusCode, Json<ErrorResponse>)> {
    let bbo = state
        .engine
        .bbo(&symbol)
        .map_err(|_| unknown_symbol(&symbol))?;

    Ok(Json(BboResponse {
        symbol: bbo.symbol,
        bid: bbo.bid,
        ask: bbo.ask,
        spread: bbo.spread,
    }))
}

/// Get recent trades, optionally filtered by symbol
/// GET /trades?symbol=BTC-USDT&limit=100
pub async fn get_trades(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TradesQuery>,
) -> Json<TradesResponse> {
    let limit = query.limit.unwrap_or(100).min(1000);

    let trades = state
        .engine
        .recent_trades(query.symbol.as_deref(), limit)
        .iter()
        .map(|t| Trade {
            trade_id: t.trade_id.to_string(),
            symbol: t.symbol.clone(),
            price: t.price.to_string(),
            quantity: t.quantity.to_string(),
            side: t.aggressor_side.to_string(),
            sequence: t.timestamp,
        })
        .collect();

    Json(TradesResponse { trades })
}

/// List registered trading pairs
/// GET /symbols
pub async fn get_symbols(State(state): State<Arc<AppState>>) -> Json<SymbolsResponse> {
    let mut symbols = state.engine.symbols();
    symbols.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    Json(SymbolsResponse { symbols })
}
