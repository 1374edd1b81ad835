//! Matching Engine
//!
//! Routes orders to per-symbol books, assigns ids and sequence timestamps,
//! validates submissions against the symbol's scales, keeps the bounded
//! recent-trades tail, and owns the event fan-out.

use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::metrics;

use super::events::EventBus;
use super::history::TradeTail;
use super::orderbook::OrderBook;
use super::types::{
    Bbo, BookSnapshot, EngineError, EngineSnapshot, Order, OrderSpec, OrderStatus, SubmitResult,
    SymbolSpec, Trade,
};

/// Default recent-trades tail size
pub const DEFAULT_RECENT_TRADES_CAP: usize = 1000;
/// Default snapshot depth
pub const DEFAULT_DEPTH: usize = 20;

/// The only entry point for order submission and cancellation
pub struct MatchingEngine {
    books: DashMap<String, Arc<OrderBook>>,
    symbols: DashMap<String, SymbolSpec>,
    sequence: Arc<AtomicU64>,
    events: Arc<EventBus>,
    tail: Arc<TradeTail>,
    default_depth: usize,
}

impl MatchingEngine {
    /// Empty engine with default settings; register symbols before submitting
    pub fn new() -> Self {
        Self::with_settings(Vec::new(), DEFAULT_RECENT_TRADES_CAP, DEFAULT_DEPTH)
    }

    /// Engine with the given trading pairs and default settings
    pub fn with_symbols(symbols: Vec<SymbolSpec>) -> Self {
        Self::with_settings(symbols, DEFAULT_RECENT_TRADES_CAP, DEFAULT_DEPTH)
    }

    pub fn with_settings(
        symbols: Vec<SymbolSpec>,
        recent_trades_cap: usize,
        default_depth: usize,
    ) -> Self {
        let engine = Self {
            books: DashMap::new(),
            symbols: DashMap::new(),
            sequence: Arc::new(AtomicU64::new(0)),
            events: Arc::new(EventBus::new()),
            tail: Arc::new(TradeTail::new(recent_trades_cap)),
            default_depth,
        };
        for spec in symbols {
            engine.register_symbol(spec);
        }
        engine
    }

    /// Register a trading pair; its book is created here and lives for the
    /// engine's lifetime. Re-registering an existing symbol is a no-op.
    pub fn register_symbol(&self, spec: SymbolSpec) {
        assert!(
            spec.price_scale <= 8,
            "price scale {} exceeds the 8 decimal places the book key carries",
            spec.price_scale
        );
        if self.symbols.contains_key(&spec.symbol) {
            return;
        }
        tracing::info!(
            "registering symbol {} (price scale {}, quantity scale {})",
            spec.symbol,
            spec.price_scale,
            spec.quantity_scale
        );
        self.books.insert(
            spec.symbol.clone(),
            Arc::new(OrderBook::new(
                spec.symbol.clone(),
                Arc::clone(&self.sequence),
                Arc::clone(&self.events),
                Arc::clone(&self.tail),
                self.default_depth,
            )),
        );
        self.symbols.insert(spec.symbol.clone(), spec);
    }

    pub fn is_valid_symbol(&self, symbol: &str) -> bool {
        self.symbols.contains_key(symbol)
    }

    /// Registered trading pairs
    pub fn symbols(&self) -> Vec<SymbolSpec> {
        self.symbols.iter().map(|e| e.value().clone()).collect()
    }

    pub fn default_depth(&self) -> usize {
        self.default_depth
    }

    /// Validate, stamp, match, publish. Validation failures are `Err`;
    /// an unfillable FOK comes back `Ok` with status `rejected`.
    pub fn submit(&self, spec: OrderSpec) -> Result<SubmitResult, EngineError> {
        self.validate(&spec)?;

        let order = Order {
            id: Uuid::new_v4(),
            symbol: spec.symbol.clone(),
            side: spec.side,
            order_type: spec.order_type,
            price: if spec.order_type.requires_price() {
                spec.price
            } else {
                None
            },
            quantity: spec.quantity,
            remaining: spec.quantity,
            status: OrderStatus::New,
            timestamp: 0,
        };

        let book = self
            .books
            .get(&spec.symbol)
            .ok_or_else(|| EngineError::UnknownSymbol(spec.symbol.clone()))?;

        let matched_at = std::time::Instant::now();
        let result = book.submit(order)?;
        metrics::record_order_submitted(&spec.side.to_string(), &spec.order_type.to_string());
        metrics::record_match_duration(matched_at.elapsed().as_secs_f64());
        if !result.trades.is_empty() {
            metrics::record_trades_executed(&result.order.symbol, result.trades.len() as u64);
        }

        tracing::info!(
            "order processed: id={}, symbol={}, status={}, filled={}",
            result.order.id,
            result.order.symbol,
            result.order.status,
            result.order.filled_quantity()
        );

        Ok(result)
    }

    /// Cancel a resting order. `Ok(false)` when the id is unknown or already
    /// terminal; unknown symbols are an error.
    pub fn cancel(&self, symbol: &str, order_id: Uuid) -> Result<bool, EngineError> {
        let book = self
            .books
            .get(symbol)
            .ok_or_else(|| EngineError::UnknownSymbol(symbol.to_string()))?;

        match book.cancel(order_id) {
            Some(order) => {
                metrics::record_order_cancelled();
                tracing::info!("order cancelled: id={}, symbol={}", order.id, symbol);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Aggregated book snapshot; depth defaults to the configured depth
    pub fn orderbook(&self, symbol: &str, depth: Option<usize>) -> Result<BookSnapshot, EngineError> {
        let book = self
            .books
            .get(symbol)
            .ok_or_else(|| EngineError::UnknownSymbol(symbol.to_string()))?;
        Ok(book.snapshot(depth.unwrap_or(self.default_depth)))
    }

    /// Best bid and offer
    pub fn bbo(&self, symbol: &str) -> Result<Bbo, EngineError> {
        let book = self
            .books
            .get(symbol)
            .ok_or_else(|| EngineError::UnknownSymbol(symbol.to_string()))?;
        let bid = book.best_bid();
        let ask = book.best_ask();
        Ok(Bbo {
            symbol: symbol.to_string(),
            bid,
            ask,
            spread: match (bid, ask) {
                (Some(b), Some(a)) => Some(a - b),
                _ => None,
            },
        })
    }

    /// Recent trades, newest first, optionally filtered by symbol
    pub fn recent_trades(&self, symbol: Option<&str>, limit: usize) -> Vec<Trade> {
        self.tail.recent(symbol, limit)
    }

    /// Consistent serializable view for a snapshotting collaborator
    pub fn snapshot(&self) -> EngineSnapshot {
        let mut books: Vec<BookSnapshot> = self
            .books
            .iter()
            .map(|entry| entry.value().snapshot(usize::MAX))
            .collect();
        books.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        EngineSnapshot {
            books,
            recent_trades: self.tail.all(),
            sequence: self.sequence.load(AtomicOrdering::Relaxed),
        }
    }

    /// Subscribe to executed trades; dropping the receiver unsubscribes
    pub fn subscribe_trades(&self) -> broadcast::Receiver<Trade> {
        self.events.subscribe_trades()
    }

    /// Subscribe to post-mutation book snapshots
    pub fn subscribe_orderbook(&self) -> broadcast::Receiver<BookSnapshot> {
        self.events.subscribe_books()
    }

    fn validate(&self, spec: &OrderSpec) -> Result<(), EngineError> {
        let symbol = self
            .symbols
            .get(&spec.symbol)
            .ok_or_else(|| EngineError::UnknownSymbol(spec.symbol.clone()))?;

        if spec.quantity <= Decimal::ZERO {
            return Err(EngineError::InvalidQuantity(spec.quantity));
        }
        if exceeds_scale(spec.quantity, symbol.quantity_scale) {
            return Err(EngineError::ScaleViolation {
                symbol: spec.symbol.clone(),
                field: "quantity",
                scale: symbol.quantity_scale,
            });
        }

        if spec.order_type.requires_price() {
            let price = spec
                .price
                .ok_or(EngineError::MissingPrice(spec.order_type))?;
            if price <= Decimal::ZERO {
                return Err(EngineError::InvalidPrice(price));
            }
            if exceeds_scale(price, symbol.price_scale) {
                return Err(EngineError::ScaleViolation {
                    symbol: spec.symbol.clone(),
                    field: "price",
                    scale: symbol.price_scale,
                });
            }
        }

        Ok(())
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// True when `value` carries more decimal places than `scale` allows
fn exceeds_scale(value: Decimal, scale: u32) -> bool {
    value.normalize().scale() > scale
}
