//! Matching Engine Types
//!
//! Shared types and DTOs for the matching engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

// ============================================================================
// Price Key
// ============================================================================

/// Book-side map key with 8 decimal precision for exact comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceKey(i64);

impl PriceKey {
    /// Create a PriceKey from a Decimal price
    pub fn from_decimal(price: Decimal) -> Self {
        let scaled = price * Decimal::from(100_000_000);
        let truncated = scaled.trunc();
        let value = truncated.mantissa() / 10i128.pow(truncated.scale());
        PriceKey(value as i64)
    }

    /// Convert back to Decimal
    pub fn to_decimal(&self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(100_000_000)
    }

    /// Get raw value
    pub fn raw(&self) -> i64 {
        self.0
    }
}

impl Ord for PriceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for PriceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ============================================================================
// Order Types
// ============================================================================

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side a taker matches against
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
    /// Immediate or Cancel
    Ioc,
    /// Fill or Kill
    Fok,
}

impl OrderType {
    /// Only limit residuals rest in the book
    pub fn rests(&self) -> bool {
        matches!(self, OrderType::Limit)
    }

    /// Market orders take any price; the rest carry a limit
    pub fn requires_price(&self) -> bool {
        !matches!(self, OrderType::Market)
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "market"),
            OrderType::Limit => write!(f, "limit"),
            OrderType::Ioc => write!(f, "ioc"),
            OrderType::Fok => write!(f, "fok"),
        }
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Accepted, no fills yet
    New,
    /// Some quantity executed
    PartiallyFilled,
    /// Fully executed
    Filled,
    /// Removed from the book, or discarded with residual (market/IOC)
    Cancelled,
    /// Refused at submit time (validation or unfillable FOK)
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::New => write!(f, "new"),
            OrderStatus::PartiallyFilled => write!(f, "partially_filled"),
            OrderStatus::Filled => write!(f, "filled"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
            OrderStatus::Rejected => write!(f, "rejected"),
        }
    }
}

// ============================================================================
// Symbols
// ============================================================================

/// A registered trading pair and its decimal scales
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub symbol: String,
    /// Max decimal places on prices (at most 8)
    pub price_scale: u32,
    /// Max decimal places on quantities
    pub quantity_scale: u32,
}

// ============================================================================
// Order
// ============================================================================

/// Client intent for one order, before the engine assigns id and timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSpec {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    #[serde(default)]
    pub price: Option<Decimal>,
}

/// An order as tracked by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    /// Absent for market orders
    pub price: Option<Decimal>,
    pub quantity: Decimal,
    pub remaining: Decimal,
    pub status: OrderStatus,
    /// Monotonic engine sequence stamped on acceptance; the time key for priority
    pub timestamp: u64,
}

impl Order {
    pub fn filled_quantity(&self) -> Decimal {
        self.quantity - self.remaining
    }
}

// ============================================================================
// Trade
// ============================================================================

/// One execution between a maker and a taker at the maker's price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: Uuid,
    pub symbol: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub maker_order_id: Uuid,
    pub taker_order_id: Uuid,
    pub aggressor_side: Side,
    /// Monotonic engine sequence
    pub timestamp: u64,
}

// ============================================================================
// Submit Result
// ============================================================================

/// Result of one submission: the order's post-match state and the trades it produced
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResult {
    pub order: Order,
    pub trades: Vec<Trade>,
}

impl SubmitResult {
    /// FOK business rejection or any other non-fill terminal outcome
    pub fn is_rejected(&self) -> bool {
        self.order.status == OrderStatus::Rejected
    }
}

// ============================================================================
// Book Snapshot
// ============================================================================

/// Aggregated top-of-book view, one `[price, quantity]` pair per level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub symbol: String,
    pub bids: Vec<[Decimal; 2]>,
    pub asks: Vec<[Decimal; 2]>,
    /// Engine sequence at capture
    pub timestamp: u64,
}

/// Best bid and offer
#[derive(Debug, Clone, Serialize)]
pub struct Bbo {
    pub symbol: String,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub spread: Option<Decimal>,
}

/// Consistent serializable view of the whole engine, for a snapshotting collaborator
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub books: Vec<BookSnapshot>,
    pub recent_trades: Vec<Trade>,
    pub sequence: u64,
}

// ============================================================================
// Error Types
// ============================================================================

/// Matching engine errors. Validation failures only; business rejections
/// (unfillable FOK) come back as a `SubmitResult` with status `rejected`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),

    #[error("price must be positive, got {0}")]
    InvalidPrice(Decimal),

    #[error("{0} orders require a price")]
    MissingPrice(OrderType),

    #[error("{symbol}: {field} scale exceeds {scale} decimal places")]
    ScaleViolation {
        symbol: String,
        field: &'static str,
        scale: u32,
    },

    #[error("duplicate order id: {0}")]
    DuplicateOrder(Uuid),
}
