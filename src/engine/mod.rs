//! Order Matching Engine Module
//!
//! Price-time priority matching over per-symbol central limit order books.
//!
//! # Architecture
//!
//! ```text
//! API / WebSocket Handler
//!   ↓
//! MatchingEngine (validation, id + sequence assignment, routing)
//!   ├→ OrderBook (per symbol, one guard per book)
//!   │    └→ PriceLevel (FIFO queue per price)
//!   ├→ TradeTail (bounded recent-trades history)
//!   └→ EventBus (broadcast fan-out: trades + book snapshots)
//! ```
//!
//! # Features
//!
//! - **Price-Time Priority**: best price first, oldest first at equal price
//! - **Four Order Types**: market, limit, IOC, FOK with exact decimal arithmetic
//! - **Serialized Matching**: all mutations to one book happen under its guard
//! - **Non-blocking Fan-out**: slow subscribers lag their own channel, never the engine

mod engine;
mod events;
mod history;
mod level;
mod orderbook;
mod types;

// Re-export main types
pub use engine::{MatchingEngine, DEFAULT_DEPTH, DEFAULT_RECENT_TRADES_CAP};
pub use events::EventBus;
pub use history::TradeTail;
pub use level::PriceLevel;
pub use orderbook::OrderBook;
pub use types::*;
