//! Trade History
//!
//! Bounded in-memory tail of the most recent trades across all books.
//! Appended under a single-writer discipline (each book appends while holding
//! its own guard); older trades fall off silently.

use parking_lot::RwLock;
use std::collections::VecDeque;

use super::types::Trade;

/// Bounded recent-trades tail
pub struct TradeTail {
    trades: RwLock<VecDeque<Trade>>,
    cap: usize,
}

impl TradeTail {
    pub fn new(cap: usize) -> Self {
        Self {
            trades: RwLock::new(VecDeque::with_capacity(cap.min(1024))),
            cap,
        }
    }

    /// Append one trade, evicting the oldest once the cap is reached
    pub fn push(&self, trade: Trade) {
        let mut trades = self.trades.write();
        if trades.len() == self.cap {
            trades.pop_front();
        }
        trades.push_back(trade);
    }

    /// Most recent trades, newest first, optionally filtered by symbol
    pub fn recent(&self, symbol: Option<&str>, limit: usize) -> Vec<Trade> {
        let trades = self.trades.read();
        trades
            .iter()
            .rev()
            .filter(|t| symbol.map_or(true, |s| t.symbol == s))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Oldest-first copy of the whole tail, for state snapshots
    pub fn all(&self) -> Vec<Trade> {
        self.trades.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.trades.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.read().is_empty()
    }
}
