//! Event Fan-out
//!
//! Broadcast channels carrying trade and book-snapshot events to market-data
//! subscribers. Senders never block the matching path; a slow subscriber lags
//! its own receiver and observes a `Lagged(n)` error (drop-oldest), never
//! backpressure.

use tokio::sync::broadcast;

use super::types::{BookSnapshot, Trade};

/// Broadcast capacity per channel; overflow drops the oldest events for the
/// lagging subscriber only.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Shared fan-out for one engine: all books publish through the same bus
pub struct EventBus {
    trade_tx: broadcast::Sender<Trade>,
    book_tx: broadcast::Sender<BookSnapshot>,
}

impl EventBus {
    pub fn new() -> Self {
        let (trade_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (book_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { trade_tx, book_tx }
    }

    /// Subscribe to executed trades. Dropping the receiver unsubscribes.
    pub fn subscribe_trades(&self) -> broadcast::Receiver<Trade> {
        self.trade_tx.subscribe()
    }

    /// Subscribe to post-mutation book snapshots. Dropping the receiver unsubscribes.
    pub fn subscribe_books(&self) -> broadcast::Receiver<BookSnapshot> {
        self.book_tx.subscribe()
    }

    /// Publish one trade. A send with no receivers is not an error.
    pub fn publish_trade(&self, trade: Trade) {
        if let Err(e) = self.trade_tx.send(trade) {
            tracing::trace!("no trade subscribers: {}", e);
        }
    }

    /// Publish one book snapshot
    pub fn publish_book(&self, snapshot: BookSnapshot) {
        if let Err(e) = self.book_tx.send(snapshot) {
            tracing::trace!("no orderbook subscribers: {}", e);
        }
    }

    pub fn trade_subscriber_count(&self) -> usize {
        self.trade_tx.receiver_count()
    }

    pub fn book_subscriber_count(&self) -> usize {
        self.book_tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
