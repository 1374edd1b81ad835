//! Orderbook Implementation
//!
//! One order book per symbol. Both sides live behind a single guard so each
//! submit or cancel is one atomic step; events for that step are published
//! before the guard is released (the broadcast senders never block), which
//! keeps one submission's trades and snapshot contiguous per subscriber.

use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use uuid::Uuid;

use super::events::EventBus;
use super::history::TradeTail;
use super::level::PriceLevel;
use super::types::{
    BookSnapshot, EngineError, Order, OrderStatus, OrderType, PriceKey, Side, SubmitResult, Trade,
};

/// Bids descending, asks ascending; mutated only under the book guard
struct BookSides {
    bids: BTreeMap<PriceKey, PriceLevel>,
    asks: BTreeMap<PriceKey, PriceLevel>,
}

impl BookSides {
    fn best_bid(&self) -> Option<PriceKey> {
        self.bids.keys().next_back().copied()
    }

    fn best_ask(&self) -> Option<PriceKey> {
        self.asks.keys().next().copied()
    }
}

/// A single symbol orderbook with concurrent access support
pub struct OrderBook {
    symbol: String,

    /// Both sides under one guard; mutators take write, snapshot readers take read
    sides: RwLock<BookSides>,

    /// Order ID to (side, price) mapping for O(log P) cancellation
    order_index: DashMap<Uuid, (Side, PriceKey)>,

    /// Resting order count
    order_count: AtomicI64,

    /// Engine-wide sequence; stamped inside the guard so per-book order holds
    sequence: Arc<AtomicU64>,

    events: Arc<EventBus>,
    tail: Arc<TradeTail>,

    /// Depth of published snapshots
    snapshot_depth: usize,
}

fn next_seq(sequence: &AtomicU64) -> u64 {
    sequence.fetch_add(1, AtomicOrdering::Relaxed) + 1
}

impl OrderBook {
    pub fn new(
        symbol: String,
        sequence: Arc<AtomicU64>,
        events: Arc<EventBus>,
        tail: Arc<TradeTail>,
        snapshot_depth: usize,
    ) -> Self {
        Self {
            symbol,
            sides: RwLock::new(BookSides {
                bids: BTreeMap::new(),
                asks: BTreeMap::new(),
            }),
            order_index: DashMap::new(),
            order_count: AtomicI64::new(0),
            sequence,
            events,
            tail,
            snapshot_depth,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Resting order count
    pub fn order_count(&self) -> i64 {
        self.order_count.load(AtomicOrdering::Relaxed)
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.sides.read().best_bid().map(|k| k.to_decimal())
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.sides.read().best_ask().map(|k| k.to_decimal())
    }

    pub fn spread(&self) -> Option<Decimal> {
        let sides = self.sides.read();
        match (sides.best_bid(), sides.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.to_decimal() - bid.to_decimal()),
            _ => None,
        }
    }

    /// Match an incoming order, rest any limit residual, publish events.
    ///
    /// The caller (engine) has already validated the submission; this is the
    /// one atomic matching step. Returns the taker's post-match state and the
    /// trades produced, in execution order.
    pub fn submit(&self, mut taker: Order) -> Result<SubmitResult, EngineError> {
        if self.order_index.contains_key(&taker.id) {
            return Err(EngineError::DuplicateOrder(taker.id));
        }

        let mut sides = self.sides.write();
        taker.timestamp = next_seq(&self.sequence);

        // FOK feasibility: all or nothing, decided before touching the book
        if taker.order_type == OrderType::Fok {
            let limit = taker.price.unwrap_or(Decimal::ZERO);
            if Self::available_to_fill(&sides, taker.side, limit) < taker.quantity {
                taker.status = OrderStatus::Rejected;
                return Ok(SubmitResult {
                    order: taker,
                    trades: Vec::new(),
                });
            }
        }

        let limit = match taker.order_type {
            OrderType::Market => None,
            _ => taker.price,
        };

        let mut trades = Vec::new();

        loop {
            if taker.remaining.is_zero() {
                break;
            }

            let opposite = match taker.side {
                Side::Buy => &mut sides.asks,
                Side::Sell => &mut sides.bids,
            };
            let best = match taker.side {
                Side::Buy => opposite.keys().next().copied(),
                Side::Sell => opposite.keys().next_back().copied(),
            };
            let Some(key) = best else { break };

            let level_price = key.to_decimal();
            if let Some(limit) = limit {
                let crosses = match taker.side {
                    Side::Buy => level_price <= limit,
                    Side::Sell => level_price >= limit,
                };
                if !crosses {
                    break;
                }
            }

            let level = opposite.get_mut(&key).expect("best level exists");

            while !taker.remaining.is_zero() {
                let Some(maker) = level.front_mut() else { break };

                let fill = taker.remaining.min(maker.remaining);
                maker.remaining -= fill;
                taker.remaining -= fill;
                debug_assert!(maker.remaining >= Decimal::ZERO);

                let maker_done = maker.remaining.is_zero();
                maker.status = if maker_done {
                    OrderStatus::Filled
                } else {
                    OrderStatus::PartiallyFilled
                };
                let maker_id = maker.id;
                level.reduce_front(fill);

                trades.push(Trade {
                    trade_id: Uuid::new_v4(),
                    symbol: self.symbol.clone(),
                    price: level_price,
                    quantity: fill,
                    maker_order_id: maker_id,
                    taker_order_id: taker.id,
                    aggressor_side: taker.side,
                    timestamp: next_seq(&self.sequence),
                });

                if maker_done {
                    level.pop_front();
                    self.order_index.remove(&maker_id);
                    self.order_count.fetch_sub(1, AtomicOrdering::Relaxed);
                }
            }

            if level.is_empty() {
                opposite.remove(&key);
            }
        }

        if taker.remaining.is_zero() {
            taker.status = OrderStatus::Filled;
        } else if taker.order_type.rests() {
            taker.status = if trades.is_empty() {
                OrderStatus::New
            } else {
                OrderStatus::PartiallyFilled
            };

            let price = taker.price.expect("limit orders carry a price");
            let key = PriceKey::from_decimal(price);
            let own = match taker.side {
                Side::Buy => &mut sides.bids,
                Side::Sell => &mut sides.asks,
            };
            own.entry(key).or_insert_with(PriceLevel::new).push_back(taker.clone());
            self.order_index.insert(taker.id, (taker.side, key));
            self.order_count.fetch_add(1, AtomicOrdering::Relaxed);

            self.assert_uncrossed(&sides);
        } else if trades.is_empty() {
            // market/IOC with nothing to take; FOK never reaches here unfilled
            taker.status = OrderStatus::Cancelled;
        } else {
            taker.status = OrderStatus::PartiallyFilled;
        }

        for trade in &trades {
            self.tail.push(trade.clone());
            self.events.publish_trade(trade.clone());
        }
        self.events.publish_book(self.snapshot_of(&sides, self.snapshot_depth));

        Ok(SubmitResult { order: taker, trades })
    }

    /// Cancel a resting order by ID; returns the cancelled order
    pub fn cancel(&self, order_id: Uuid) -> Option<Order> {
        let mut sides = self.sides.write();

        let (side, key) = self.order_index.remove(&order_id)?.1;
        let map = match side {
            Side::Buy => &mut sides.bids,
            Side::Sell => &mut sides.asks,
        };

        let level = map.get_mut(&key)?;
        let mut order = level.remove(order_id)?;
        if level.is_empty() {
            map.remove(&key);
        }
        order.status = OrderStatus::Cancelled;
        self.order_count.fetch_sub(1, AtomicOrdering::Relaxed);

        self.events.publish_book(self.snapshot_of(&sides, self.snapshot_depth));

        Some(order)
    }

    /// Aggregated top-of-book snapshot
    pub fn snapshot(&self, depth: usize) -> BookSnapshot {
        let sides = self.sides.read();
        self.snapshot_of(&sides, depth)
    }

    fn snapshot_of(&self, sides: &BookSides, depth: usize) -> BookSnapshot {
        let bids = sides
            .bids
            .iter()
            .rev()
            .take(depth)
            .map(|(key, level)| [key.to_decimal(), level.total_quantity()])
            .collect();
        let asks = sides
            .asks
            .iter()
            .take(depth)
            .map(|(key, level)| [key.to_decimal(), level.total_quantity()])
            .collect();

        BookSnapshot {
            symbol: self.symbol.clone(),
            bids,
            asks,
            timestamp: self.sequence.load(AtomicOrdering::Relaxed),
        }
    }

    /// Quantity resting at-or-better than `limit` on the side a taker would hit.
    /// This is the FOK feasibility walk.
    fn available_to_fill(sides: &BookSides, taker_side: Side, limit: Decimal) -> Decimal {
        let mut available = Decimal::ZERO;
        match taker_side {
            Side::Buy => {
                for (key, level) in sides.asks.iter() {
                    if key.to_decimal() > limit {
                        break;
                    }
                    available += level.total_quantity();
                }
            }
            Side::Sell => {
                for (key, level) in sides.bids.iter().rev() {
                    if key.to_decimal() < limit {
                        break;
                    }
                    available += level.total_quantity();
                }
            }
        }
        available
    }

    /// Total resting bid quantity
    pub fn bid_depth(&self) -> Decimal {
        let sides = self.sides.read();
        sides.bids.values().map(|l| l.total_quantity()).sum()
    }

    /// Total resting ask quantity
    pub fn ask_depth(&self) -> Decimal {
        let sides = self.sides.read();
        sides.asks.values().map(|l| l.total_quantity()).sum()
    }

    /// Check if an order rests in the book
    pub fn has_order(&self, order_id: &Uuid) -> bool {
        self.order_index.contains_key(order_id)
    }

    /// Get a resting order by ID
    pub fn get_order(&self, order_id: &Uuid) -> Option<Order> {
        let (side, key) = *self.order_index.get(order_id)?;
        let sides = self.sides.read();
        let map = match side {
            Side::Buy => &sides.bids,
            Side::Sell => &sides.asks,
        };
        let result = map.get(&key)?.iter().find(|o| o.id == *order_id).cloned();
        result
    }

    /// Crossed book after a mutation is a bug, not a runtime condition
    fn assert_uncrossed(&self, sides: &BookSides) {
        if let (Some(bid), Some(ask)) = (sides.best_bid(), sides.best_ask()) {
            if bid >= ask {
                panic!(
                    "crossed book on {}: best_bid={} >= best_ask={}",
                    self.symbol,
                    bid.to_decimal(),
                    ask.to_decimal()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_book() -> OrderBook {
        OrderBook::new(
            "BTC-USDT".to_string(),
            Arc::new(AtomicU64::new(0)),
            Arc::new(EventBus::new()),
            Arc::new(TradeTail::new(1000)),
            20,
        )
    }

    fn order(side: Side, order_type: OrderType, qty: Decimal, price: Option<Decimal>) -> Order {
        Order {
            id: Uuid::new_v4(),
            symbol: "BTC-USDT".to_string(),
            side,
            order_type,
            price,
            quantity: qty,
            remaining: qty,
            status: OrderStatus::New,
            timestamp: 0,
        }
    }

    fn limit(side: Side, qty: Decimal, price: Decimal) -> Order {
        order(side, OrderType::Limit, qty, Some(price))
    }

    #[test]
    fn test_limit_rests_and_cancel_removes() {
        let book = test_book();
        let o = limit(Side::Buy, dec!(1.0), dec!(50000.00));
        let id = o.id;

        let result = book.submit(o).unwrap();
        assert_eq!(result.order.status, OrderStatus::New);
        assert!(result.trades.is_empty());
        assert_eq!(book.order_count(), 1);
        assert!(book.has_order(&id));

        let cancelled = book.cancel(id).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(book.order_count(), 0);
        assert!(!book.has_order(&id));
        assert_eq!(book.best_bid(), None);
    }

    #[test]
    fn test_cancel_unknown_is_benign() {
        let book = test_book();
        assert!(book.cancel(Uuid::new_v4()).is_none());
        assert_eq!(book.order_count(), 0);
    }

    #[test]
    fn test_best_bid_ask_spread() {
        let book = test_book();
        book.submit(limit(Side::Buy, dec!(1.0), dec!(100.0))).unwrap();
        book.submit(limit(Side::Buy, dec!(1.0), dec!(101.0))).unwrap();
        book.submit(limit(Side::Sell, dec!(1.0), dec!(102.0))).unwrap();
        book.submit(limit(Side::Sell, dec!(1.0), dec!(103.0))).unwrap();

        assert_eq!(book.best_bid(), Some(dec!(101.0)));
        assert_eq!(book.best_ask(), Some(dec!(102.0)));
        assert_eq!(book.spread(), Some(dec!(1.0)));
    }

    #[test]
    fn test_taker_executes_at_maker_price() {
        let book = test_book();
        book.submit(limit(Side::Sell, dec!(1.0), dec!(100.0))).unwrap();

        // Buyer willing to pay 105 still fills at 100
        let result = book.submit(limit(Side::Buy, dec!(1.0), dec!(105.0))).unwrap();
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].price, dec!(100.0));
        assert_eq!(result.order.status, OrderStatus::Filled);
    }

    #[test]
    fn test_limit_walks_levels_then_rests_residual() {
        let book = test_book();
        let ask1 = limit(Side::Sell, dec!(1.0), dec!(100.0));
        let ask2 = limit(Side::Sell, dec!(2.0), dec!(101.0));
        let ask1_id = ask1.id;
        let ask2_id = ask2.id;
        book.submit(ask1).unwrap();
        book.submit(ask2).unwrap();

        let taker = limit(Side::Buy, dec!(4.0), dec!(101.0));
        let taker_id = taker.id;
        let result = book.submit(taker).unwrap();

        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].price, dec!(100.0));
        assert_eq!(result.trades[0].quantity, dec!(1.0));
        assert_eq!(result.trades[1].price, dec!(101.0));
        assert_eq!(result.trades[1].quantity, dec!(2.0));

        assert_eq!(result.order.status, OrderStatus::PartiallyFilled);
        assert_eq!(result.order.remaining, dec!(1.0));
        assert!(book.has_order(&taker_id));
        assert!(!book.has_order(&ask1_id));
        assert!(!book.has_order(&ask2_id));
        assert_eq!(book.best_bid(), Some(dec!(101.0)));
        assert_eq!(book.best_ask(), None);
    }

    #[test]
    fn test_price_time_priority_at_same_price() {
        let book = test_book();
        let a = limit(Side::Buy, dec!(1.0), dec!(50000.00));
        let b = limit(Side::Buy, dec!(1.0), dec!(50000.00));
        let a_id = a.id;
        let b_id = b.id;
        book.submit(a).unwrap();
        book.submit(b).unwrap();

        let result = book
            .submit(order(Side::Sell, OrderType::Market, dec!(1.5), None))
            .unwrap();

        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].maker_order_id, a_id);
        assert_eq!(result.trades[0].quantity, dec!(1.0));
        assert_eq!(result.trades[1].maker_order_id, b_id);
        assert_eq!(result.trades[1].quantity, dec!(0.5));

        assert!(!book.has_order(&a_id));
        assert!(book.has_order(&b_id));
        assert_eq!(book.get_order(&b_id).unwrap().remaining, dec!(0.5));
    }

    #[test]
    fn test_market_with_empty_book_is_cancelled() {
        let book = test_book();
        let result = book
            .submit(order(Side::Buy, OrderType::Market, dec!(1.0), None))
            .unwrap();
        assert_eq!(result.order.status, OrderStatus::Cancelled);
        assert!(result.trades.is_empty());
        assert_eq!(book.order_count(), 0);
    }

    #[test]
    fn test_ioc_partial_fill_never_rests() {
        let book = test_book();
        book.submit(limit(Side::Sell, dec!(0.3), dec!(50050.00))).unwrap();

        let taker = order(Side::Buy, OrderType::Ioc, dec!(0.5), Some(dec!(50050.00)));
        let taker_id = taker.id;
        let result = book.submit(taker).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].quantity, dec!(0.3));
        assert_eq!(result.order.status, OrderStatus::PartiallyFilled);
        assert_eq!(result.order.remaining, dec!(0.2));
        assert!(!book.has_order(&taker_id));
        assert_eq!(book.best_bid(), None);
    }

    #[test]
    fn test_ioc_no_cross_is_cancelled() {
        let book = test_book();
        book.submit(limit(Side::Sell, dec!(1.0), dec!(101.0))).unwrap();

        let result = book
            .submit(order(Side::Buy, OrderType::Ioc, dec!(1.0), Some(dec!(100.0))))
            .unwrap();
        assert_eq!(result.order.status, OrderStatus::Cancelled);
        assert!(result.trades.is_empty());
        assert_eq!(book.ask_depth(), dec!(1.0));
    }

    #[test]
    fn test_fok_insufficient_liquidity_rejected_book_unchanged() {
        let book = test_book();
        let resting = limit(Side::Sell, dec!(0.5), dec!(50100.00));
        let resting_id = resting.id;
        book.submit(resting).unwrap();

        let result = book
            .submit(order(Side::Buy, OrderType::Fok, dec!(1.0), Some(dec!(50100.00))))
            .unwrap();

        assert_eq!(result.order.status, OrderStatus::Rejected);
        assert!(result.trades.is_empty());
        assert!(book.has_order(&resting_id));
        assert_eq!(book.ask_depth(), dec!(0.5));
    }

    #[test]
    fn test_fok_fillable_across_levels_fills_fully() {
        let book = test_book();
        book.submit(limit(Side::Sell, dec!(0.5), dec!(100.0))).unwrap();
        book.submit(limit(Side::Sell, dec!(0.5), dec!(101.0))).unwrap();

        let result = book
            .submit(order(Side::Buy, OrderType::Fok, dec!(1.0), Some(dec!(101.0))))
            .unwrap();

        assert_eq!(result.order.status, OrderStatus::Filled);
        assert_eq!(result.order.remaining, Decimal::ZERO);
        let total: Decimal = result.trades.iter().map(|t| t.quantity).sum();
        assert_eq!(total, dec!(1.0));
        assert_eq!(book.ask_depth(), Decimal::ZERO);
    }

    #[test]
    fn test_fok_ignores_liquidity_beyond_limit() {
        let book = test_book();
        book.submit(limit(Side::Sell, dec!(0.5), dec!(100.0))).unwrap();
        book.submit(limit(Side::Sell, dec!(5.0), dec!(102.0))).unwrap();

        // Enough total quantity, but not at-or-under the limit
        let result = book
            .submit(order(Side::Buy, OrderType::Fok, dec!(1.0), Some(dec!(101.0))))
            .unwrap();
        assert_eq!(result.order.status, OrderStatus::Rejected);
        assert!(result.trades.is_empty());
    }

    #[test]
    fn test_market_walks_multiple_levels() {
        let book = test_book();
        book.submit(limit(Side::Sell, dec!(0.1), dec!(50100.00))).unwrap();
        book.submit(limit(Side::Sell, dec!(0.1), dec!(50200.00))).unwrap();
        book.submit(limit(Side::Sell, dec!(0.1), dec!(50300.00))).unwrap();

        let result = book
            .submit(order(Side::Buy, OrderType::Market, dec!(0.25), None))
            .unwrap();

        let executed: Vec<(Decimal, Decimal)> =
            result.trades.iter().map(|t| (t.price, t.quantity)).collect();
        assert_eq!(
            executed,
            vec![
                (dec!(50100.00), dec!(0.1)),
                (dec!(50200.00), dec!(0.1)),
                (dec!(50300.00), dec!(0.05)),
            ]
        );
        assert_eq!(result.order.status, OrderStatus::Filled);

        let snapshot = book.snapshot(10);
        assert_eq!(snapshot.asks.len(), 1);
        assert_eq!(snapshot.asks[0], [dec!(50300.00), dec!(0.05)]);
    }

    #[test]
    fn test_conservation_of_quantity() {
        let book = test_book();
        book.submit(limit(Side::Sell, dec!(0.7), dec!(100.0))).unwrap();
        book.submit(limit(Side::Sell, dec!(0.7), dec!(101.0))).unwrap();

        let taker = limit(Side::Buy, dec!(1.0), dec!(100.5));
        let quantity = taker.quantity;
        let result = book.submit(taker).unwrap();

        let traded: Decimal = result.trades.iter().map(|t| t.quantity).sum();
        assert_eq!(traded + result.order.remaining, quantity);
    }

    #[test]
    fn test_snapshot_aggregates_levels() {
        let book = test_book();
        book.submit(limit(Side::Buy, dec!(1.0), dec!(100.0))).unwrap();
        book.submit(limit(Side::Buy, dec!(2.0), dec!(100.0))).unwrap();
        book.submit(limit(Side::Sell, dec!(1.5), dec!(102.0))).unwrap();

        let snapshot = book.snapshot(10);
        assert_eq!(snapshot.bids.len(), 1);
        assert_eq!(snapshot.bids[0], [dec!(100.0), dec!(3.0)]);
        assert_eq!(snapshot.asks[0], [dec!(102.0), dec!(1.5)]);
    }

    #[test]
    fn test_duplicate_resting_id_rejected() {
        let book = test_book();
        let o = limit(Side::Buy, dec!(1.0), dec!(100.0));
        let dup = o.clone();
        book.submit(o).unwrap();

        match book.submit(dup) {
            Err(EngineError::DuplicateOrder(_)) => {}
            other => panic!("expected duplicate rejection, got {:?}", other.map(|r| r.order.status)),
        }
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let book = test_book();
        let r1 = book.submit(limit(Side::Buy, dec!(1.0), dec!(99.0))).unwrap();
        let r2 = book.submit(limit(Side::Buy, dec!(1.0), dec!(98.0))).unwrap();
        let r3 = book
            .submit(order(Side::Sell, OrderType::Market, dec!(1.5), None))
            .unwrap();

        assert!(r1.order.timestamp < r2.order.timestamp);
        assert!(r2.order.timestamp < r3.order.timestamp);
        let mut last = r3.order.timestamp;
        for trade in &r3.trades {
            assert!(trade.timestamp > last);
            last = trade.timestamp;
        }
    }
}
