//! Property tests for the matching invariants.
//!
//! Random operation sequences run against both the engine and a naive model
//! of resting liquidity. Every trade is checked against the model (maker
//! price execution, price priority, FIFO at equal price), and the final book
//! must aggregate to exactly what the model holds.

use proptest::prelude::*;
use rust_decimal::Decimal;
use spotmatch::engine::{
    MatchingEngine, OrderSpec, OrderStatus, OrderType, Side, SymbolSpec, Trade,
};
use std::collections::HashMap;
use uuid::Uuid;

const SYMBOL: &str = "BTC-USDT";

fn test_engine() -> MatchingEngine {
    MatchingEngine::with_symbols(vec![SymbolSpec {
        symbol: SYMBOL.to_string(),
        price_scale: 2,
        quantity_scale: 4,
    }])
}

#[derive(Debug, Clone)]
enum Op {
    Submit {
        side: Side,
        order_type: OrderType,
        price_cents: i64,
        qty_tenths: i64,
    },
    Cancel {
        pick: usize,
    },
}

fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Buy), Just(Side::Sell)]
}

fn order_type_strategy() -> impl Strategy<Value = OrderType> {
    prop_oneof![
        3 => Just(OrderType::Limit),
        1 => Just(OrderType::Market),
        1 => Just(OrderType::Ioc),
        1 => Just(OrderType::Fok),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        5 => (
            side_strategy(),
            order_type_strategy(),
            9500i64..10500,
            1i64..50,
        )
            .prop_map(|(side, order_type, price_cents, qty_tenths)| Op::Submit {
                side,
                order_type,
                price_cents,
                qty_tenths,
            }),
        1 => (0usize..64).prop_map(|pick| Op::Cancel { pick }),
    ]
}

/// Resting liquidity as the engine should hold it
#[derive(Debug, Clone)]
struct RestingOrder {
    side: Side,
    price: Decimal,
    remaining: Decimal,
    timestamp: u64,
}

#[derive(Default)]
struct BookModel {
    resting: HashMap<Uuid, RestingOrder>,
}

impl BookModel {
    fn best(&self, side: Side) -> Option<Decimal> {
        let prices = self
            .resting
            .values()
            .filter(|o| o.side == side)
            .map(|o| o.price);
        match side {
            Side::Buy => prices.max(),
            Side::Sell => prices.min(),
        }
    }

    /// The maker that price-time priority must pick on `side`: best price,
    /// then earliest timestamp
    fn expected_maker(&self, side: Side) -> Option<(Uuid, &RestingOrder)> {
        let best = self.best(side)?;
        self.resting
            .iter()
            .filter(|(_, o)| o.side == side && o.price == best)
            .min_by_key(|(_, o)| o.timestamp)
            .map(|(id, o)| (*id, o))
    }

    fn apply_trade(&mut self, trade: &Trade) {
        let maker_side = trade.aggressor_side.opposite();
        let (expected_id, expected) = self
            .expected_maker(maker_side)
            .expect("trade with no resting liquidity in model");

        // Maker price execution + price priority + FIFO at equal price
        assert_eq!(trade.price, expected.price, "trade not at best resting price");
        assert_eq!(
            trade.maker_order_id, expected_id,
            "trade violates price-time priority"
        );

        let maker = self.resting.get_mut(&trade.maker_order_id).unwrap();
        maker.remaining -= trade.quantity;
        assert!(maker.remaining >= Decimal::ZERO);
        if maker.remaining.is_zero() {
            self.resting.remove(&trade.maker_order_id);
        }
    }

    /// Aggregate one side as (price, total) pairs, best price first
    fn levels(&self, side: Side) -> Vec<[Decimal; 2]> {
        let mut totals: HashMap<Decimal, Decimal> = HashMap::new();
        for order in self.resting.values().filter(|o| o.side == side) {
            *totals.entry(order.price).or_default() += order.remaining;
        }
        let mut levels: Vec<[Decimal; 2]> = totals.into_iter().map(|(p, q)| [p, q]).collect();
        match side {
            Side::Buy => levels.sort_by(|a, b| b[0].cmp(&a[0])),
            Side::Sell => levels.sort_by(|a, b| a[0].cmp(&b[0])),
        }
        levels
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn matching_invariants_hold(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let engine = test_engine();
        let mut model = BookModel::default();
        let mut submitted_ids: Vec<Uuid> = Vec::new();
        let mut last_order_ts = 0u64;

        for op in ops {
            match op {
                Op::Submit { side, order_type, price_cents, qty_tenths } => {
                    let price = Decimal::new(price_cents, 2);
                    let quantity = Decimal::new(qty_tenths, 1);
                    let result = engine
                        .submit(OrderSpec {
                            symbol: SYMBOL.to_string(),
                            side,
                            order_type,
                            quantity,
                            price: if order_type.requires_price() { Some(price) } else { None },
                        })
                        .expect("generated specs are valid");

                    // Monotonic timestamps per accepted order
                    prop_assert!(result.order.timestamp > last_order_ts);
                    last_order_ts = result.order.timestamp;

                    // Conservation
                    let traded: Decimal = result.trades.iter().map(|t| t.quantity).sum();
                    prop_assert_eq!(traded + result.order.remaining, quantity);

                    // FOK atomicity
                    if order_type == OrderType::Fok {
                        if result.order.status == OrderStatus::Rejected {
                            prop_assert!(result.trades.is_empty());
                        } else {
                            prop_assert_eq!(result.order.status, OrderStatus::Filled);
                            prop_assert_eq!(traded, quantity);
                        }
                    }

                    // Taker never executes worse than its limit
                    for trade in &result.trades {
                        prop_assert_eq!(trade.aggressor_side, side);
                        if order_type != OrderType::Market {
                            match side {
                                Side::Buy => prop_assert!(trade.price <= price),
                                Side::Sell => prop_assert!(trade.price >= price),
                            }
                        }
                        // trade timestamps come after the taker's acceptance stamp
                        prop_assert!(trade.timestamp > last_order_ts);
                        last_order_ts = trade.timestamp;
                        model.apply_trade(trade);
                    }

                    // Limit residuals rest; everything else is discarded
                    let rests = order_type == OrderType::Limit
                        && !result.order.remaining.is_zero();
                    if rests {
                        model.resting.insert(result.order.id, RestingOrder {
                            side,
                            price,
                            remaining: result.order.remaining,
                            timestamp: result.order.timestamp,
                        });
                    } else if order_type != OrderType::Limit {
                        // IOC/market/FOK non-resting: a cancel must miss
                        prop_assert!(!engine.cancel(SYMBOL, result.order.id).unwrap());
                    }
                    submitted_ids.push(result.order.id);
                }
                Op::Cancel { pick } => {
                    if submitted_ids.is_empty() {
                        continue;
                    }
                    let id = submitted_ids[pick % submitted_ids.len()];
                    let was_resting = model.resting.remove(&id).is_some();
                    prop_assert_eq!(engine.cancel(SYMBOL, id).unwrap(), was_resting);
                    // Cancel idempotence
                    prop_assert!(!engine.cancel(SYMBOL, id).unwrap());
                }
            }

            // Non-crossed book after every operation
            let bbo = engine.bbo(SYMBOL).unwrap();
            if let (Some(bid), Some(ask)) = (bbo.bid, bbo.ask) {
                prop_assert!(bid < ask);
            }
            prop_assert_eq!(bbo.bid, model.best(Side::Buy));
            prop_assert_eq!(bbo.ask, model.best(Side::Sell));
        }

        // Final book equals the model's aggregation exactly
        let snapshot = engine.orderbook(SYMBOL, Some(usize::MAX)).unwrap();
        prop_assert_eq!(snapshot.bids, model.levels(Side::Buy));
        prop_assert_eq!(snapshot.asks, model.levels(Side::Sell));
    }

    #[test]
    fn recent_trades_are_bounded_and_ordered(
        qtys in prop::collection::vec(1i64..20, 1..40)
    ) {
        let engine = test_engine();
        for qty in &qtys {
            let quantity = Decimal::new(*qty, 1);
            engine.submit(OrderSpec {
                symbol: SYMBOL.to_string(),
                side: Side::Sell,
                order_type: OrderType::Limit,
                quantity,
                price: Some(Decimal::new(10000, 2)),
            }).unwrap();
            engine.submit(OrderSpec {
                symbol: SYMBOL.to_string(),
                side: Side::Buy,
                order_type: OrderType::Market,
                quantity,
                price: None,
            }).unwrap();
        }

        let trades = engine.recent_trades(Some(SYMBOL), 1000);
        prop_assert_eq!(trades.len(), qtys.len());
        // newest first, strictly decreasing sequence stamps
        for pair in trades.windows(2) {
            prop_assert!(pair[0].timestamp > pair[1].timestamp);
        }
    }
}
