//! Price Level
//!
//! FIFO queue of resting orders sharing one price on one side. Queue order is
//! strictly by engine timestamp; the aggregate depth is kept as a running sum
//! so snapshot reads stay O(levels) instead of O(orders).

use rust_decimal::Decimal;
use std::collections::VecDeque;
use uuid::Uuid;

use super::types::Order;

/// One price level: FIFO queue plus cached total remaining quantity
#[derive(Debug, Default)]
pub struct PriceLevel {
    orders: VecDeque<Order>,
    total: Decimal,
}

impl PriceLevel {
    pub fn new() -> Self {
        Self {
            orders: VecDeque::new(),
            total: Decimal::ZERO,
        }
    }

    /// Append a resting order at the back of the queue
    pub fn push_back(&mut self, order: Order) {
        self.total += order.remaining;
        self.orders.push_back(order);
    }

    /// The maker candidate: front-most resting order
    pub fn front_mut(&mut self) -> Option<&mut Order> {
        self.orders.front_mut()
    }

    /// Remove the front order after a full fill
    pub fn pop_front(&mut self) -> Option<Order> {
        let order = self.orders.pop_front()?;
        self.total -= order.remaining;
        Some(order)
    }

    /// Remove an arbitrary resting order by id (cancellation path)
    pub fn remove(&mut self, order_id: Uuid) -> Option<Order> {
        let pos = self.orders.iter().position(|o| o.id == order_id)?;
        let order = self.orders.remove(pos)?;
        self.total -= order.remaining;
        Some(order)
    }

    /// Deduct a fill from the cached total after reducing the front order
    pub fn reduce_front(&mut self, quantity: Decimal) {
        self.total -= quantity;
    }

    /// Sum of `remaining` across the queue
    pub fn total_quantity(&self) -> Decimal {
        self.total
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }
}
