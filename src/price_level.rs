//! A FIFO queue of resting orders at a single price.
//!
//! Arena-style: a `PriceLevel` holds order ids, never `Order` values. The
//! owning `OrderBook` is the sole place an `Order` actually lives, so there
//! is no aliasing between a level and the book's id index.

use std::collections::VecDeque;

use rust_decimal::Decimal;

use crate::order::{OrderId, Price, Quantity};

/// FIFO queue of live order ids resting at a single price, with the
/// aggregate quantity cached as `total_quantity`. Invariant:
/// `total_quantity == sum(remaining_quantity for every order in the queue)`,
/// maintained by the caller (`OrderBook`) on every push/pop/partial fill of
/// the head order via the methods below, each of which takes the quantity
/// delta to apply rather than re-deriving it from the `Order` itself.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    price: Price,
    orders: VecDeque<OrderId>,
    total_quantity: Quantity,
}

impl PriceLevel {
    pub fn new(price: Price) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
            total_quantity: Decimal::ZERO,
        }
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn total_quantity(&self) -> Quantity {
        self.total_quantity
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Append `order_id` at the tail, contributing `quantity` to the total.
    pub fn push_back(&mut self, order_id: OrderId, quantity: Quantity) {
        self.orders.push_back(order_id);
        self.total_quantity += quantity;
    }

    /// The order currently at the head of the queue (oldest arrival), if any.
    pub fn front(&self) -> Option<OrderId> {
        self.orders.front().copied()
    }

    /// Pop the head order, subtracting `quantity` (the amount it was just
    /// reduced by, or its full remaining quantity if it leaves unfilled)
    /// from the total.
    pub fn pop_front(&mut self, quantity: Quantity) -> Option<OrderId> {
        let id = self.orders.pop_front()?;
        self.total_quantity -= quantity;
        assert!(
            self.total_quantity >= Decimal::ZERO,
            "price level total_quantity went negative"
        );
        Some(id)
    }

    /// Record a partial fill of the current head order without popping it.
    pub fn reduce_head(&mut self, fill_quantity: Quantity) {
        self.total_quantity -= fill_quantity;
        assert!(
            self.total_quantity >= Decimal::ZERO,
            "price level total_quantity went negative"
        );
    }

    /// Remove a specific order (by id) from anywhere in the queue. O(n)
    /// worst case: acceptable because most cancels target levels with few
    /// orders. Returns `true` if found and removed.
    pub fn remove(&mut self, order_id: OrderId, remaining_quantity: Quantity) -> bool {
        if let Some(pos) = self.orders.iter().position(|id| *id == order_id) {
            self.orders.remove(pos);
            self.total_quantity -= remaining_quantity;
            assert!(
                self.total_quantity >= Decimal::ZERO,
                "price level total_quantity went negative"
            );
            true
        } else {
            false
        }
    }
}
