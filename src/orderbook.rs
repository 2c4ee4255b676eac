//! Per-symbol order book: two price ladders, the matching algorithm, and
//! lookup by order id.
//!
//! Best-price access uses `BTreeMap<Price, PriceLevel>` for both sides
//! (ascending key order natively; bids walked in reverse, asks forward) —
//! the "ordered map" alternative to a heap with lazy deletion. Empty price
//! levels are pruned the instant they empty, so `best_bid`/`best_ask` never
//! need to skip stale entries.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::errors::EngineError;
use crate::order::{Order, OrderId, OrderStatus, OrderType, Price, Quantity, Side, Symbol};
use crate::price_level::PriceLevel;
use crate::trade::Trade;

/// The outcome of a single `add_order` call: the order's final state and
/// any trades generated while processing it.
#[derive(Debug, Clone)]
pub struct AddOrderOutcome {
    pub order: Order,
    pub trades: Vec<Trade>,
}

/// Top-of-book levels for one side, in priority order.
pub type DepthSide = Vec<(Price, Quantity)>;

/// A snapshot of book depth, best-first on each side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookDepth {
    pub symbol: Symbol,
    pub bids: DepthSide,
    pub asks: DepthSide,
}

/// A single best-bid/best-ask quote.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bbo {
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
}

pub struct OrderBook {
    symbol: Symbol,
    bids: BTreeMap<Price, PriceLevel>,
    asks: BTreeMap<Price, PriceLevel>,
    orders: HashMap<OrderId, Order>,
}

impl OrderBook {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            orders: HashMap::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Highest bid price with a non-empty level, if any.
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.keys().next_back().copied()
    }

    /// Lowest ask price with a non-empty level, if any.
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.keys().next().copied()
    }

    pub fn spread(&self) -> Option<Price> {
        Some(self.best_ask()? - self.best_bid()?)
    }

    pub fn bbo(&self) -> Bbo {
        Bbo {
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
        }
    }

    /// Top `levels` price levels on each side, in priority order, as
    /// `(price, aggregate_quantity)` pairs.
    pub fn depth(&self, levels: usize) -> BookDepth {
        let bids = self
            .bids
            .iter()
            .rev()
            .take(levels)
            .map(|(price, level)| (*price, level.total_quantity()))
            .collect();
        let asks = self
            .asks
            .iter()
            .take(levels)
            .map(|(price, level)| (*price, level.total_quantity()))
            .collect();
        BookDepth {
            symbol: self.symbol.clone(),
            bids,
            asks,
        }
    }

    /// Current (possibly terminal) state of an order this book has ever
    /// accepted.
    pub fn get_order(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    /// Process a newly-validated order: match whatever is marketable, rest
    /// any residual allowed to rest. Atomic — either the order is fully
    /// processed and registered, or (on a symbol mismatch) the book is left
    /// completely unchanged.
    pub fn add_order(&mut self, mut order: Order) -> Result<AddOrderOutcome, EngineError> {
        if order.symbol != self.symbol {
            return Err(EngineError::SymbolMismatch {
                expected: self.symbol.clone(),
                found: order.symbol.clone(),
            });
        }

        let mut trades = Vec::new();

        if self.is_marketable(&order) {
            if order.order_type == OrderType::Fok && !self.fok_fillable(&order) {
                trace!(order_id = %order.order_id, "FOK order unfillable, cancelling with no trades");
                order.cancel();
                self.orders.insert(order.order_id, order.clone());
                return Ok(AddOrderOutcome { order, trades });
            }

            trades = match order.side {
                Side::Buy => {
                    match_against(&mut order, &mut self.asks, &mut self.orders, &self.symbol, true)
                }
                Side::Sell => {
                    match_against(&mut order, &mut self.bids, &mut self.orders, &self.symbol, false)
                }
            };
        }

        match order.order_type {
            OrderType::Market => {
                if order.remaining_quantity > Decimal::ZERO {
                    order.cancel();
                }
            }
            OrderType::Limit => {
                if order.remaining_quantity > Decimal::ZERO {
                    self.rest(&order);
                }
            }
            OrderType::Ioc | OrderType::Fok => {
                if order.remaining_quantity > Decimal::ZERO {
                    order.cancel();
                }
            }
        }

        self.orders.insert(order.order_id, order.clone());
        Ok(AddOrderOutcome { order, trades })
    }

    /// Cancel a resting order. Returns `false` if the id is unknown or the
    /// order is not currently resting (already terminal, or a non-LIMIT
    /// type that never rests).
    pub fn cancel_order(&mut self, order_id: OrderId) -> bool {
        let Some(existing) = self.orders.get(&order_id) else {
            return false;
        };
        if existing.status.is_terminal() {
            return false;
        }
        let side = existing.side;
        let Some(price) = existing.price else {
            return false;
        };
        let remaining = existing.remaining_quantity;

        let book_side = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let Some(level) = book_side.get_mut(&price) else {
            return false;
        };
        let removed = level.remove(order_id, remaining);
        if removed {
            if level.is_empty() {
                book_side.remove(&price);
            }
            self.orders
                .get_mut(&order_id)
                .expect("just looked up")
                .cancel();
        }
        removed
    }

    fn rest(&mut self, order: &Order) {
        let price = order
            .price
            .expect("LIMIT orders always carry a price when resting");
        let book_side = match order.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        book_side
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price))
            .push_back(order.order_id, order.remaining_quantity);
    }

    /// A non-MARKET order is marketable only if its price crosses the
    /// opposite best; MARKET orders are always marketable.
    fn is_marketable(&self, order: &Order) -> bool {
        match order.order_type {
            OrderType::Market => true,
            _ => {
                let price = order.price.expect("non-market orders always carry a price");
                if order.is_buy() {
                    self.best_ask().is_some_and(|ask| price >= ask)
                } else {
                    self.best_bid().is_some_and(|bid| price <= bid)
                }
            }
        }
    }

    /// Sum of available quantity on the opposite side at prices the order
    /// can cross, stopping early once it covers `order.remaining_quantity`.
    fn fok_fillable(&self, order: &Order) -> bool {
        let mut available = Decimal::ZERO;
        if order.is_buy() {
            for level in self.asks.values() {
                if !order.can_match_with(level.price()) {
                    break;
                }
                available += level.total_quantity();
                if available >= order.remaining_quantity {
                    return true;
                }
            }
        } else {
            for level in self.bids.values().rev() {
                if !order.can_match_with(level.price()) {
                    break;
                }
                available += level.total_quantity();
                if available >= order.remaining_quantity {
                    return true;
                }
            }
        }
        available >= order.remaining_quantity
    }
}

/// Walk one side of the book (`book_side`), consuming the incoming order's
/// remaining quantity against resting makers in strict price-time priority.
/// `ascending` selects the iteration direction: `true` walks asks
/// lowest-first (for an incoming BUY), `false` walks bids highest-first (for
/// an incoming SELL). A level is fully drained — or the incoming order runs
/// out — before the walk advances to the next price, which is what prevents
/// trade-through.
fn match_against(
    incoming: &mut Order,
    book_side: &mut BTreeMap<Price, PriceLevel>,
    orders: &mut HashMap<OrderId, Order>,
    symbol: &str,
    ascending: bool,
) -> Vec<Trade> {
    let mut trades = Vec::new();

    loop {
        if incoming.remaining_quantity <= Decimal::ZERO {
            break;
        }
        let Some(price) = best_price(book_side, ascending) else {
            break;
        };
        if !incoming.can_match_with(price) {
            break;
        }

        let level = book_side
            .get_mut(&price)
            .expect("best price always has a live level");

        while incoming.remaining_quantity > Decimal::ZERO {
            let Some(maker_id) = level.front() else {
                break;
            };
            let maker = orders
                .get_mut(&maker_id)
                .expect("a resting order id always indexes a live order");

            let trade_quantity = incoming.remaining_quantity.min(maker.remaining_quantity);
            let trade_price = maker
                .price
                .expect("resting orders always carry their own price");

            maker.apply_fill(trade_quantity, trade_price);
            incoming.apply_fill(trade_quantity, trade_price);

            trades.push(Trade::new(
                symbol.to_string(),
                trade_price,
                trade_quantity,
                maker.order_id,
                incoming.order_id,
                incoming.side,
            ));

            if maker.status == OrderStatus::Filled {
                level.pop_front(trade_quantity);
                orders.remove(&maker_id);
            } else {
                level.reduce_head(trade_quantity);
            }
        }

        if level.is_empty() {
            warn!(%price, "price level drained, pruning from ladder");
            book_side.remove(&price);
        }
    }

    trades
}

fn best_price(side: &BTreeMap<Price, PriceLevel>, ascending: bool) -> Option<Price> {
    if ascending {
        side.keys().next().copied()
    } else {
        side.keys().next_back().copied()
    }
}
