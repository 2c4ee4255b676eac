//! Trade records: immutable executions between a maker and a taker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::order::{OrderId, Price, Quantity, Side, Symbol};

/// A globally unique trade identifier.
pub type TradeId = Uuid;

/// One execution between a resting maker order and an incoming taker order.
/// Trade price always equals the maker's resting price; immutable after
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub symbol: Symbol,
    pub price: Price,
    pub quantity: Quantity,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub aggressor_side: Side,
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    /// Build a new trade. The aggressor side is always the taker's side.
    pub fn new(
        symbol: Symbol,
        price: Price,
        quantity: Quantity,
        maker_order_id: OrderId,
        taker_order_id: OrderId,
        aggressor_side: Side,
    ) -> Self {
        Self {
            trade_id: Uuid::new_v4(),
            symbol,
            price,
            quantity,
            maker_order_id,
            taker_order_id,
            aggressor_side,
            timestamp: Utc::now(),
        }
    }
}
