//! Subscriber traits and the event payloads delivered to them.
//!
//! Subscribers are invoked in registration order after a book mutation has
//! already committed; a subscriber that panics or returns an error is
//! isolated from its neighbours and from engine state — see
//! `engine::notify_all` for the isolation boundary itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::order::{OrderId, Price, Quantity, Side, Symbol};
use crate::orderbook::BookDepth;
use crate::trade::{Trade, TradeId};

/// Emitted once per trade, immediately after it executes. `r#type` serializes
/// as the JSON key `"type"` (serde strips the raw-identifier prefix), giving
/// the literal `{"type":"trade",...}` shape external transports expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub r#type: String,
    pub symbol: Symbol,
    pub trade_id: TradeId,
    pub price: Price,
    pub quantity: Quantity,
    pub aggressor_side: Side,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub timestamp: DateTime<Utc>,
}

impl From<&Trade> for TradeEvent {
    fn from(trade: &Trade) -> Self {
        Self {
            r#type: "trade".to_string(),
            symbol: trade.symbol.clone(),
            trade_id: trade.trade_id,
            price: trade.price,
            quantity: trade.quantity,
            aggressor_side: trade.aggressor_side,
            maker_order_id: trade.maker_order_id,
            taker_order_id: trade.taker_order_id,
            timestamp: trade.timestamp,
        }
    }
}

/// Emitted whenever a submission or cancellation changes a book's depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookEvent {
    pub r#type: String,
    pub symbol: Symbol,
    pub bids: Vec<(Price, Quantity)>,
    pub asks: Vec<(Price, Quantity)>,
    pub timestamp: DateTime<Utc>,
}

impl OrderBookEvent {
    pub fn from_depth(depth: BookDepth, timestamp: DateTime<Utc>) -> Self {
        Self {
            r#type: "orderbook".to_string(),
            symbol: depth.symbol,
            bids: depth.bids,
            asks: depth.asks,
            timestamp,
        }
    }
}

/// A single price/quantity quote at the top of one side of the book.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quote {
    pub price: Price,
    pub quantity: Quantity,
}

/// Emitted whenever the best bid or best ask for a symbol changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BboEvent {
    pub r#type: String,
    pub symbol: Symbol,
    pub best_bid: Option<Quote>,
    pub best_ask: Option<Quote>,
    pub timestamp: DateTime<Utc>,
}

impl BboEvent {
    pub fn new(
        symbol: Symbol,
        best_bid: Option<Quote>,
        best_ask: Option<Quote>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            r#type: "bbo".to_string(),
            symbol,
            best_bid,
            best_ask,
            timestamp,
        }
    }
}

/// Receives a notification for every trade executed across any symbol.
#[async_trait]
pub trait TradeSubscriber: Send + Sync {
    async fn on_trade(&self, event: &TradeEvent);
}

/// Receives book-depth and BBO notifications for every mutating operation.
#[async_trait]
pub trait MarketDataSubscriber: Send + Sync {
    async fn on_book_update(&self, event: &OrderBookEvent);
    async fn on_bbo_update(&self, event: &BboEvent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    /// Prices and quantities must serialize as decimal strings, never as
    /// JSON numbers, so external transports never round-trip them through
    /// binary floating point.
    #[test]
    fn trade_event_serializes_price_and_quantity_as_strings() {
        let event = TradeEvent {
            r#type: "trade".to_string(),
            symbol: "BTC-USDT".into(),
            trade_id: Uuid::new_v4(),
            price: dec!(50000.5),
            quantity: dec!(1.25),
            aggressor_side: Side::Buy,
            maker_order_id: Uuid::new_v4(),
            taker_order_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], serde_json::json!("trade"));
        assert_eq!(json["price"], serde_json::json!("50000.5"));
        assert_eq!(json["quantity"], serde_json::json!("1.25"));
    }

    #[test]
    fn order_book_event_and_bbo_event_carry_their_type_tag() {
        let depth = BookDepth {
            symbol: "BTC-USDT".into(),
            bids: vec![(dec!(100), dec!(1))],
            asks: vec![],
        };
        let book_event = OrderBookEvent::from_depth(depth, Utc::now());
        let book_json = serde_json::to_value(&book_event).unwrap();
        assert_eq!(book_json["type"], serde_json::json!("orderbook"));

        let bbo_event = BboEvent::new(
            "BTC-USDT".into(),
            Some(Quote { price: dec!(100), quantity: dec!(1) }),
            None,
            Utc::now(),
        );
        let bbo_json = serde_json::to_value(&bbo_event).unwrap();
        assert_eq!(bbo_json["type"], serde_json::json!("bbo"));
    }
}
