//! The matching engine: symbol-routed books, request validation, trade
//! history, and subscriber fan-out.
//!
//! Each symbol owns an independent `OrderBook` behind its own
//! `tokio::sync::Mutex`, so matching across symbols proceeds in parallel
//! while matching within a symbol is strictly serial — the lock is held for
//! the full duration of a submission's match, and released before
//! subscribers are notified.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::errors::{EngineError, ValidationError};
use crate::events::{
    BboEvent, MarketDataSubscriber, OrderBookEvent, Quote, TradeEvent, TradeSubscriber,
};
use crate::order::{Order, OrderId, Price, Quantity, Side, Symbol};
use crate::orderbook::{Bbo, BookDepth, OrderBook};
use crate::trade::Trade;

/// A quantity or price as it arrives over the wire: a decimal string or a
/// bare JSON number, per `spec.md` §6. Parsed into an exact `Decimal` by
/// `MatchingEngine::validate`, never before.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericValue {
    Text(String),
    Number(f64),
}

impl NumericValue {
    fn parse(&self) -> Result<Decimal, ValidationError> {
        match self {
            NumericValue::Text(text) => Decimal::from_str(text.trim())
                .map_err(|_| ValidationError::BadDecimal(text.clone())),
            NumericValue::Number(number) => Decimal::from_str(&number.to_string())
                .map_err(|_| ValidationError::BadDecimal(number.to_string())),
        }
    }
}

impl From<Decimal> for NumericValue {
    fn from(value: Decimal) -> Self {
        NumericValue::Text(value.to_string())
    }
}

/// A not-yet-validated submission, as received at the public boundary.
/// String/numeric fields mirror the wire representation; `Order::new` is
/// only reached after every field here has been parsed and checked.
#[derive(Debug, Clone)]
pub struct NewOrderRequest {
    /// Externally supplied order id, presumably a UUID string; `None`
    /// generates one. A present but malformed id is a validation failure,
    /// not a silent fallback to a fresh id.
    pub order_id: Option<String>,
    pub symbol: Symbol,
    pub side: String,
    pub order_type: String,
    pub quantity: NumericValue,
    pub price: Option<NumericValue>,
}

/// Aggregate counters for a single symbol's trading activity.
#[derive(Debug, Clone, Default)]
pub struct SymbolStatistics {
    pub trade_count: u64,
    pub total_volume: Quantity,
    pub last_price: Option<Price>,
}

/// Engine-wide counters, independent of any single symbol: total orders
/// submitted and total trades executed across every book, plus the list of
/// symbols that currently have a book.
#[derive(Debug, Clone, Default)]
pub struct EngineStatistics {
    pub orders_processed: u64,
    pub trades_executed: u64,
    pub active_symbols: Vec<Symbol>,
}

struct SymbolState {
    book: Mutex<OrderBook>,
    recent_trades: Mutex<VecDeque<Trade>>,
    statistics: Mutex<SymbolStatistics>,
}

impl SymbolState {
    fn new(symbol: Symbol) -> Self {
        Self {
            book: Mutex::new(OrderBook::new(symbol)),
            recent_trades: Mutex::new(VecDeque::new()),
            statistics: Mutex::new(SymbolStatistics::default()),
        }
    }
}

pub struct MatchingEngine {
    config: EngineConfig,
    symbols: DashMap<Symbol, Arc<SymbolState>>,
    order_index: DashMap<OrderId, Symbol>,
    market_data_subscribers: Mutex<Vec<Arc<dyn MarketDataSubscriber>>>,
    trade_subscribers: Mutex<Vec<Arc<dyn TradeSubscriber>>>,
    running: AtomicBool,
    orders_processed: std::sync::atomic::AtomicU64,
    trades_executed: std::sync::atomic::AtomicU64,
}

impl MatchingEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            symbols: DashMap::new(),
            order_index: DashMap::new(),
            market_data_subscribers: Mutex::new(Vec::new()),
            trade_subscribers: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            orders_processed: std::sync::atomic::AtomicU64::new(0),
            trades_executed: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Marks the engine as accepting traffic. There is no background work
    /// to spin up — books are created lazily per symbol — so this is a
    /// bookkeeping flag, not a precondition for `submit`/`cancel`.
    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!("matching engine started");
    }

    /// Marks the engine as no longer accepting traffic. Does not drop any
    /// book state; a stopped engine can be `start`ed again.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("matching engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn subscribe_market_data(&self, subscriber: Arc<dyn MarketDataSubscriber>) {
        self.market_data_subscribers.lock().await.push(subscriber);
    }

    pub async fn subscribe_trades(&self, subscriber: Arc<dyn TradeSubscriber>) {
        self.trade_subscribers.lock().await.push(subscriber);
    }

    /// Validate, match, and (if resting) rest a new order. Notifies
    /// subscribers only after the book's own lock has been released.
    #[instrument(skip(self, request), fields(symbol = %request.symbol))]
    pub async fn submit(&self, request: NewOrderRequest) -> Result<Order, EngineError> {
        let order = self.validate(request)?;
        let symbol = order.symbol.clone();
        let state = self.state_for(&symbol);

        let (final_order, trades, depth) = {
            let mut book = state.book.lock().await;
            let outcome = book.add_order(order)?;
            let depth = book.depth(self.config.default_depth_levels);
            (outcome.order, outcome.trades, depth)
        };

        self.order_index.insert(final_order.order_id, symbol.clone());
        self.orders_processed.fetch_add(1, Ordering::SeqCst);

        if !trades.is_empty() {
            self.trades_executed
                .fetch_add(trades.len() as u64, Ordering::SeqCst);
            self.record_trades(&state, &trades).await;
        }
        self.notify(&symbol, &trades, depth).await;

        debug!(order_id = %final_order.order_id, trades = trades.len(), "order processed");
        Ok(final_order)
    }

    /// Cancel a resting order by id.
    pub async fn cancel(&self, order_id: OrderId) -> Result<(), EngineError> {
        let symbol = self
            .order_index
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .ok_or(EngineError::UnknownOrder(order_id))?;
        let state = self.state_for(&symbol);

        let (cancelled, status, depth) = {
            let mut book = state.book.lock().await;
            let cancelled = book.cancel_order(order_id);
            let status = book.get_order(order_id).map(|o| o.status);
            let depth = book.depth(self.config.default_depth_levels);
            (cancelled, status, depth)
        };

        if !cancelled {
            return Err(EngineError::Lifecycle {
                order_id,
                status: status.unwrap_or(crate::order::OrderStatus::Rejected),
            });
        }

        self.notify(&symbol, &[], depth).await;
        Ok(())
    }

    pub async fn get_order_status(&self, order_id: OrderId) -> Result<Order, EngineError> {
        let symbol = self
            .order_index
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .ok_or(EngineError::UnknownOrder(order_id))?;
        let state = self.state_for(&symbol);
        let book = state.book.lock().await;
        book.get_order(order_id)
            .cloned()
            .ok_or(EngineError::UnknownOrder(order_id))
    }

    pub async fn get_bbo(&self, symbol: &str) -> Option<Bbo> {
        let state = self.symbols.get(symbol).map(|entry| entry.value().clone())?;
        Some(state.book.lock().await.bbo())
    }

    /// Top `levels` price levels per side, in priority order. `levels` is
    /// clamped into `[1, max_depth_levels]` per the public contract.
    pub async fn get_depth(&self, symbol: &str, levels: Option<usize>) -> Option<BookDepth> {
        let state = self.symbols.get(symbol).map(|entry| entry.value().clone())?;
        let levels = levels
            .unwrap_or(self.config.default_depth_levels)
            .clamp(1, self.config.max_depth_levels);
        Some(state.book.lock().await.depth(levels))
    }

    /// Most recent `limit` trades for `symbol`, in chronological order.
    /// `limit` is clamped into `[1, max_recent_trades_query]`.
    pub async fn get_recent_trades(&self, symbol: &str, limit: Option<usize>) -> Vec<Trade> {
        let Some(state) = self.symbols.get(symbol).map(|entry| entry.value().clone()) else {
            return Vec::new();
        };
        let trades = state.recent_trades.lock().await;
        let limit = limit
            .unwrap_or(trades.len())
            .clamp(1, self.config.max_recent_trades_query);
        let mut recent: Vec<Trade> = trades.iter().rev().take(limit).cloned().collect();
        recent.reverse();
        recent
    }

    /// Per-symbol trade counters, volume, and last traded price.
    pub async fn get_symbol_statistics(&self, symbol: &str) -> Option<SymbolStatistics> {
        let state = self.symbols.get(symbol).map(|entry| entry.value().clone())?;
        Some(state.statistics.lock().await.clone())
    }

    /// Engine-wide counters: total orders submitted and trades executed
    /// across every symbol, and the list of symbols with an active book.
    pub fn get_statistics(&self) -> EngineStatistics {
        EngineStatistics {
            orders_processed: self.orders_processed.load(Ordering::SeqCst),
            trades_executed: self.trades_executed.load(Ordering::SeqCst),
            active_symbols: self.symbols.iter().map(|entry| entry.key().clone()).collect(),
        }
    }

    fn state_for(&self, symbol: &str) -> Arc<SymbolState> {
        self.symbols
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(SymbolState::new(symbol.to_string())))
            .clone()
    }

    async fn record_trades(&self, state: &SymbolState, trades: &[Trade]) {
        let mut recent = state.recent_trades.lock().await;
        let mut stats = state.statistics.lock().await;
        for trade in trades {
            recent.push_back(trade.clone());
            while recent.len() > self.config.recent_trades_capacity {
                recent.pop_front();
            }
            stats.trade_count += 1;
            stats.total_volume += trade.quantity;
            stats.last_price = Some(trade.price);
        }
    }

    fn validate(&self, request: NewOrderRequest) -> Result<Order, ValidationError> {
        if request.symbol.trim().is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        let symbol = request.symbol.to_ascii_uppercase();
        if !self.config.allows_symbol(&symbol) {
            return Err(ValidationError::UnsupportedSymbol(symbol));
        }

        let side = Side::from_str(&request.side)?;
        let order_type = crate::order::OrderType::from_str(&request.order_type)?;
        let order_id = match request.order_id {
            Some(raw) => {
                Uuid::parse_str(raw.trim()).map_err(|_| ValidationError::BadOrderId(raw))?
            }
            None => Uuid::new_v4(),
        };
        let quantity = request.quantity.parse()?;
        let price = request.price.as_ref().map(NumericValue::parse).transpose()?;

        Order::new(order_id, symbol, side, order_type, quantity, price)
    }

    /// Deliver trade and book-state notifications to every registered
    /// subscriber, in registration order. A subscriber that panics is
    /// caught and logged; it never affects book state or its peers.
    async fn notify(&self, symbol: &str, trades: &[Trade], depth: BookDepth) {
        let timestamp = chrono::Utc::now();

        if !trades.is_empty() {
            let subscribers = self.trade_subscribers.lock().await.clone();
            for trade in trades {
                let event = TradeEvent::from(trade);
                for subscriber in &subscribers {
                    notify_one_trade(subscriber.clone(), event.clone()).await;
                }
            }
        }

        let best_bid = depth.bids.first().map(|&(price, quantity)| Quote { price, quantity });
        let best_ask = depth.asks.first().map(|&(price, quantity)| Quote { price, quantity });
        let bbo_event = BboEvent::new(symbol.to_string(), best_bid, best_ask, timestamp);
        let book_event = OrderBookEvent::from_depth(depth, timestamp);
        let subscribers = self.market_data_subscribers.lock().await.clone();
        for subscriber in &subscribers {
            notify_one_book(subscriber.clone(), book_event.clone()).await;
            notify_one_bbo(subscriber.clone(), bbo_event.clone()).await;
        }
    }
}

/// Subscriber notification is isolated on a dedicated task: a panicking
/// callback surfaces as a `JoinError` here rather than unwinding into the
/// engine, so it never poisons book state or stops its peers from being
/// notified.
async fn notify_one_trade(subscriber: Arc<dyn TradeSubscriber>, event: TradeEvent) {
    let handle = tokio::spawn(async move { subscriber.on_trade(&event).await });
    if handle.await.is_err() {
        tracing::warn!("trade subscriber panicked; continuing with remaining subscribers");
    }
}

async fn notify_one_book(subscriber: Arc<dyn MarketDataSubscriber>, event: OrderBookEvent) {
    let handle = tokio::spawn(async move { subscriber.on_book_update(&event).await });
    if handle.await.is_err() {
        tracing::warn!("market data subscriber panicked on book update; continuing");
    }
}

async fn notify_one_bbo(subscriber: Arc<dyn MarketDataSubscriber>, event: BboEvent) {
    let handle = tokio::spawn(async move { subscriber.on_bbo_update(&event).await });
    if handle.await.is_err() {
        tracing::warn!("market data subscriber panicked on BBO update; continuing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;

    fn request(symbol: &str, side: &str, order_type: &str, qty: Decimal, price: Option<Decimal>) -> NewOrderRequest {
        NewOrderRequest {
            order_id: None,
            symbol: symbol.to_string(),
            side: side.to_string(),
            order_type: order_type.to_string(),
            quantity: qty.into(),
            price: price.map(NumericValue::from),
        }
    }

    #[tokio::test]
    async fn submit_and_match_across_two_orders() {
        let engine = MatchingEngine::new(EngineConfig::default());
        engine
            .submit(request("BTC-USDT", "sell", "limit", dec!(1), Some(dec!(100))))
            .await
            .unwrap();
        let taker = engine
            .submit(request("BTC-USDT", "buy", "limit", dec!(1), Some(dec!(100))))
            .await
            .unwrap();

        assert_eq!(taker.status, crate::order::OrderStatus::Filled);
        let stats = engine.get_symbol_statistics("BTC-USDT").await.unwrap();
        assert_eq!(stats.trade_count, 1);
        assert_eq!(stats.total_volume, dec!(1));

        let engine_stats = engine.get_statistics();
        assert_eq!(engine_stats.orders_processed, 2);
        assert_eq!(engine_stats.trades_executed, 1);
        assert_eq!(engine_stats.active_symbols, vec!["BTC-USDT".to_string()]);
    }

    #[tokio::test]
    async fn unsupported_symbol_is_rejected() {
        let engine = MatchingEngine::new(
            EngineConfig::default().with_supported_symbols(["BTC-USDT".to_string()]),
        );
        let err = engine
            .submit(request("DOGE-USDT", "buy", "limit", dec!(1), Some(dec!(1))))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::UnsupportedSymbol(_))
        ));
    }

    #[tokio::test]
    async fn cancel_unknown_order_id_fails() {
        let engine = MatchingEngine::new(EngineConfig::default());
        let err = engine.cancel(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownOrder(_)));
    }

    #[tokio::test]
    async fn cancel_resting_order_removes_it_from_book() {
        let engine = MatchingEngine::new(EngineConfig::default());
        let order = engine
            .submit(request("BTC-USDT", "buy", "limit", dec!(1), Some(dec!(99))))
            .await
            .unwrap();

        engine.cancel(order.order_id).await.unwrap();
        let status = engine.get_order_status(order.order_id).await.unwrap();
        assert_eq!(status.status, crate::order::OrderStatus::Cancelled);
        assert!(engine.get_bbo("BTC-USDT").await.unwrap().best_bid.is_none());
    }

    struct CountingTradeSubscriber {
        count: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TradeSubscriber for CountingTradeSubscriber {
        async fn on_trade(&self, _event: &TradeEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn trade_subscribers_are_notified_after_match() {
        let engine = MatchingEngine::new(EngineConfig::default());
        let subscriber = Arc::new(CountingTradeSubscriber {
            count: AtomicUsize::new(0),
        });
        engine.subscribe_trades(subscriber.clone()).await;

        engine
            .submit(request("BTC-USDT", "sell", "limit", dec!(1), Some(dec!(100))))
            .await
            .unwrap();
        engine
            .submit(request("BTC-USDT", "buy", "limit", dec!(1), Some(dec!(100))))
            .await
            .unwrap();

        assert_eq!(subscriber.count.load(Ordering::SeqCst), 1);
    }

    struct PanickingSubscriber;

    #[async_trait::async_trait]
    impl TradeSubscriber for PanickingSubscriber {
        async fn on_trade(&self, _event: &TradeEvent) {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn panicking_subscriber_does_not_break_engine_or_peers() {
        let engine = MatchingEngine::new(EngineConfig::default());
        let counting = Arc::new(CountingTradeSubscriber {
            count: AtomicUsize::new(0),
        });
        engine.subscribe_trades(Arc::new(PanickingSubscriber)).await;
        engine.subscribe_trades(counting.clone()).await;

        engine
            .submit(request("BTC-USDT", "sell", "limit", dec!(1), Some(dec!(100))))
            .await
            .unwrap();
        engine
            .submit(request("BTC-USDT", "buy", "limit", dec!(1), Some(dec!(100))))
            .await
            .unwrap();

        assert_eq!(counting.count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_quantity_string_is_a_validation_error() {
        let engine = MatchingEngine::new(EngineConfig::default());
        let err = engine
            .submit(NewOrderRequest {
                order_id: None,
                symbol: "BTC-USDT".to_string(),
                side: "buy".to_string(),
                order_type: "limit".to_string(),
                quantity: NumericValue::Text("not-a-number".to_string()),
                price: Some(NumericValue::Text("100".to_string())),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::BadDecimal(_))
        ));
    }

    #[tokio::test]
    async fn malformed_order_id_is_a_validation_error() {
        let engine = MatchingEngine::new(EngineConfig::default());
        let err = engine
            .submit(NewOrderRequest {
                order_id: Some("not-a-uuid".to_string()),
                symbol: "BTC-USDT".to_string(),
                side: "buy".to_string(),
                order_type: "limit".to_string(),
                quantity: NumericValue::Text("1".to_string()),
                price: Some(NumericValue::Text("100".to_string())),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::BadOrderId(_))
        ));
    }

    #[tokio::test]
    async fn numeric_wire_values_and_string_order_id_are_accepted() {
        let engine = MatchingEngine::new(EngineConfig::default());
        let order_id = Uuid::new_v4();
        let order = engine
            .submit(NewOrderRequest {
                order_id: Some(order_id.to_string()),
                symbol: "BTC-USDT".to_string(),
                side: "buy".to_string(),
                order_type: "limit".to_string(),
                quantity: NumericValue::Number(2.5),
                price: Some(NumericValue::Number(100.0)),
            })
            .await
            .unwrap();

        assert_eq!(order.order_id, order_id);
        assert_eq!(order.quantity, dec!(2.5));
        assert_eq!(order.price, Some(dec!(100)));
    }
}
