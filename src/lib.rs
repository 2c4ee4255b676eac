//! A single-venue limit order book matching core.
//!
//! [`engine::MatchingEngine`] routes orders to a per-symbol [`orderbook::OrderBook`]
//! and matches them in strict price-time priority. See [`order::Order`] for
//! the lifecycle of a single order and [`trade::Trade`] for the execution
//! record it produces.

pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod order;
pub mod orderbook;
pub mod price_level;
pub mod trade;

pub use config::EngineConfig;
pub use engine::{EngineStatistics, MatchingEngine, NewOrderRequest, NumericValue, SymbolStatistics};
pub use errors::{EngineError, ValidationError};
pub use order::{Fill, Order, OrderId, OrderStatus, OrderType, Price, Quantity, Side, Symbol};
pub use orderbook::{Bbo, BookDepth, OrderBook};
pub use trade::{Trade, TradeId};
