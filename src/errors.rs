//! Error kinds for the matching core: validation, lookup, lifecycle, and
//! precondition failures. All are values returned to the caller; none panic
//! the engine. Internal invariant violations are a different matter — see
//! the `assert!`s in `price_level.rs` and `order.rs`, which are bugs, not
//! runtime conditions, and halt the engine (including in release builds)
//! rather than being compiled out.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::order::{OrderId, OrderStatus, OrderType, Symbol};

/// A submission failed validation before any order or book state changed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol must not be empty")]
    EmptySymbol,
    #[error("unknown order type: {0}")]
    UnknownOrderType(String),
    #[error("unknown side: {0}")]
    UnknownSide(String),
    #[error("quantity must be greater than zero, got {0}")]
    NonPositiveQuantity(Decimal),
    #[error("price must be greater than zero, got {0}")]
    NonPositivePrice(Decimal),
    #[error("price is required for {0:?} orders")]
    MissingPrice(OrderType),
    #[error("price must not be supplied for MARKET orders, got {0}")]
    UnexpectedPrice(Decimal),
    #[error("could not parse decimal value: {0}")]
    BadDecimal(String),
    #[error("order_id `{0}` is not a valid UUID")]
    BadOrderId(String),
    #[error("symbol `{0}` is not a supported symbol")]
    UnsupportedSymbol(Symbol),
}

/// A stable, structured error returned to callers of the public contract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("unknown order id: {0}")]
    UnknownOrder(OrderId),

    #[error("order {order_id} cannot be cancelled (status: {status:?})")]
    Lifecycle {
        order_id: OrderId,
        status: OrderStatus,
    },

    #[error("order symbol `{found}` does not match book symbol `{expected}`")]
    SymbolMismatch { expected: Symbol, found: Symbol },
}
