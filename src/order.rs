//! Order identity, lifecycle, and fill bookkeeping.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ValidationError;

/// Exact decimal price. Never divided, only added/subtracted/compared.
pub type Price = Decimal;
/// Exact decimal quantity. Never divided, only added/subtracted/compared.
pub type Quantity = Decimal;
/// Globally unique order identifier, externally supplied or generated.
pub type OrderId = Uuid;
/// Globally unique identifier for a single fill record.
pub type FillId = Uuid;
/// A normalized (upper-case) trading symbol.
pub type Symbol = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl FromStr for Side {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(ValidationError::UnknownSide(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
    Ioc,
    Fok,
}

impl OrderType {
    /// LIMIT, IOC, and FOK all require a price; MARKET must not carry one.
    fn requires_price(self) -> bool {
        !matches!(self, OrderType::Market)
    }
}

impl FromStr for OrderType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "market" => Ok(OrderType::Market),
            "limit" => Ok(OrderType::Limit),
            "ioc" => Ok(OrderType::Ioc),
            "fok" => Ok(OrderType::Fok),
            other => Err(ValidationError::UnknownOrderType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// Terminal statuses accept no further fills or cancellations.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }
}

/// An append-only execution record against a single order. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub fill_id: FillId,
    pub order_id: OrderId,
    pub price: Price,
    pub quantity: Quantity,
    pub timestamp: DateTime<Utc>,
}

/// A single order: immutable identity plus mutable fill state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Quantity,
    pub price: Option<Price>,
    pub filled_quantity: Quantity,
    pub remaining_quantity: Quantity,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub fills: Vec<Fill>,
}

impl Order {
    /// Construct a new order. Rejects invalid quantity/price combinations
    /// before any state is created.
    pub fn new(
        order_id: OrderId,
        symbol: Symbol,
        side: Side,
        order_type: OrderType,
        quantity: Quantity,
        price: Option<Price>,
    ) -> Result<Self, ValidationError> {
        if quantity <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQuantity(quantity));
        }
        match (order_type.requires_price(), price) {
            (true, None) => return Err(ValidationError::MissingPrice(order_type)),
            (false, Some(price)) => return Err(ValidationError::UnexpectedPrice(price)),
            (true, Some(price)) if price <= Decimal::ZERO => {
                return Err(ValidationError::NonPositivePrice(price));
            }
            _ => {}
        }

        let now = Utc::now();
        Ok(Self {
            order_id,
            symbol,
            side,
            order_type,
            quantity,
            price,
            filled_quantity: Decimal::ZERO,
            remaining_quantity: quantity,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            fills: Vec::new(),
        })
    }

    pub fn is_buy(&self) -> bool {
        self.side == Side::Buy
    }

    pub fn is_resting_eligible(&self) -> bool {
        matches!(self.order_type, OrderType::Limit)
    }

    /// True iff this order can execute against a resting order quoted at
    /// `other_price`: MARKET always can; BUY needs its price to be at least
    /// `other_price`; SELL needs its price to be at most `other_price`.
    pub fn can_match_with(&self, other_price: Price) -> bool {
        match self.order_type {
            OrderType::Market => true,
            _ => {
                let price = self.price.expect("non-market order always carries a price");
                if self.is_buy() {
                    price >= other_price
                } else {
                    price <= other_price
                }
            }
        }
    }

    /// Apply a fill of `quantity` at `price`. Requires
    /// `0 < quantity <= remaining_quantity`; transitions status to
    /// `PartiallyFilled` or `Filled`.
    pub fn apply_fill(&mut self, quantity: Quantity, price: Price) -> Fill {
        assert!(quantity > Decimal::ZERO, "fill quantity must be positive");
        assert!(
            quantity <= self.remaining_quantity,
            "fill quantity exceeds remaining quantity"
        );

        let timestamp = Utc::now();
        let fill = Fill {
            fill_id: Uuid::new_v4(),
            order_id: self.order_id,
            price,
            quantity,
            timestamp,
        };

        self.filled_quantity += quantity;
        self.remaining_quantity -= quantity;
        self.updated_at = timestamp;
        self.status = if self.remaining_quantity == Decimal::ZERO {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.fills.push(fill.clone());
        fill
    }

    /// Cancel this order. Legal only from `Pending` or `PartiallyFilled`.
    pub fn cancel(&mut self) {
        assert!(
            !self.status.is_terminal(),
            "cancel called on a terminal order"
        );
        self.status = OrderStatus::Cancelled;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_order(order_type: OrderType, side: Side, price: Option<Price>, qty: Decimal) -> Order {
        Order::new(Uuid::new_v4(), "BTC-USDT".into(), side, order_type, qty, price).unwrap()
    }

    #[test]
    fn rejects_zero_quantity() {
        let err = Order::new(
            Uuid::new_v4(),
            "BTC-USDT".into(),
            Side::Buy,
            OrderType::Market,
            Decimal::ZERO,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::NonPositiveQuantity(_)));
    }

    #[test]
    fn rejects_limit_without_price() {
        let err = Order::new(
            Uuid::new_v4(),
            "BTC-USDT".into(),
            Side::Buy,
            OrderType::Limit,
            dec!(1),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::MissingPrice(_)));
    }

    #[test]
    fn rejects_market_with_price() {
        let err = Order::new(
            Uuid::new_v4(),
            "BTC-USDT".into(),
            Side::Buy,
            OrderType::Market,
            dec!(1),
            Some(dec!(100)),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::UnexpectedPrice(_)));
    }

    #[test]
    fn can_match_with_reflects_price_crossing() {
        let buy = new_order(OrderType::Limit, Side::Buy, Some(dec!(100)), dec!(1));
        assert!(buy.can_match_with(dec!(99)));
        assert!(buy.can_match_with(dec!(100)));
        assert!(!buy.can_match_with(dec!(101)));

        let sell = new_order(OrderType::Limit, Side::Sell, Some(dec!(100)), dec!(1));
        assert!(sell.can_match_with(dec!(101)));
        assert!(!sell.can_match_with(dec!(99)));

        let market = new_order(OrderType::Market, Side::Buy, None, dec!(1));
        assert!(market.can_match_with(dec!(1_000_000)));
    }

    #[test]
    fn apply_fill_transitions_through_statuses() {
        let mut order = new_order(OrderType::Limit, Side::Buy, Some(dec!(100)), dec!(10));
        order.apply_fill(dec!(4), dec!(100));
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.remaining_quantity, dec!(6));
        assert_eq!(order.filled_quantity, dec!(4));
        assert_eq!(order.fills.len(), 1);

        order.apply_fill(dec!(6), dec!(100));
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.remaining_quantity, Decimal::ZERO);
        assert_eq!(order.fills.len(), 2);
    }

    #[test]
    fn cancel_sets_terminal_status() {
        let mut order = new_order(OrderType::Limit, Side::Buy, Some(dec!(100)), dec!(10));
        order.cancel();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn side_and_order_type_parse_case_insensitively() {
        assert_eq!("BUY".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("sell".parse::<Side>().unwrap(), Side::Sell);
        assert!("sideways".parse::<Side>().is_err());

        assert_eq!("Limit".parse::<OrderType>().unwrap(), OrderType::Limit);
        assert_eq!("FOK".parse::<OrderType>().unwrap(), OrderType::Fok);
        assert!("stop".parse::<OrderType>().is_err());
    }
}
