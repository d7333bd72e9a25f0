//! Type definitions for the RIT simulator REST API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Response of `GET /case`.
#[derive(Debug, Clone, Deserialize)]
pub struct CaseInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub period: Option<i64>,
    pub tick: i64,
    #[serde(default)]
    pub ticks_per_period: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// One row of `GET /securities`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Security {
    pub ticker: String,
    #[serde(default)]
    pub position: Decimal,
    #[serde(default)]
    pub bid: Option<Decimal>,
    #[serde(default)]
    pub ask: Option<Decimal>,
    #[serde(default)]
    pub last: Option<Decimal>,
}

/// A single price level in the order book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    #[serde(default)]
    pub quantity: Option<Decimal>,
}

/// Response of `GET /securities/book`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Book {
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    #[serde(default)]
    pub asks: Vec<BookLevel>,
}

/// Best bid and ask for one ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub ticker: String,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
}

impl Quote {
    pub fn mid(&self) -> Decimal {
        (self.best_bid + self.best_ask) / Decimal::TWO
    }
}

/// Order side, serialized as the simulator's `action` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> Decimal {
        match self {
            OrderSide::Buy => Decimal::ONE,
            OrderSide::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

/// Order status, also used as the `status` filter of `GET /orders`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Open,
    Transacted,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "OPEN",
            OrderStatus::Transacted => "TRANSACTED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

/// New order request, sent as query parameters of `POST /orders`.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    pub ticker: String,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub action: OrderSide,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

impl NewOrder {
    pub fn market(ticker: &str, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            ticker: ticker.to_string(),
            order_type: OrderType::Market,
            quantity,
            action: side,
            price: None,
        }
    }

    pub fn limit(ticker: &str, side: OrderSide, quantity: Decimal, price: Decimal) -> Self {
        Self {
            ticker: ticker.to_string(),
            order_type: OrderType::Limit,
            quantity,
            action: side,
            price: Some(price),
        }
    }
}

/// Order as reported by the simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: i64,
    pub ticker: String,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub action: OrderSide,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub quantity_filled: Decimal,
    #[serde(default)]
    pub vwap: Option<Decimal>,
    pub status: OrderStatus,
    #[serde(default)]
    pub tick: Option<i64>,
}

/// Response of `GET /trader`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraderInfo {
    #[serde(default)]
    pub trader_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub nlv: Decimal,
}

/// One row of `GET /limits`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimit {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub gross: Decimal,
    #[serde(default)]
    pub net: Decimal,
    #[serde(default)]
    pub gross_limit: Option<Decimal>,
    #[serde(default)]
    pub net_limit: Option<Decimal>,
}

/// One row of `GET /news`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub news_id: i64,
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tick: Option<i64>,
}

/// A leased facility (storage tank, refinery, pipeline).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub id: i64,
    pub ticker: String,
    #[serde(default)]
    pub containment_usage: Option<Decimal>,
    #[serde(default)]
    pub next_lease_tick: Option<i64>,
    #[serde(default)]
    pub start_lease_tick: Option<i64>,
}

impl Lease {
    /// A lease holding nothing is abandoned and can be reclaimed.
    pub fn is_empty(&self) -> bool {
        self.containment_usage
            .map(|usage| usage.is_zero())
            .unwrap_or(true)
    }
}

/// Parameters of `POST /leases` (new lease) and `POST /leases/{id}` (use lease).
#[derive(Debug, Clone, Default, Serialize)]
pub struct LeaseRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity1: Option<Decimal>,
}

impl LeaseRequest {
    /// Lease a facility without immediately using it.
    pub fn facility(ticker: &str) -> Self {
        Self {
            ticker: Some(ticker.to_string()),
            ..Default::default()
        }
    }

    /// Lease a facility and feed it `quantity` of `from` in the same call.
    pub fn with_input(ticker: &str, from: &str, quantity: Decimal) -> Self {
        Self {
            ticker: Some(ticker.to_string()),
            from1: Some(from.to_string()),
            quantity1: Some(quantity),
        }
    }

    /// Feed an already-held lease.
    pub fn input_only(from: &str, quantity: Decimal) -> Self {
        Self {
            ticker: None,
            from1: Some(from.to_string()),
            quantity1: Some(quantity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_deserializes_float_quantities() {
        let json = r#"{
            "order_id": 42, "period": 1, "tick": 10, "trader_id": "t1",
            "ticker": "CL", "type": "LIMIT", "quantity": 5000.0, "action": "BUY",
            "price": 70.25, "quantity_filled": 0.0, "vwap": null, "status": "OPEN"
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.order_id, 42);
        assert_eq!(order.quantity, dec!(5000));
        assert_eq!(order.price, Some(dec!(70.25)));
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.action, OrderSide::Buy);
    }

    #[test]
    fn test_lease_emptiness() {
        let mut lease = Lease {
            id: 1,
            ticker: "CL-STORAGE".to_string(),
            containment_usage: None,
            next_lease_tick: Some(30),
            start_lease_tick: Some(0),
        };
        assert!(lease.is_empty());
        lease.containment_usage = Some(dec!(0));
        assert!(lease.is_empty());
        lease.containment_usage = Some(dec!(10));
        assert!(!lease.is_empty());
    }

    #[test]
    fn test_side_helpers() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.sign(), dec!(-1));
        assert_eq!(OrderSide::Sell.to_string(), "SELL");
    }
}
