//! Stateful trades opened by the engines.
//!
//! An `ActiveTrade` remembers what was opened so the close can offset it
//! exactly: same ticker and quantity, opposite side, same leg split.

use crate::exchange::OrderSide;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// One order of a multi-leg submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leg {
    pub ticker: String,
    pub side: OrderSide,
    pub quantity: Decimal,
}

impl Leg {
    pub fn new(ticker: &str, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            ticker: ticker.to_string(),
            side,
            quantity,
        }
    }

    /// The order that undoes this one.
    pub fn reversed(&self) -> Self {
        Self {
            ticker: self.ticker.clone(),
            side: self.side.opposite(),
            quantity: self.quantity,
        }
    }
}

/// A live position tracked by an engine.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveTrade {
    /// Route or signal the trade belongs to (e.g. "EIA", "AK-CS")
    pub route: String,
    pub ticker: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    /// Number of equal legs used to open (and close) the trade
    pub legs: u32,
    pub entry_tick: i64,
    pub opened_at: DateTime<Utc>,
}

impl ActiveTrade {
    pub fn new(
        route: &str,
        ticker: &str,
        side: OrderSide,
        quantity: Decimal,
        legs: u32,
        entry_tick: i64,
    ) -> Self {
        Self {
            route: route.to_string(),
            ticker: ticker.to_string(),
            side,
            quantity,
            legs: legs.max(1),
            entry_tick,
            opened_at: Utc::now(),
        }
    }

    pub fn elapsed_ticks(&self, current_tick: i64) -> i64 {
        current_tick - self.entry_tick
    }

    pub fn hold_elapsed(&self, current_tick: i64, hold_ticks: i64) -> bool {
        self.elapsed_ticks(current_tick) >= hold_ticks
    }

    pub fn opening_legs(&self) -> Vec<Leg> {
        split_equal(self.quantity, self.legs)
            .into_iter()
            .map(|q| Leg::new(&self.ticker, self.side, q))
            .collect()
    }

    pub fn closing_legs(&self) -> Vec<Leg> {
        self.opening_legs().iter().map(Leg::reversed).collect()
    }
}

/// Split `quantity` into `legs` parts whose sum is exactly `quantity`.
/// Parts are equal when `quantity` divides evenly; otherwise the last part
/// absorbs the remainder.
pub fn split_equal(quantity: Decimal, legs: u32) -> Vec<Decimal> {
    let legs = legs.max(1);
    let each = (quantity / Decimal::from(legs)).floor();
    let mut parts = vec![each; legs as usize];
    let allotted = each * Decimal::from(legs - 1);
    if let Some(last) = parts.last_mut() {
        *last = quantity - allotted;
    }
    parts
}

/// Holds at most one active trade.
#[derive(Debug, Default)]
pub struct TradeSlot {
    trade: Option<ActiveTrade>,
}

impl TradeSlot {
    pub fn is_active(&self) -> bool {
        self.trade.is_some()
    }

    pub fn get(&self) -> Option<&ActiveTrade> {
        self.trade.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut ActiveTrade> {
        self.trade.as_mut()
    }

    /// Store a newly opened trade. Gives the trade back if one is already live.
    pub fn try_open(&mut self, trade: ActiveTrade) -> Result<(), ActiveTrade> {
        if self.trade.is_some() {
            return Err(trade);
        }
        self.trade = Some(trade);
        Ok(())
    }

    pub fn clear(&mut self) -> Option<ActiveTrade> {
        self.trade.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_split_equal_conserves_quantity() {
        assert_eq!(split_equal(dec!(33), 3), vec![dec!(11); 3]);
        assert_eq!(split_equal(dec!(10), 3), vec![dec!(3), dec!(3), dec!(4)]);
        assert_eq!(split_equal(dec!(50), 1), vec![dec!(50)]);
        for q in 0..120 {
            let q = Decimal::from(q);
            let total: Decimal = split_equal(q, 3).into_iter().sum();
            assert_eq!(total, q);
        }
    }

    #[test]
    fn test_closing_legs_offset_opening_legs() {
        for (side, quantity) in [(OrderSide::Buy, dec!(33)), (OrderSide::Sell, dec!(90))] {
            let trade = ActiveTrade::new("EIA", "CL-2F", side, quantity, 3, 10);
            let open = trade.opening_legs();
            let close = trade.closing_legs();
            assert_eq!(open.len(), 3);
            assert_eq!(close.len(), 3);
            assert!(close.iter().all(|l| l.side == side.opposite()));
            let closed: Decimal = close.iter().map(|l| l.quantity).sum();
            assert_eq!(closed, quantity);
            let net: Decimal = open
                .iter()
                .chain(close.iter())
                .map(|l| l.side.sign() * l.quantity)
                .sum();
            assert_eq!(net, Decimal::ZERO);
        }
    }

    #[test]
    fn test_hold_window() {
        let trade = ActiveTrade::new("EIA", "CL-2F", OrderSide::Buy, dec!(30), 3, 100);
        assert!(!trade.hold_elapsed(119, 20));
        assert!(trade.hold_elapsed(120, 20));
    }

    #[test]
    fn test_slot_allows_one_trade() {
        let mut slot = TradeSlot::default();
        let trade = ActiveTrade::new("AK-CS", "CL-AK", OrderSide::Buy, dec!(100), 1, 0);
        assert!(slot.try_open(trade.clone()).is_ok());
        assert!(slot.try_open(trade).is_err());
        assert!(slot.clear().is_some());
        assert!(!slot.is_active());
    }
}
