//! Crack-spread refining arbitrage.
//!
//! When the products are worth more than the crude plus the refinery fee,
//! buy a crude batch hedged with short futures, lease the refinery and feed
//! it. The outputs and the hedge are closed out on a later cycle once the
//! refinery has been released.

use crate::config::RefiningConfig;
use crate::error::Result;
use crate::exchange::{OrderSide, TradingGateway};
use crate::strategy::execution::execute_legs;
use crate::strategy::trade::Leg;
use crate::strategy::CycleOutcome;
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Heating-oil contracts produced per batch
const HEATING_OIL_OUTPUT: i64 = 10;
/// Gasoline contracts produced per batch
const GASOLINE_OUTPUT: i64 = 20;
/// Product contract size in gallons
const GALLONS_PER_CONTRACT: i64 = 42_000;
/// Crude contract size in barrels
const BARRELS_PER_CONTRACT: i64 = 1_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefiningMargin {
    pub revenue: Decimal,
    pub cost: Decimal,
    pub margin: Decimal,
    pub profitable: bool,
}

/// Profit of refining one batch at the given product bids and crude ask.
pub fn refining_margin(
    heating_oil: Decimal,
    gasoline: Decimal,
    crude: Decimal,
    config: &RefiningConfig,
) -> RefiningMargin {
    let gallons = Decimal::from(GALLONS_PER_CONTRACT);
    let revenue = Decimal::from(HEATING_OIL_OUTPUT) * heating_oil * gallons
        + Decimal::from(GASOLINE_OUTPUT) * gasoline * gallons;
    let cost = config.batch_size * crude * Decimal::from(BARRELS_PER_CONTRACT)
        + config.refining_fee;
    let margin = revenue - cost;

    RefiningMargin {
        revenue,
        cost,
        margin,
        profitable: margin >= config.min_profit,
    }
}

pub struct RefiningEngine {
    config: RefiningConfig,
}

impl RefiningEngine {
    pub fn new(config: RefiningConfig) -> Self {
        Self { config }
    }

    #[instrument(skip(self, gateway))]
    pub async fn run_cycle(&self, gateway: &dyn TradingGateway) -> Result<CycleOutcome> {
        if let Some(lease) = gateway.refinery_lease().await? {
            debug!(lease_id = lease.id, next_tick = ?lease.next_lease_tick, "Refinery busy");
            tokio::time::sleep(Duration::from_millis(self.config.busy_delay_ms)).await;
            return Ok(CycleOutcome::Skipped("refinery busy".to_string()));
        }

        let closed_out = self.close_out(gateway).await?;

        let heating_oil = gateway.get_quote(&self.config.heating_oil_ticker).await?.best_bid;
        let gasoline = gateway.get_quote(&self.config.gasoline_ticker).await?.best_bid;
        let crude = gateway.get_quote(&self.config.crude_ticker).await?.best_ask;
        let margin = refining_margin(heating_oil, gasoline, crude, &self.config);

        info!(
            %heating_oil,
            %gasoline,
            %crude,
            margin = %margin.margin,
            profitable = margin.profitable,
            "Refining margin"
        );

        if !margin.profitable {
            let reason = format!("margin {} below {}", margin.margin, self.config.min_profit);
            return Ok(if closed_out {
                CycleOutcome::Acted(format!("closed prior batch; {}", reason))
            } else {
                CycleOutcome::Skipped(reason)
            });
        }

        self.start_batch(gateway).await?;

        Ok(CycleOutcome::Acted(format!(
            "refining {} {} at margin {}",
            self.config.batch_size, self.config.crude_ticker, margin.margin
        )))
    }

    /// Sell the previous batch's products and buy back its futures hedge.
    /// Returns whether anything was closed.
    async fn close_out(&self, gateway: &dyn TradingGateway) -> Result<bool> {
        let positions = gateway.get_positions().await?;
        let held = |ticker: &str| positions.get(ticker).copied().unwrap_or(Decimal::ZERO);

        let heating_oil = held(&self.config.heating_oil_ticker);
        let gasoline = held(&self.config.gasoline_ticker);
        let hedge = held(&self.config.hedge_ticker);

        if heating_oil <= Decimal::ZERO || gasoline <= Decimal::ZERO || hedge >= Decimal::ZERO {
            return Ok(false);
        }

        info!(%heating_oil, %gasoline, %hedge, "Closing out refined products");
        let legs = [
            Leg::new(&self.config.heating_oil_ticker, OrderSide::Sell, heating_oil),
            Leg::new(&self.config.gasoline_ticker, OrderSide::Sell, gasoline),
            Leg::new(&self.config.hedge_ticker, OrderSide::Buy, self.config.batch_size),
        ];
        execute_legs(gateway, &legs).await?;
        Ok(true)
    }

    async fn start_batch(&self, gateway: &dyn TradingGateway) -> Result<()> {
        let batch = self.config.batch_size;

        for _ in 0..self.config.storage_slots {
            gateway.lease_storage(&self.config.storage_ticker).await?;
        }
        debug!(slots = self.config.storage_slots, "Crude storage leased");

        let net = gateway.get_net_position().await?;
        let spot = Leg::new(&self.config.crude_ticker, OrderSide::Buy, batch);
        let hedge = Leg::new(&self.config.hedge_ticker, OrderSide::Sell, batch);
        let hedge_first = net > self.config.net_risk_threshold;
        let legs = if hedge_first {
            [hedge, spot]
        } else {
            [spot, hedge]
        };
        execute_legs(gateway, &legs).await?;
        info!(%net, hedge_first, %batch, "Crude batch bought and hedged");

        let lease = gateway.lease_refinery().await?;
        tokio::time::sleep(Duration::from_millis(self.config.lease_confirm_ms)).await;
        gateway.use_refinery(&self.config.crude_ticker, batch).await?;
        info!(lease_id = lease.id, %batch, "Crude sent to refinery");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{MockExchange, REFINERY_TICKER};
    use rust_decimal_macros::dec;

    fn config() -> RefiningConfig {
        RefiningConfig {
            lease_confirm_ms: 0,
            busy_delay_ms: 0,
            ..Default::default()
        }
    }

    async fn market(exchange: &MockExchange, heating_oil: Decimal) {
        exchange.set_quote("HO", heating_oil, heating_oil + dec!(0.01)).await;
        exchange.set_quote("RB", dec!(2.00), dec!(2.01)).await;
        exchange.set_quote("CL", dec!(69.95), dec!(70.00)).await;
        exchange.set_quote("CL-2F", dec!(70.10), dec!(70.15)).await;
    }

    #[test]
    fn test_margin() {
        let m = refining_margin(dec!(2.50), dec!(2.00), dec!(70), &RefiningConfig::default());
        assert_eq!(m.revenue, dec!(2730000));
        assert_eq!(m.cost, dec!(2400000));
        assert_eq!(m.margin, dec!(330000));
        assert!(m.profitable);

        let thin = refining_margin(dec!(1.50), dec!(2.00), dec!(70), &RefiningConfig::default());
        assert!(!thin.profitable);
    }

    #[tokio::test]
    async fn test_profitable_batch_is_hedged_and_refined() {
        let exchange = MockExchange::new();
        market(&exchange, dec!(2.50)).await;
        let engine = RefiningEngine::new(config());

        let outcome = engine.run_cycle(&exchange).await.unwrap();
        assert!(outcome.acted());

        let orders = exchange.submitted_orders().await;
        assert_eq!(orders.len(), 2);
        assert_eq!((orders[0].ticker.as_str(), orders[0].action), ("CL", OrderSide::Buy));
        assert_eq!((orders[1].ticker.as_str(), orders[1].action), ("CL-2F", OrderSide::Sell));

        let leases: Vec<_> = exchange
            .lease_requests()
            .await
            .into_iter()
            .filter_map(|r| r.ticker)
            .collect();
        assert_eq!(leases.iter().filter(|t| *t == "CL-STORAGE").count(), 3);
        assert!(leases.iter().any(|t| t == REFINERY_TICKER));

        let refinery = exchange.refinery_lease().await.unwrap().unwrap();
        assert_eq!(refinery.containment_usage, Some(dec!(30)));
        assert_eq!(exchange.position("CL").await, dec!(0));
        assert_eq!(exchange.position("CL-2F").await, dec!(-30));
    }

    #[tokio::test]
    async fn test_hedge_first_when_net_is_high() {
        let exchange = MockExchange::new();
        market(&exchange, dec!(2.50)).await;
        exchange.set_net_position(Some(dec!(80))).await;
        let engine = RefiningEngine::new(config());

        engine.run_cycle(&exchange).await.unwrap();
        let orders = exchange.submitted_orders().await;
        assert_eq!(orders[0].ticker, "CL-2F");
        assert_eq!(orders[1].ticker, "CL");
    }

    #[tokio::test]
    async fn test_busy_refinery_defers() {
        let exchange = MockExchange::new();
        market(&exchange, dec!(2.50)).await;
        exchange.lease_refinery().await.unwrap();
        let engine = RefiningEngine::new(config());

        let outcome = engine.run_cycle(&exchange).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Skipped("refinery busy".to_string()));
        assert!(exchange.submitted_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_unprofitable_takes_no_action() {
        let exchange = MockExchange::new();
        market(&exchange, dec!(1.50)).await;
        let engine = RefiningEngine::new(config());

        let outcome = engine.run_cycle(&exchange).await.unwrap();
        assert!(!outcome.acted());
        assert!(exchange.submitted_orders().await.is_empty());
        assert!(exchange.lease_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_prior_batch_is_closed_out() {
        let exchange = MockExchange::new();
        market(&exchange, dec!(1.50)).await;
        exchange.set_position("HO", dec!(10)).await;
        exchange.set_position("RB", dec!(20)).await;
        exchange.set_position("CL-2F", dec!(-30)).await;
        let engine = RefiningEngine::new(config());

        let outcome = engine.run_cycle(&exchange).await.unwrap();
        assert!(outcome.acted());
        assert_eq!(exchange.position("HO").await, dec!(0));
        assert_eq!(exchange.position("RB").await, dec!(0));
        assert_eq!(exchange.position("CL-2F").await, dec!(0));
    }
}
