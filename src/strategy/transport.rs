//! Pipeline transport arbitrage.
//!
//! Each route buys spot at its origin, hedges with short futures and ships
//! the crude through a leased pipeline. Once the shipment window is nearly
//! over the delivered crude is sold at the destination and the hedge bought
//! back. Routes are independent; each holds at most one trade.

use crate::config::{PriceSide, RouteConfig, TransportConfig};
use crate::error::Result;
use crate::exchange::{OrderSide, TradingGateway};
use crate::strategy::execution::{execute_legs, unwind, wait_for_position, WaitOutcome, WaitPolicy};
use crate::strategy::pipeline::PipelineCosts;
use crate::strategy::trade::{ActiveTrade, Leg, TradeSlot};
use crate::strategy::CycleOutcome;
use crate::utils::decimal::chunks;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Profit of shipping one notional unit after the pipeline lease.
pub fn expected_profit(
    destination_bid: Decimal,
    origin_price: Decimal,
    multiplier: Decimal,
    lease_cost: Decimal,
) -> Decimal {
    (destination_bid - origin_price) * multiplier - lease_cost
}

pub struct TransportEngine {
    config: TransportConfig,
    wait: WaitPolicy,
    /// One slot per configured route, same order as `config.routes`.
    slots: Vec<TradeSlot>,
    /// Destination storage lease ids taken by each route's pending close.
    storage_leases: Vec<Vec<i64>>,
}

impl TransportEngine {
    pub fn new(config: TransportConfig, wait: WaitPolicy) -> Self {
        let slots = config.routes.iter().map(|_| TradeSlot::default()).collect();
        let storage_leases = config.routes.iter().map(|_| Vec::new()).collect();
        Self {
            config,
            wait,
            slots,
            storage_leases,
        }
    }

    pub fn active_trade(&self, route: &str) -> Option<&ActiveTrade> {
        self.config
            .routes
            .iter()
            .position(|r| r.name == route)
            .and_then(|i| self.slots[i].get())
    }

    /// Close routes whose window is ending, then look for new shipments on
    /// idle routes. A failing route is logged and does not stop the others.
    pub async fn run_cycle(
        &mut self,
        gateway: &dyn TradingGateway,
        tick: i64,
        costs: &PipelineCosts,
    ) -> Result<CycleOutcome> {
        let mut outcomes = Vec::new();
        let mut first_error = None;

        for index in 0..self.config.routes.len() {
            if !self.slots[index].is_active() {
                continue;
            }
            match self.close_route(gateway, index, tick).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(route = %self.config.routes[index].name, error = %e, "Route close failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        for index in 0..self.config.routes.len() {
            if self.slots[index].is_active() {
                continue;
            }
            match self.open_route(gateway, index, tick, costs).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(route = %self.config.routes[index].name, error = %e, "Route open failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        let acted: Vec<String> = outcomes
            .iter()
            .filter_map(|o| match o {
                CycleOutcome::Acted(s) => Some(s.clone()),
                CycleOutcome::Skipped(_) => None,
            })
            .collect();

        if !acted.is_empty() {
            return Ok(CycleOutcome::Acted(acted.join("; ")));
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        let skipped: Vec<String> = outcomes.iter().map(|o| o.to_string()).collect();
        Ok(CycleOutcome::Skipped(skipped.join("; ")))
    }

    async fn close_route(
        &mut self,
        gateway: &dyn TradingGateway,
        index: usize,
        tick: i64,
    ) -> Result<CycleOutcome> {
        let route = &self.config.routes[index];
        let Some(trade) = self.slots[index].get() else {
            return Ok(CycleOutcome::Skipped(format!("{} idle", route.name)));
        };

        let elapsed = Decimal::from(trade.elapsed_ticks(tick));
        if elapsed < self.config.close_after_ticks {
            return Ok(CycleOutcome::Skipped(format!(
                "{} in transit ({} ticks)",
                route.name, elapsed
            )));
        }
        let quantity = trade.quantity;

        info!(route = %route.name, %elapsed, %quantity, "Closing transport trade");

        let remaining_window = self.config.window_ticks - elapsed;
        if remaining_window <= self.config.distress_margin {
            warn!(
                route = %route.name,
                %remaining_window,
                "Window nearly over, not leasing destination storage"
            );
        } else {
            let required = chunks(quantity, self.config.open_batch).len();
            Self::lease_destination_storage(
                gateway,
                route,
                required,
                &mut self.storage_leases[index],
            )
            .await?;
        }

        tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;

        match wait_for_position(gateway, &route.destination_ticker, quantity, self.wait).await? {
            WaitOutcome::Reached(_) => {}
            WaitOutcome::TimedOut { last_seen } => {
                return Ok(CycleOutcome::Skipped(format!(
                    "{} awaiting delivery ({} of {})",
                    route.name, last_seen, quantity
                )));
            }
        }

        let net = gateway.get_net_position().await?;
        let spot_first = net > self.config.net_risk_threshold;
        let mut unwound = Decimal::ZERO;

        for batch in chunks(quantity, self.config.close_batch) {
            let spot = Leg::new(&route.destination_ticker, OrderSide::Sell, batch);
            let hedge = Leg::new(&self.config.hedge_ticker, OrderSide::Buy, batch);
            let legs = if spot_first { [spot, hedge] } else { [hedge, spot] };

            if let Err(e) = execute_legs(gateway, &legs).await {
                if let Some(trade) = self.slots[index].get_mut() {
                    trade.quantity -= unwound;
                }
                error!(
                    route = %self.config.routes[index].name,
                    %unwound,
                    remaining = %(quantity - unwound),
                    error = %e,
                    "Transport unwind interrupted"
                );
                return Err(e);
            }
            unwound += batch;
        }

        let name = route.name.clone();
        self.slots[index].clear();
        self.storage_leases[index].clear();
        info!(route = %name, %quantity, %net, spot_first, "Transport trade closed");

        Ok(CycleOutcome::Acted(format!("{} closed {}", name, quantity)))
    }

    /// Hold `required` destination storage leases for this route. Leases it
    /// took on an earlier attempt are reused if still live; slots leased by
    /// other engines on the same ticker are not counted.
    async fn lease_destination_storage(
        gateway: &dyn TradingGateway,
        route: &RouteConfig,
        required: usize,
        held: &mut Vec<i64>,
    ) -> Result<()> {
        let live: HashSet<i64> = gateway.get_leases().await?.iter().map(|l| l.id).collect();
        held.retain(|id| live.contains(id));
        let reused = held.len();

        for _ in reused..required {
            let lease = gateway.lease_storage(&route.destination_storage).await?;
            held.push(lease.id);
        }
        debug!(
            storage = %route.destination_storage,
            reused,
            required,
            "Destination storage ready"
        );
        Ok(())
    }

    async fn open_route(
        &mut self,
        gateway: &dyn TradingGateway,
        index: usize,
        tick: i64,
        costs: &PipelineCosts,
    ) -> Result<CycleOutcome> {
        let route = &self.config.routes[index];
        let Some(lease_cost) = costs.get(&route.pipeline) else {
            return Ok(CycleOutcome::Skipped(format!(
                "no lease cost for {}",
                route.pipeline
            )));
        };

        let destination_bid = gateway.get_quote(&route.destination_ticker).await?.best_bid;
        let origin_quote = gateway.get_quote(&route.origin_ticker).await?;
        let origin_price = match route.origin_price {
            PriceSide::Bid => origin_quote.best_bid,
            PriceSide::Ask => origin_quote.best_ask,
        };
        let profit = expected_profit(
            destination_bid,
            origin_price,
            self.config.notional_multiplier,
            lease_cost,
        );

        debug!(
            route = %route.name,
            %destination_bid,
            %origin_price,
            %lease_cost,
            %profit,
            "Transport opportunity"
        );

        if profit <= self.config.min_profit {
            return Ok(CycleOutcome::Skipped(format!(
                "{} expected profit {} too low",
                route.name, profit
            )));
        }

        info!(route = %route.name, %profit, "Opening transport trade");
        gateway.lease_storage(&route.origin_storage).await?;

        let net = gateway.get_net_position().await?;
        let spot_first = net < self.config.net_risk_threshold;
        let batch_delay = Duration::from_millis(self.config.batch_delay_ms);
        let target = self.config.trade_quantity;
        let mut shipped = Decimal::ZERO;
        let mut batches = 0u32;
        let mut failure = None;

        for batch in chunks(target, self.config.open_batch) {
            let spot = Leg::new(&route.origin_ticker, OrderSide::Buy, batch);
            let hedge = Leg::new(&self.config.hedge_ticker, OrderSide::Sell, batch);
            let legs = if spot_first { [spot, hedge] } else { [hedge, spot] };

            if let Err(e) = execute_legs(gateway, &legs).await {
                failure = Some(e);
                break;
            }
            if let Err(e) = gateway
                .lease_use_transport(&route.pipeline, &route.origin_ticker, batch)
                .await
            {
                unwind(gateway, &legs).await;
                failure = Some(e);
                break;
            }

            shipped += batch;
            batches += 1;
            tokio::time::sleep(batch_delay).await;
        }

        if let Some(e) = &failure {
            error!(route = %route.name, %shipped, %target, error = %e, "Transport open interrupted");
        }
        if shipped.is_zero() {
            return match failure {
                Some(e) => Err(e),
                None => Ok(CycleOutcome::Skipped(format!("{} shipped nothing", route.name))),
            };
        }

        let trade = ActiveTrade::new(
            &route.name,
            &route.destination_ticker,
            OrderSide::Buy,
            shipped,
            batches,
            tick,
        );
        let name = route.name.clone();
        info!(route = %name, %shipped, batches, %net, spot_first, tick, "Transport trade opened");
        if self.slots[index].try_open(trade).is_err() {
            warn!(route = %name, "Transport slot occupied while opening");
        }

        Ok(CycleOutcome::Acted(format!("{} shipped {}", name, shipped)))
    }
}
