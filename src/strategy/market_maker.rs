//! Two-sided quoting around the touch with inventory skew and an open-order cap.

use crate::config::MarketMakingConfig;
use crate::error::Result;
use crate::exchange::{OrderSide, OrderStatus, TradingGateway};
use crate::strategy::CycleOutcome;
use crate::utils::decimal::round_to_tick;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of a full quoting session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub cycles: u64,
    pub errors: u64,
    pub final_tick: i64,
    pub final_nlv: Option<Decimal>,
    /// True when the session ran until the configured end tick.
    pub completed: bool,
}

pub struct MarketMaker {
    config: MarketMakingConfig,
}

impl MarketMaker {
    pub fn new(config: MarketMakingConfig) -> Self {
        Self { config }
    }

    /// (buy size, sell size) for the current inventory.
    ///
    /// Only the side that would add to an oversized position shrinks.
    pub fn quote_sizes(&self, position: Decimal) -> (Decimal, Decimal) {
        let full = self.config.order_size;
        let reduced = self.config.rebalance_size;
        let limit = self.config.rebalance_limit;

        if position > limit {
            (reduced, full)
        } else if position < -limit {
            (full, reduced)
        } else {
            (full, full)
        }
    }

    /// Quote both sides once, then trim resting orders back to the cap.
    #[instrument(skip(self, gateway), fields(ticker = %self.config.ticker))]
    pub async fn run_cycle(&self, gateway: &dyn TradingGateway) -> Result<CycleOutcome> {
        let ticker = &self.config.ticker;
        let quote = gateway.get_quote(ticker).await?;
        let position = gateway.get_position(ticker).await?;
        let (buy_size, sell_size) = self.quote_sizes(position);

        let increment = self.config.price_increment;
        let bid_price = round_to_tick(quote.best_bid - increment, increment);
        let ask_price = round_to_tick(quote.best_ask + increment, increment);

        gateway
            .limit_order(ticker, OrderSide::Buy, buy_size, bid_price)
            .await?;
        gateway
            .limit_order(ticker, OrderSide::Sell, sell_size, ask_price)
            .await?;

        debug!(
            %position,
            %buy_size,
            %bid_price,
            %sell_size,
            %ask_price,
            "Quotes submitted"
        );

        let cancelled = self.enforce_order_cap(gateway).await?;

        Ok(CycleOutcome::Acted(format!(
            "quoted {}@{} / {}@{}, cancelled {}",
            buy_size, bid_price, sell_size, ask_price, cancelled
        )))
    }

    /// Cancel the last-listed open order until at most `max_open_orders` rest.
    async fn enforce_order_cap(&self, gateway: &dyn TradingGateway) -> Result<usize> {
        let mut cancelled = 0;

        loop {
            let open = gateway.get_orders(OrderStatus::Open).await?;
            let Some(victim) = open.last() else {
                break;
            };
            if open.len() <= self.config.max_open_orders {
                break;
            }

            debug!(order_id = victim.order_id, open = open.len(), "Cancelling excess order");
            gateway.cancel_order(victim.order_id).await?;
            cancelled += 1;
            tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
        }

        Ok(cancelled)
    }

    /// Quote every tick in `[start_tick, end_tick)` until the session ends or
    /// `shutdown` is raised. A failed first tick fetch aborts the session.
    pub async fn run(
        &self,
        gateway: &dyn TradingGateway,
        shutdown: &AtomicBool,
    ) -> Result<SessionSummary> {
        let sleep = Duration::from_millis(self.config.sleep_ms);
        let retry_delay = Duration::from_millis(self.config.retry_delay_ms);

        let mut tick = gateway.get_tick().await?;
        info!(
            ticker = %self.config.ticker,
            tick,
            start = self.config.start_tick,
            end = self.config.end_tick,
            "Market making session started"
        );

        let mut cycles = 0u64;
        let mut errors = 0u64;
        let mut last_progress_tick = None;

        while tick < self.config.end_tick {
            if shutdown.load(Ordering::SeqCst) {
                warn!(tick, "Shutdown requested, stopping quotes");
                break;
            }

            if tick >= self.config.start_tick {
                match self.run_cycle(gateway).await {
                    Ok(_) => cycles += 1,
                    Err(e) => {
                        errors += 1;
                        error!(tick, error = %e, "Market making cycle failed");
                        tokio::time::sleep(retry_delay).await;
                    }
                }

                if self.config.progress_every_ticks > 0
                    && tick % self.config.progress_every_ticks == 0
                    && last_progress_tick != Some(tick)
                {
                    last_progress_tick = Some(tick);
                    self.log_progress(gateway, tick).await;
                }
            }

            tokio::time::sleep(sleep).await;

            match gateway.get_tick().await {
                Ok(t) => tick = t,
                Err(e) => {
                    warn!(error = %e, "Tick refresh failed");
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }

        let final_nlv = gateway.get_nlv().await.ok();
        let completed = tick >= self.config.end_tick;

        info!(
            tick,
            cycles,
            errors,
            final_nlv = ?final_nlv,
            completed,
            "Market making session finished"
        );

        Ok(SessionSummary {
            cycles,
            errors,
            final_tick: tick,
            final_nlv,
            completed,
        })
    }

    async fn log_progress(&self, gateway: &dyn TradingGateway, tick: i64) {
        let position = gateway.get_position(&self.config.ticker).await;
        let nlv = gateway.get_nlv().await;
        match (position, nlv) {
            (Ok(position), Ok(nlv)) => info!(tick, %position, %nlv, "Progress"),
            (position, nlv) => debug!(
                tick,
                position_ok = position.is_ok(),
                nlv_ok = nlv.is_ok(),
                "Progress snapshot unavailable"
            ),
        }
    }
}
