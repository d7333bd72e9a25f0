//! Control loop driving the arbitrage engines.
//!
//! One cycle:
//! 1. read the tick and reclaim abandoned (empty) leases
//! 2. refining
//! 3. fundamental (news), which may update pipeline costs
//! 4. transport, reading those costs
//! 5. storage spread monitor
//!
//! Engine errors are logged and the cycle moves on to the next engine.

use crate::config::{Config, RuntimeConfig};
use crate::error::Result;
use crate::exchange::TradingGateway;
use crate::strategy::{
    CycleOutcome, FundamentalEngine, PipelineCosts, RefiningEngine, StorageEngine,
    TransportEngine, WaitPolicy,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    pub cycles: u64,
    pub actions: u64,
    pub errors: u64,
    pub last_tick: Option<i64>,
}

pub struct Orchestrator {
    runtime: RuntimeConfig,
    refining: RefiningEngine,
    fundamental: FundamentalEngine,
    transport: TransportEngine,
    storage: StorageEngine,
    pipeline_costs: PipelineCosts,
    stats: CycleStats,
}

impl Orchestrator {
    pub fn new(config: &Config) -> Self {
        let routes = &config.transport.routes;
        let pipelines = routes.iter().map(|r| r.pipeline.clone()).collect();
        let wait = WaitPolicy {
            poll_interval: config.runtime.poll_interval(),
            max_wait: config.runtime.max_wait(),
        };

        Self {
            runtime: config.runtime.clone(),
            refining: RefiningEngine::new(config.refining.clone()),
            fundamental: FundamentalEngine::new(config.fundamental.clone(), pipelines),
            transport: TransportEngine::new(config.transport.clone(), wait),
            storage: StorageEngine::new(config.storage.clone()),
            pipeline_costs: PipelineCosts::from_routes(routes),
            stats: CycleStats::default(),
        }
    }

    pub fn pipeline_costs(&self) -> &PipelineCosts {
        &self.pipeline_costs
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn fundamental(&self) -> &FundamentalEngine {
        &self.fundamental
    }

    pub fn transport(&self) -> &TransportEngine {
        &self.transport
    }

    /// Run every engine once. Only a failed tick fetch fails the cycle.
    pub async fn run_cycle(&mut self, gateway: &dyn TradingGateway) -> Result<i64> {
        let tick = gateway.get_tick().await?;
        self.stats.cycles += 1;
        self.stats.last_tick = Some(tick);

        match gateway.close_empty_leases().await {
            Ok(closed) if !closed.is_empty() => debug!(tick, ?closed, "Reclaimed empty leases"),
            Ok(_) => {}
            Err(e) => warn!(tick, error = %e, "Lease reclamation failed"),
        }
        match gateway.get_net_position().await {
            Ok(net) => info!(tick, %net, "Cycle start"),
            Err(e) => warn!(tick, error = %e, "Net position unavailable"),
        }

        let result = self.refining.run_cycle(gateway).await;
        self.record("refining", tick, result).await;

        let result = self
            .fundamental
            .run_cycle(gateway, tick, &mut self.pipeline_costs)
            .await;
        self.record("fundamental", tick, result).await;

        let result = self
            .transport
            .run_cycle(gateway, tick, &self.pipeline_costs)
            .await;
        self.record("transport", tick, result).await;

        let result = self.storage.run_cycle(gateway, tick).await;
        self.record("storage", tick, result).await;

        Ok(tick)
    }

    /// Loop until `shutdown` is raised. The first tick fetch must succeed.
    pub async fn run(
        &mut self,
        gateway: &dyn TradingGateway,
        shutdown: &AtomicBool,
    ) -> Result<CycleStats> {
        let tick = gateway.get_tick().await?;
        info!(tick, "Connected to simulator");

        while !shutdown.load(Ordering::SeqCst) {
            if let Err(e) = self.run_cycle(gateway).await {
                self.stats.errors += 1;
                error!(error = %e, "Cycle failed");
                tokio::time::sleep(self.runtime.retry_delay()).await;
            }
            tokio::time::sleep(self.runtime.cycle_interval()).await;
        }

        info!(
            cycles = self.stats.cycles,
            actions = self.stats.actions,
            errors = self.stats.errors,
            last_tick = ?self.stats.last_tick,
            "Control loop stopped"
        );
        Ok(self.stats.clone())
    }

    async fn record(&mut self, engine: &str, tick: i64, result: Result<CycleOutcome>) {
        match result {
            Ok(CycleOutcome::Acted(detail)) => {
                self.stats.actions += 1;
                info!(engine, tick, %detail, "Engine acted");
            }
            Ok(CycleOutcome::Skipped(reason)) => {
                debug!(engine, tick, %reason, "Engine skipped");
            }
            Err(e) => {
                self.stats.errors += 1;
                error!(engine, tick, kind = e.kind(), error = %e, "Engine failed");
                tokio::time::sleep(self.runtime.retry_delay()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockExchange;
    use rust_decimal_macros::dec;

    fn config() -> Config {
        let mut config = Config::default();
        config.runtime.retry_delay_ms = 0;
        config.runtime.cycle_interval_ms = 1;
        config.runtime.poll_interval_ms = 1;
        config.runtime.max_wait_ms = 10;
        config.refining.lease_confirm_ms = 0;
        config.refining.busy_delay_ms = 0;
        config.transport.settle_delay_ms = 0;
        config
    }

    /// Quotes for every ticker with no arbitrage available.
    async fn quiet_market(exchange: &MockExchange) {
        exchange.register_pipeline("AK-CS-PIPE", "CL").await;
        exchange.register_pipeline("CS-NYC-PIPE", "CL-NYC").await;
        exchange.set_quote("CL", dec!(70.00), dec!(70.05)).await;
        exchange.set_quote("CL-AK", dec!(69.90), dec!(70.00)).await;
        exchange.set_quote("CL-NYC", dec!(70.50), dec!(70.60)).await;
        exchange.set_quote("CL-2F", dec!(71.00), dec!(71.05)).await;
        exchange.set_quote("HO", dec!(1.50), dec!(1.51)).await;
        exchange.set_quote("RB", dec!(2.00), dec!(2.01)).await;
    }

    #[tokio::test]
    async fn test_quiet_cycle_takes_no_action() {
        let exchange = MockExchange::new();
        quiet_market(&exchange).await;
        exchange.set_tick(12).await;
        let mut orchestrator = Orchestrator::new(&config());

        let tick = orchestrator.run_cycle(&exchange).await.unwrap();
        assert_eq!(tick, 12);
        assert_eq!(orchestrator.stats().actions, 0);
        assert_eq!(orchestrator.stats().errors, 0);
        assert!(exchange.submitted_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_news_feeds_transport_in_same_cycle() {
        let exchange = MockExchange::new();
        quiet_market(&exchange).await;
        // (70.00 - 64.90) * 10,000 = 51,000: only profitable once the lease is cheap.
        exchange.set_quote("CL-AK", dec!(64.90), dec!(65.00)).await;
        exchange
            .push_news("AK-CS-PIPE", "AK-CS pipeline lease drops to $1,000")
            .await;
        let mut orchestrator = Orchestrator::new(&config());

        orchestrator.run_cycle(&exchange).await.unwrap();

        assert_eq!(
            orchestrator.pipeline_costs().get("AK-CS-PIPE"),
            Some(dec!(1000))
        );
        let trade = orchestrator.transport().active_trade("AK-CS").unwrap();
        assert_eq!(trade.quantity, dec!(100));
    }

    #[tokio::test]
    async fn test_engine_error_does_not_stop_cycle() {
        let exchange = MockExchange::new();
        quiet_market(&exchange).await;
        exchange.clear_book("HO").await;
        let news_id = exchange
            .push_news("CL", "ACTUAL DRAW 14 MLN BBLS VS FORECAST DRAW 5 MLN BBLS")
            .await;
        let mut orchestrator = Orchestrator::new(&config());

        orchestrator.run_cycle(&exchange).await.unwrap();

        assert_eq!(orchestrator.stats().errors, 1);
        assert_eq!(
            orchestrator.fundamental().last_processed_news_id(),
            Some(news_id)
        );
        assert_eq!(exchange.position("CL-2F").await, dec!(33));
    }

    #[tokio::test]
    async fn test_empty_leases_reclaimed_each_cycle() {
        let exchange = MockExchange::new();
        quiet_market(&exchange).await;
        exchange.lease_storage("NYC-STORAGE").await.unwrap();
        let mut orchestrator = Orchestrator::new(&config());

        orchestrator.run_cycle(&exchange).await.unwrap();
        assert!(exchange.held_leases().await.is_empty());
    }

    #[tokio::test]
    async fn test_reclaimed_destination_storage_is_leased_again() {
        let exchange = MockExchange::new();
        quiet_market(&exchange).await;
        exchange.set_quote("CL-AK", dec!(64.00), dec!(64.10)).await;
        exchange.set_transport_delivery(false).await;
        let mut orchestrator = Orchestrator::new(&config());

        orchestrator.run_cycle(&exchange).await.unwrap();
        assert!(orchestrator.transport().active_trade("AK-CS").is_some());

        let storage_held = |leases: Vec<crate::exchange::Lease>| {
            leases.iter().filter(|l| l.ticker == "CL-STORAGE").count()
        };
        let storage_requested = |requests: Vec<crate::exchange::LeaseRequest>| {
            requests
                .iter()
                .filter(|r| r.ticker.as_deref() == Some("CL-STORAGE"))
                .count()
        };

        // Crude still in the pipeline: storage is leased, the trade stays open.
        exchange.set_tick(27).await;
        orchestrator.run_cycle(&exchange).await.unwrap();
        assert!(orchestrator.transport().active_trade("AK-CS").is_some());
        assert_eq!(storage_held(exchange.held_leases().await), 10);
        assert_eq!(storage_requested(exchange.lease_requests().await), 10);

        // The empty slots are reclaimed at cycle start and only the shortfall is re-leased.
        exchange.set_tick(28).await;
        orchestrator.run_cycle(&exchange).await.unwrap();
        assert_eq!(storage_held(exchange.held_leases().await), 10);
        assert_eq!(storage_requested(exchange.lease_requests().await), 20);

        exchange.set_position("CL", dec!(100)).await;
        exchange.set_tick(29).await;
        orchestrator.run_cycle(&exchange).await.unwrap();
        assert!(orchestrator.transport().active_trade("AK-CS").is_none());
        assert_eq!(exchange.position("CL").await, dec!(0));
        assert_eq!(exchange.position("CL-2F").await, dec!(0));
        assert_eq!(orchestrator.stats().errors, 0);
    }

    #[tokio::test]
    async fn test_run_requires_first_tick() {
        let exchange = MockExchange::new();
        exchange.set_offline(true).await;
        let mut orchestrator = Orchestrator::new(&config());
        let shutdown = AtomicBool::new(false);

        assert!(orchestrator.run(&exchange, &shutdown).await.is_err());
    }

    #[tokio::test]
    async fn test_run_honours_shutdown() {
        let exchange = MockExchange::new();
        quiet_market(&exchange).await;
        let mut orchestrator = Orchestrator::new(&config());
        let shutdown = AtomicBool::new(true);

        let stats = orchestrator.run(&exchange, &shutdown).await.unwrap();
        assert_eq!(stats.cycles, 0);
    }
}
