//! Configuration management for the simulator strategies.
//!
//! Loads settings from defaults, an optional `config` file and `RIT__`
//! prefixed environment variables.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Simulator endpoint and credentials
    #[serde(default)]
    pub api: ApiConfig,
    /// Control loop cadence
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Market-making engine parameters
    #[serde(default)]
    pub market_making: MarketMakingConfig,
    /// News-driven engine parameters
    #[serde(default)]
    pub fundamental: FundamentalConfig,
    /// Refining arbitrage parameters
    #[serde(default)]
    pub refining: RefiningConfig,
    /// Transport arbitrage parameters
    #[serde(default)]
    pub transport: TransportConfig,
    /// Storage spread monitor parameters
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the RIT client API (e.g. http://localhost:9999/v1)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Static API key sent as `X-API-Key`
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Sleep between orchestrator cycles
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,
    /// Sleep after a failed cycle before continuing
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Poll interval of bounded position waits
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound on any position wait
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketMakingConfig {
    #[serde(default = "default_mm_ticker")]
    pub ticker: String,
    /// First tick (inclusive) at which quoting runs
    #[serde(default)]
    pub start_tick: i64,
    /// Quoting stops once the tick reaches this value
    #[serde(default = "default_mm_end_tick")]
    pub end_tick: i64,
    /// Default size of each quote
    #[serde(default = "default_mm_order_size")]
    pub order_size: Decimal,
    /// Size of the quote on the over-exposed side
    #[serde(default = "default_mm_rebalance_size")]
    pub rebalance_size: Decimal,
    /// Absolute inventory above which quotes are skewed
    #[serde(default = "default_mm_rebalance_limit")]
    pub rebalance_limit: Decimal,
    /// Maximum resting orders after each cycle
    #[serde(default = "default_mm_max_open_orders")]
    pub max_open_orders: usize,
    /// Price improvement away from the touch
    #[serde(default = "default_mm_price_increment")]
    pub price_increment: Decimal,
    #[serde(default = "default_mm_sleep_ms")]
    pub sleep_ms: u64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Log progress every N ticks
    #[serde(default = "default_mm_progress_every")]
    pub progress_every_ticks: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundamentalConfig {
    /// Futures contract traded on news
    #[serde(default = "default_futures_ticker")]
    pub ticker: String,
    #[serde(default = "default_position_limit")]
    pub position_limit: Decimal,
    /// Scheduled-report trades may use position_limit / this divisor
    #[serde(default = "default_report_limit_divisor")]
    pub report_limit_divisor: Decimal,
    /// Ticks to hold a news trade before closing it
    #[serde(default = "default_hold_ticks")]
    pub hold_ticks: i64,
    /// Maximum size of a scheduled-report trade
    #[serde(default = "default_report_quantity")]
    pub report_quantity: Decimal,
    /// Number of equal legs a scheduled-report trade is split into
    #[serde(default = "default_report_legs")]
    pub report_legs: u32,
    /// Dollars of price move per million barrels of surprise
    #[serde(default = "default_price_impact")]
    pub price_impact: Decimal,
    /// Minimum absolute expected move to trade
    #[serde(default = "default_move_threshold")]
    pub move_threshold: Decimal,
    /// Headline keywords treated as supply disruptions
    #[serde(default = "default_disruption_keywords")]
    pub disruption_keywords: Vec<String>,
    /// Optional cap on a disruption trade (None = full headroom)
    #[serde(default)]
    pub disruption_max_quantity: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefiningConfig {
    #[serde(default = "default_crude_ticker")]
    pub crude_ticker: String,
    #[serde(default = "default_futures_ticker")]
    pub hedge_ticker: String,
    #[serde(default = "default_heating_oil_ticker")]
    pub heating_oil_ticker: String,
    #[serde(default = "default_gasoline_ticker")]
    pub gasoline_ticker: String,
    #[serde(default = "default_crude_storage_ticker")]
    pub storage_ticker: String,
    /// Crude contracts per refinery batch
    #[serde(default = "default_batch_size")]
    pub batch_size: Decimal,
    /// Storage slots leased before buying the batch
    #[serde(default = "default_storage_slots")]
    pub storage_slots: u32,
    /// Fixed refinery lease cost per batch
    #[serde(default = "default_refining_fee")]
    pub refining_fee: Decimal,
    #[serde(default = "default_refining_min_profit")]
    pub min_profit: Decimal,
    /// Net position above which the futures leg is sent first
    #[serde(default = "default_net_risk_threshold")]
    pub net_risk_threshold: Decimal,
    /// Wait between leasing and using the refinery
    #[serde(default = "default_lease_confirm_ms")]
    pub lease_confirm_ms: u64,
    /// Pause when the refinery is busy
    #[serde(default = "default_busy_delay_ms")]
    pub busy_delay_ms: u64,
}

/// Which side of the origin book prices a transport route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSide {
    Bid,
    Ask,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Display name, e.g. "AK-CS"
    pub name: String,
    /// Spot ticker bought at the origin
    pub origin_ticker: String,
    pub origin_price: PriceSide,
    /// Spot ticker sold at the destination
    pub destination_ticker: String,
    /// Storage leased at the origin before buying
    pub origin_storage: String,
    /// Storage leased at the destination before unwinding
    pub destination_storage: String,
    /// Pipeline lease ticker
    pub pipeline: String,
    /// Pipeline lease cost until news says otherwise
    pub default_lease_cost: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_futures_ticker")]
    pub hedge_ticker: String,
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteConfig>,
    /// Contract size multiplier applied to the price spread
    #[serde(default = "default_notional_multiplier")]
    pub notional_multiplier: Decimal,
    #[serde(default = "default_transport_min_profit")]
    pub min_profit: Decimal,
    #[serde(default = "default_transport_quantity")]
    pub trade_quantity: Decimal,
    /// Units per open batch (one pipeline lease each)
    #[serde(default = "default_open_batch")]
    pub open_batch: Decimal,
    /// Units per unwind batch
    #[serde(default = "default_close_batch")]
    pub close_batch: Decimal,
    /// Length of the transport window in ticks
    #[serde(default = "default_window_ticks")]
    pub window_ticks: Decimal,
    /// Elapsed ticks after which the route is closed
    #[serde(default = "default_close_after_ticks")]
    pub close_after_ticks: Decimal,
    /// Closer than this to the window edge, destination storage is not leased
    #[serde(default = "default_distress_margin")]
    pub distress_margin: Decimal,
    #[serde(default = "default_net_risk_threshold")]
    pub net_risk_threshold: Decimal,
    /// Pause between leasing destination storage and checking arrival
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Pause between open batches
    #[serde(default)]
    pub batch_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 1 = both CL-1F and CL-2F trade, 2 = CL-1F has expired
    #[serde(default = "default_round")]
    pub round: u8,
    #[serde(default = "default_crude_ticker")]
    pub spot_ticker: String,
    /// Carry cost decay per tick block
    #[serde(default = "default_carry_decay")]
    pub carry_decay: Decimal,
    /// Ticks per decay block
    #[serde(default = "default_carry_decay_ticks")]
    pub carry_decay_ticks: Decimal,
    /// Spread magnitude flagged as an opportunity
    #[serde(default = "default_signal_threshold")]
    pub signal_threshold: Decimal,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:9999/v1".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_cycle_interval_ms() -> u64 {
    600
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_max_wait_ms() -> u64 {
    10_000
}

fn default_mm_ticker() -> String {
    "RY".to_string()
}

fn default_mm_end_tick() -> i64 {
    295
}

fn default_mm_order_size() -> Decimal {
    Decimal::new(5000, 0)
}

fn default_mm_rebalance_size() -> Decimal {
    Decimal::new(1500, 0)
}

fn default_mm_rebalance_limit() -> Decimal {
    Decimal::new(4000, 0)
}

fn default_mm_max_open_orders() -> usize {
    6
}

fn default_mm_price_increment() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_mm_sleep_ms() -> u64 {
    300
}

fn default_mm_progress_every() -> i64 {
    10
}

fn default_futures_ticker() -> String {
    "CL-2F".to_string()
}

fn default_position_limit() -> Decimal {
    Decimal::new(100, 0)
}

fn default_report_limit_divisor() -> Decimal {
    Decimal::new(3, 0)
}

fn default_hold_ticks() -> i64 {
    20
}

fn default_report_quantity() -> Decimal {
    Decimal::new(90, 0)
}

fn default_report_legs() -> u32 {
    3
}

fn default_price_impact() -> Decimal {
    Decimal::new(10, 2) // $0.10 per million barrels
}

fn default_move_threshold() -> Decimal {
    Decimal::new(2, 1) // $0.20
}

fn default_disruption_keywords() -> Vec<String> {
    vec!["STRIKE".to_string(), "HURRICANE".to_string()]
}

fn default_crude_ticker() -> String {
    "CL".to_string()
}

fn default_heating_oil_ticker() -> String {
    "HO".to_string()
}

fn default_gasoline_ticker() -> String {
    "RB".to_string()
}

fn default_crude_storage_ticker() -> String {
    "CL-STORAGE".to_string()
}

fn default_batch_size() -> Decimal {
    Decimal::new(30, 0)
}

fn default_storage_slots() -> u32 {
    3
}

fn default_refining_fee() -> Decimal {
    Decimal::new(300_000, 0)
}

fn default_refining_min_profit() -> Decimal {
    Decimal::new(20_000, 0)
}

fn default_net_risk_threshold() -> Decimal {
    Decimal::new(70, 0)
}

fn default_lease_confirm_ms() -> u64 {
    500
}

fn default_busy_delay_ms() -> u64 {
    1_000
}

fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig {
            name: "AK-CS".to_string(),
            origin_ticker: "CL-AK".to_string(),
            origin_price: PriceSide::Bid,
            destination_ticker: "CL".to_string(),
            origin_storage: "AK-STORAGE".to_string(),
            destination_storage: "CL-STORAGE".to_string(),
            pipeline: "AK-CS-PIPE".to_string(),
            default_lease_cost: Decimal::new(50_000, 0),
        },
        RouteConfig {
            name: "CS-NYC".to_string(),
            origin_ticker: "CL".to_string(),
            origin_price: PriceSide::Ask,
            destination_ticker: "CL-NYC".to_string(),
            origin_storage: "CL-STORAGE".to_string(),
            destination_storage: "NYC-STORAGE".to_string(),
            pipeline: "CS-NYC-PIPE".to_string(),
            default_lease_cost: Decimal::new(40_000, 0),
        },
    ]
}

fn default_notional_multiplier() -> Decimal {
    Decimal::new(10_000, 0)
}

fn default_transport_min_profit() -> Decimal {
    Decimal::new(5_000, 0)
}

fn default_transport_quantity() -> Decimal {
    Decimal::new(100, 0)
}

fn default_open_batch() -> Decimal {
    Decimal::new(10, 0)
}

fn default_close_batch() -> Decimal {
    Decimal::new(25, 0)
}

fn default_window_ticks() -> Decimal {
    Decimal::new(30, 0)
}

fn default_close_after_ticks() -> Decimal {
    Decimal::new(27, 0)
}

fn default_distress_margin() -> Decimal {
    Decimal::new(5, 1) // 0.5 ticks
}

fn default_settle_delay_ms() -> u64 {
    2_000
}

fn default_round() -> u8 {
    2
}

fn default_carry_decay() -> Decimal {
    Decimal::new(5, 2) // 0.05
}

fn default_carry_decay_ticks() -> Decimal {
    Decimal::new(30, 0)
}

fn default_signal_threshold() -> Decimal {
    Decimal::new(15, 2) // 0.15
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("RIT"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        let mm = &self.market_making;
        anyhow::ensure!(
            mm.order_size > Decimal::ZERO && mm.rebalance_size > Decimal::ZERO,
            "market-making order sizes must be positive"
        );
        anyhow::ensure!(
            mm.rebalance_size <= mm.order_size,
            "rebalance_size must not exceed order_size"
        );
        anyhow::ensure!(mm.start_tick < mm.end_tick, "start_tick must precede end_tick");

        anyhow::ensure!(
            self.fundamental.report_legs >= 1,
            "report_legs must be at least 1"
        );
        anyhow::ensure!(
            self.fundamental.position_limit > Decimal::ZERO,
            "position_limit must be positive"
        );
        anyhow::ensure!(
            self.fundamental.report_limit_divisor >= Decimal::ONE,
            "report_limit_divisor must be at least 1"
        );

        let t = &self.transport;
        anyhow::ensure!(
            t.open_batch > Decimal::ZERO && t.close_batch > Decimal::ZERO,
            "transport batch sizes must be positive"
        );
        anyhow::ensure!(
            (t.trade_quantity % t.open_batch).is_zero() && (t.trade_quantity % t.close_batch).is_zero(),
            "trade_quantity must be a multiple of both batch sizes"
        );
        anyhow::ensure!(
            t.close_after_ticks <= t.window_ticks,
            "close_after_ticks must not exceed window_ticks"
        );

        anyhow::ensure!(
            matches!(self.storage.round, 1 | 2),
            "storage round must be 1 or 2"
        );

        Ok(())
    }
}

impl RuntimeConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cycle_interval_ms: default_cycle_interval_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

impl Default for MarketMakingConfig {
    fn default() -> Self {
        Self {
            ticker: default_mm_ticker(),
            start_tick: 0,
            end_tick: default_mm_end_tick(),
            order_size: default_mm_order_size(),
            rebalance_size: default_mm_rebalance_size(),
            rebalance_limit: default_mm_rebalance_limit(),
            max_open_orders: default_mm_max_open_orders(),
            price_increment: default_mm_price_increment(),
            sleep_ms: default_mm_sleep_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            progress_every_ticks: default_mm_progress_every(),
        }
    }
}

impl Default for FundamentalConfig {
    fn default() -> Self {
        Self {
            ticker: default_futures_ticker(),
            position_limit: default_position_limit(),
            report_limit_divisor: default_report_limit_divisor(),
            hold_ticks: default_hold_ticks(),
            report_quantity: default_report_quantity(),
            report_legs: default_report_legs(),
            price_impact: default_price_impact(),
            move_threshold: default_move_threshold(),
            disruption_keywords: default_disruption_keywords(),
            disruption_max_quantity: None,
        }
    }
}

impl Default for RefiningConfig {
    fn default() -> Self {
        Self {
            crude_ticker: default_crude_ticker(),
            hedge_ticker: default_futures_ticker(),
            heating_oil_ticker: default_heating_oil_ticker(),
            gasoline_ticker: default_gasoline_ticker(),
            storage_ticker: default_crude_storage_ticker(),
            batch_size: default_batch_size(),
            storage_slots: default_storage_slots(),
            refining_fee: default_refining_fee(),
            min_profit: default_refining_min_profit(),
            net_risk_threshold: default_net_risk_threshold(),
            lease_confirm_ms: default_lease_confirm_ms(),
            busy_delay_ms: default_busy_delay_ms(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            hedge_ticker: default_futures_ticker(),
            routes: default_routes(),
            notional_multiplier: default_notional_multiplier(),
            min_profit: default_transport_min_profit(),
            trade_quantity: default_transport_quantity(),
            open_batch: default_open_batch(),
            close_batch: default_close_batch(),
            window_ticks: default_window_ticks(),
            close_after_ticks: default_close_after_ticks(),
            distress_margin: default_distress_margin(),
            net_risk_threshold: default_net_risk_threshold(),
            settle_delay_ms: default_settle_delay_ms(),
            batch_delay_ms: 0,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            round: default_round(),
            spot_ticker: default_crude_ticker(),
            carry_decay: default_carry_decay(),
            carry_decay_ticks: default_carry_decay_ticks(),
            signal_threshold: default_signal_threshold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_uneven_transport_batches() {
        let mut config = Config::default();
        config.transport.close_batch = Decimal::new(30, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_routes() {
        let routes = TransportConfig::default().routes;
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].pipeline, "AK-CS-PIPE");
        assert_eq!(routes[1].origin_price, PriceSide::Ask);
    }
}
