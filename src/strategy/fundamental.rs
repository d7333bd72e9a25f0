//! News-driven futures trading.
//!
//! Each cycle first closes any trade whose hold window has elapsed, then looks
//! at the most recent headline:
//! - scheduled inventory reports open a 3-leg trade sized to the report headroom
//! - supply disruptions open a single long leg up to the position limit
//! - pipeline announcements update the shared lease costs

use crate::config::FundamentalConfig;
use crate::error::{Result, TradingError};
use crate::exchange::{OrderSide, TradingGateway};
use crate::strategy::execution::execute_legs;
use crate::strategy::news::{HeadlineClassifier, NewsSignal};
use crate::strategy::pipeline::PipelineCosts;
use crate::strategy::trade::{ActiveTrade, TradeSlot};
use crate::strategy::CycleOutcome;
use crate::utils::decimal::round_down_to_lot;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

const REPORT_ROUTE: &str = "report";
const DISRUPTION_ROUTE: &str = "disruption";

pub struct FundamentalEngine {
    config: FundamentalConfig,
    classifier: HeadlineClassifier,
    last_processed_news_id: Option<i64>,
    report_trade: TradeSlot,
    disruption_trade: TradeSlot,
}

impl FundamentalEngine {
    pub fn new(config: FundamentalConfig, pipeline_routes: Vec<String>) -> Self {
        let classifier =
            HeadlineClassifier::new(pipeline_routes, config.disruption_keywords.clone());
        Self {
            config,
            classifier,
            last_processed_news_id: None,
            report_trade: TradeSlot::default(),
            disruption_trade: TradeSlot::default(),
        }
    }

    pub fn last_processed_news_id(&self) -> Option<i64> {
        self.last_processed_news_id
    }

    pub fn report_trade(&self) -> Option<&ActiveTrade> {
        self.report_trade.get()
    }

    pub fn disruption_trade(&self) -> Option<&ActiveTrade> {
        self.disruption_trade.get()
    }

    /// Close expired trades, then react to the latest headline.
    pub async fn run_cycle(
        &mut self,
        gateway: &dyn TradingGateway,
        tick: i64,
        costs: &mut PipelineCosts,
    ) -> Result<CycleOutcome> {
        let closed = self.manage_positions(gateway, tick).await?;
        let outcome = self.evaluate_news(gateway, tick, costs).await?;

        if closed == 0 {
            return Ok(outcome);
        }
        let detail = match outcome {
            CycleOutcome::Acted(s) | CycleOutcome::Skipped(s) => s,
        };
        Ok(CycleOutcome::Acted(format!(
            "closed {} trade(s); {}",
            closed, detail
        )))
    }

    /// Offset every trade held for at least `hold_ticks`. Returns how many
    /// trades were closed.
    pub async fn manage_positions(
        &mut self,
        gateway: &dyn TradingGateway,
        tick: i64,
    ) -> Result<usize> {
        let hold_ticks = self.config.hold_ticks;
        let mut closed = 0;

        for slot in [&mut self.report_trade, &mut self.disruption_trade] {
            let Some(trade) = slot.get() else {
                continue;
            };
            if !trade.hold_elapsed(tick, hold_ticks) {
                continue;
            }

            info!(
                route = %trade.route,
                ticker = %trade.ticker,
                side = %trade.side,
                quantity = %trade.quantity,
                entry_tick = trade.entry_tick,
                tick,
                "Hold window elapsed, closing trade"
            );
            execute_legs(gateway, &trade.closing_legs()).await?;
            slot.clear();
            closed += 1;
        }

        Ok(closed)
    }

    /// Classify the most recent news item and act on it at most once.
    #[instrument(skip(self, gateway, costs))]
    pub async fn evaluate_news(
        &mut self,
        gateway: &dyn TradingGateway,
        tick: i64,
        costs: &mut PipelineCosts,
    ) -> Result<CycleOutcome> {
        let news = gateway.get_news().await?;
        let Some(latest) = news.first() else {
            return Ok(CycleOutcome::Skipped("no news".to_string()));
        };
        if self.last_processed_news_id == Some(latest.news_id) {
            return Ok(CycleOutcome::Skipped(format!(
                "news {} already processed",
                latest.news_id
            )));
        }

        let signal = self.classifier.classify(latest)?;
        let outcome = match signal {
            NewsSignal::ScheduledReport { actual, forecast } => {
                self.trade_report(gateway, tick, actual, forecast).await?
            }
            NewsSignal::Disruption { keyword } => {
                self.trade_disruption(gateway, tick, &keyword).await?
            }
            NewsSignal::PipelineUpdate { route, amount } => {
                costs.update(&route, amount);
                CycleOutcome::Acted(format!("{} lease cost now {}", route, amount))
            }
            NewsSignal::Unclassified => {
                return Ok(CycleOutcome::Skipped(format!(
                    "news {} not actionable",
                    latest.news_id
                )));
            }
        };

        self.last_processed_news_id = Some(latest.news_id);
        info!(news_id = latest.news_id, %outcome, "News processed");
        Ok(outcome)
    }

    async fn trade_report(
        &mut self,
        gateway: &dyn TradingGateway,
        tick: i64,
        actual: Decimal,
        forecast: Decimal,
    ) -> Result<CycleOutcome> {
        let surprise = NewsSignal::report_surprise(actual, forecast)?;
        let expected_move = surprise
            .checked_mul(self.config.price_impact)
            .ok_or_else(|| {
                TradingError::Parse(format!("expected move out of range for surprise {}", surprise))
            })?;

        info!(%actual, %forecast, %surprise, %expected_move, "Inventory report");

        if expected_move.abs() <= self.config.move_threshold {
            return Ok(CycleOutcome::Skipped(format!(
                "expected move {} below threshold",
                expected_move
            )));
        }
        if self.report_trade.is_active() {
            return Ok(CycleOutcome::Skipped(
                "report trade already active".to_string(),
            ));
        }

        let side = if expected_move > Decimal::ZERO {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        let ticker = &self.config.ticker;
        let position = self.position(gateway).await?;
        let headroom =
            self.config.position_limit / self.config.report_limit_divisor - side.sign() * position;
        let legs = self.config.report_legs;
        let quantity = round_down_to_lot(
            self.config.report_quantity.min(headroom),
            Decimal::from(legs),
        );

        if quantity <= Decimal::ZERO {
            warn!(%position, %headroom, %side, "No headroom for report trade");
            return Ok(CycleOutcome::Skipped(format!(
                "no headroom to {} {}",
                side, ticker
            )));
        }

        let trade = ActiveTrade::new(REPORT_ROUTE, ticker, side, quantity, legs, tick);
        execute_legs(gateway, &trade.opening_legs()).await?;

        info!(%ticker, %side, %quantity, legs, tick, "Report trade opened");
        let summary = format!("{} {} {} in {} legs", side, quantity, ticker, legs);
        if self.report_trade.try_open(trade).is_err() {
            warn!("Report trade slot occupied while opening");
        }
        Ok(CycleOutcome::Acted(summary))
    }

    async fn trade_disruption(
        &mut self,
        gateway: &dyn TradingGateway,
        tick: i64,
        keyword: &str,
    ) -> Result<CycleOutcome> {
        if self.disruption_trade.is_active() {
            return Ok(CycleOutcome::Skipped(
                "disruption trade already active".to_string(),
            ));
        }

        let ticker = &self.config.ticker;
        let position = self.position(gateway).await?;
        let headroom = (self.config.position_limit - position).floor();
        let quantity = match self.config.disruption_max_quantity {
            Some(cap) => cap.min(headroom),
            None => headroom,
        };

        if quantity <= Decimal::ZERO {
            warn!(%position, %keyword, "Position limit reached, ignoring disruption");
            return Ok(CycleOutcome::Skipped("position limit reached".to_string()));
        }

        let trade = ActiveTrade::new(DISRUPTION_ROUTE, ticker, OrderSide::Buy, quantity, 1, tick);
        execute_legs(gateway, &trade.opening_legs()).await?;

        info!(%ticker, %keyword, %quantity, tick, "Disruption trade opened");
        let summary = format!("BUY {} {} on {}", quantity, ticker, keyword);
        if self.disruption_trade.try_open(trade).is_err() {
            warn!("Disruption trade slot occupied while opening");
        }
        Ok(CycleOutcome::Acted(summary))
    }

    async fn position(&self, gateway: &dyn TradingGateway) -> Result<Decimal> {
        let positions = gateway.get_positions().await?;
        Ok(positions
            .get(&self.config.ticker)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use crate::error::TradingError;
    use crate::exchange::MockExchange;
    use rust_decimal_macros::dec;

    fn engine() -> FundamentalEngine {
        FundamentalEngine::new(
            FundamentalConfig::default(),
            vec!["AK-CS-PIPE".to_string(), "CS-NYC-PIPE".to_string()],
        )
    }

    fn costs() -> PipelineCosts {
        PipelineCosts::from_routes(&TransportConfig::default().routes)
    }

    #[tokio::test]
    async fn test_report_draw_buys_in_three_equal_legs() {
        let exchange = MockExchange::new();
        let news_id = exchange
            .push_news("CL", "ACTUAL DRAW 14 MLN BBLS VS FORECAST DRAW 5 MLN BBLS")
            .await;
        let mut engine = engine();
        let mut costs = costs();

        let outcome = engine.run_cycle(&exchange, 10, &mut costs).await.unwrap();
        assert!(outcome.acted());

        let orders = exchange.submitted_orders().await;
        assert_eq!(orders.len(), 3);
        assert!(orders.iter().all(|o| o.action == OrderSide::Buy));
        assert!(orders.iter().all(|o| o.quantity == dec!(11)));
        assert_eq!(exchange.position("CL-2F").await, dec!(33));

        let trade = engine.report_trade().unwrap();
        assert_eq!(trade.quantity, dec!(33));
        assert_eq!(trade.entry_tick, 10);
        assert_eq!(engine.last_processed_news_id(), Some(news_id));
    }

    #[tokio::test]
    async fn test_processed_news_never_trades_twice() {
        let exchange = MockExchange::new();
        exchange
            .push_news("CL", "ACTUAL DRAW 14 MLN BBLS VS FORECAST DRAW 5 MLN BBLS")
            .await;
        let mut engine = engine();
        let mut costs = costs();

        engine.run_cycle(&exchange, 1, &mut costs).await.unwrap();
        let second = engine.run_cycle(&exchange, 2, &mut costs).await.unwrap();

        assert!(!second.acted());
        assert_eq!(exchange.submitted_orders().await.len(), 3);
    }

    #[tokio::test]
    async fn test_bearish_report_respects_headroom() {
        let exchange = MockExchange::new();
        exchange.set_position("CL-2F", dec!(-10)).await;
        exchange
            .push_news("CL", "ACTUAL BUILD 10 MLN BBLS VS FORECAST DRAW 2 MLN BBLS")
            .await;
        let mut engine = engine();

        engine.run_cycle(&exchange, 0, &mut costs()).await.unwrap();

        let trade = engine.report_trade().unwrap();
        assert_eq!(trade.side, OrderSide::Sell);
        // 100/3 - 10 = 23.33 -> 21
        assert_eq!(trade.quantity, dec!(21));
        assert_eq!(exchange.position("CL-2F").await, dec!(-31));
    }

    #[tokio::test]
    async fn test_small_surprise_is_marked_without_trading() {
        let exchange = MockExchange::new();
        let news_id = exchange
            .push_news("CL", "ACTUAL DRAW 5 MLN BBLS VS FORECAST DRAW 4 MLN BBLS")
            .await;
        let mut engine = engine();

        let outcome = engine.run_cycle(&exchange, 0, &mut costs()).await.unwrap();
        assert!(!outcome.acted());
        assert!(exchange.submitted_orders().await.is_empty());
        assert_eq!(engine.last_processed_news_id(), Some(news_id));
    }

    #[tokio::test]
    async fn test_malformed_report_is_retried() {
        let exchange = MockExchange::new();
        exchange
            .push_news("CL", "ACTUAL DRAW VS FORECAST DRAW 5 MLN BBLS")
            .await;
        let mut engine = engine();
        let mut costs = costs();

        for _ in 0..2 {
            let err = engine.run_cycle(&exchange, 0, &mut costs).await.unwrap_err();
            assert!(matches!(err, TradingError::Parse(_)));
        }
        assert_eq!(engine.last_processed_news_id(), None);
    }

    #[tokio::test]
    async fn test_out_of_range_report_is_rejected_without_trading() {
        let exchange = MockExchange::new();
        exchange
            .push_news(
                "CL",
                "ACTUAL BUILD 79228162514264337593543950335 MLN BBLS VS FORECAST DRAW 79228162514264337593543950335 MLN BBLS",
            )
            .await;
        let mut engine = engine();
        let mut costs = costs();

        let err = engine.run_cycle(&exchange, 0, &mut costs).await.unwrap_err();
        assert!(matches!(err, TradingError::Parse(_)));
        assert_eq!(engine.last_processed_news_id(), None);
        assert!(exchange.submitted_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_trade_closes_after_hold_window() {
        let exchange = MockExchange::new();
        exchange.set_position("CL-2F", dec!(6)).await;
        exchange
            .push_news("CL", "ACTUAL DRAW 14 MLN BBLS VS FORECAST DRAW 5 MLN BBLS")
            .await;
        let mut engine = engine();
        let mut costs = costs();

        engine.run_cycle(&exchange, 100, &mut costs).await.unwrap();
        assert_eq!(exchange.position("CL-2F").await, dec!(33));

        assert_eq!(engine.manage_positions(&exchange, 119).await.unwrap(), 0);
        assert!(engine.report_trade().is_some());

        let outcome = engine.run_cycle(&exchange, 120, &mut costs).await.unwrap();
        assert!(outcome.acted());
        assert!(engine.report_trade().is_none());
        assert_eq!(exchange.position("CL-2F").await, dec!(6));

        let orders = exchange.submitted_orders().await;
        let closing: Vec<_> = orders[3..].iter().collect();
        assert_eq!(closing.len(), 3);
        assert!(closing.iter().all(|o| o.action == OrderSide::Sell));
    }

    #[tokio::test]
    async fn test_disruption_buys_full_headroom() {
        let exchange = MockExchange::new();
        exchange.set_position("CL-2F", dec!(40)).await;
        exchange
            .push_news("CL", "Hurricane shuts Gulf production")
            .await;
        let mut engine = engine();

        engine.run_cycle(&exchange, 5, &mut costs()).await.unwrap();

        let orders = exchange.submitted_orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].quantity, dec!(60));
        assert_eq!(engine.disruption_trade().unwrap().side, OrderSide::Buy);
    }

    #[tokio::test]
    async fn test_disruption_cap() {
        let exchange = MockExchange::new();
        exchange.push_news("CL", "Port workers strike").await;
        let mut engine = FundamentalEngine::new(
            FundamentalConfig {
                disruption_max_quantity: Some(dec!(50)),
                ..Default::default()
            },
            Vec::new(),
        );

        engine.run_cycle(&exchange, 0, &mut costs()).await.unwrap();
        assert_eq!(exchange.position("CL-2F").await, dec!(50));
    }

    #[tokio::test]
    async fn test_pipeline_news_updates_costs() {
        let exchange = MockExchange::new();
        let news_id = exchange
            .push_news("CS-NYC-PIPE", "CS-NYC pipeline lease price set at $25,000")
            .await;
        let mut engine = engine();
        let mut costs = costs();

        engine.run_cycle(&exchange, 0, &mut costs).await.unwrap();
        assert_eq!(costs.get("CS-NYC-PIPE"), Some(dec!(25000)));
        assert_eq!(engine.last_processed_news_id(), Some(news_id));
        assert!(exchange.submitted_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_unclassified_news_is_ignored() {
        let exchange = MockExchange::new();
        exchange.push_news("CL", "Markets open quietly").await;
        let mut engine = engine();

        let outcome = engine.run_cycle(&exchange, 0, &mut costs()).await.unwrap();
        assert!(!outcome.acted());
        assert_eq!(engine.last_processed_news_id(), None);
        assert!(exchange.submitted_orders().await.is_empty());
    }
}
