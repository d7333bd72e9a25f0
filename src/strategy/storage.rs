//! Calendar-spread monitor between crude futures and spot.
//!
//! Signal only: spreads are computed and logged, no orders are sent.

use crate::config::StorageConfig;
use crate::error::Result;
use crate::exchange::TradingGateway;
use crate::strategy::CycleOutcome;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

const FRONT_MONTH: &str = "CL-1F";
const SECOND_MONTH: &str = "CL-2F";

/// Expected cost of carry at `tick`, decaying linearly to zero.
pub fn expected_carry(
    base: Decimal,
    tick: i64,
    decay: Decimal,
    decay_ticks: Decimal,
) -> Decimal {
    if decay_ticks.is_zero() {
        return base.max(Decimal::ZERO);
    }
    (base - decay * Decimal::from(tick) / decay_ticks).max(Decimal::ZERO)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadSignal {
    pub contract: String,
    pub futures_mid: Decimal,
    pub spot_mid: Decimal,
    pub expected_carry: Decimal,
    /// Futures premium over spot beyond the expected carry
    pub spread: Decimal,
    pub flagged: bool,
}

pub struct StorageEngine {
    config: StorageConfig,
}

impl StorageEngine {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Contracts tracked this round with their starting carry.
    fn tracked_contracts(&self) -> Vec<(&'static str, Decimal)> {
        match self.config.round {
            1 => vec![(FRONT_MONTH, Decimal::ONE), (SECOND_MONTH, Decimal::TWO)],
            _ => vec![(SECOND_MONTH, Decimal::ONE)],
        }
    }

    pub async fn evaluate(
        &self,
        gateway: &dyn TradingGateway,
        tick: i64,
    ) -> Result<Vec<SpreadSignal>> {
        let spot_mid = gateway.get_quote(&self.config.spot_ticker).await?.mid();
        let mut signals = Vec::new();

        for (contract, base) in self.tracked_contracts() {
            let futures_mid = gateway.get_quote(contract).await?.mid();
            let carry = expected_carry(
                base,
                tick,
                self.config.carry_decay,
                self.config.carry_decay_ticks,
            );
            let spread = futures_mid - spot_mid - carry;

            signals.push(SpreadSignal {
                contract: contract.to_string(),
                futures_mid,
                spot_mid,
                expected_carry: carry,
                spread,
                flagged: spread.abs() > self.config.signal_threshold,
            });
        }

        Ok(signals)
    }

    pub async fn run_cycle(
        &self,
        gateway: &dyn TradingGateway,
        tick: i64,
    ) -> Result<CycleOutcome> {
        let signals = self.evaluate(gateway, tick).await?;

        for signal in &signals {
            if signal.flagged {
                info!(
                    tick,
                    contract = %signal.contract,
                    spread = %signal.spread.round_dp(2),
                    carry = %signal.expected_carry,
                    "Storage spread outside threshold"
                );
            } else {
                debug!(
                    tick,
                    contract = %signal.contract,
                    spread = %signal.spread.round_dp(2),
                    "Storage spread"
                );
            }
        }

        let summary: Vec<String> = signals
            .iter()
            .map(|s| format!("{} {}", s.contract, s.spread.round_dp(2)))
            .collect();
        Ok(CycleOutcome::Skipped(format!("spreads {}", summary.join(", "))))
    }
}
