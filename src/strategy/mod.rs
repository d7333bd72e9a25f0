//! Trading strategy implementation.
//!
//! Contains the per-model decision logic:
//! - Two-sided market making with inventory skew
//! - News-driven futures trades (scheduled reports, disruptions)
//! - Refining and transport arbitrage with futures hedges
//! - Storage calendar-spread monitoring
//!
//! Every engine runs one cycle at a time against a `TradingGateway` and
//! reports what it did as a `CycleOutcome`.

mod execution;
mod fundamental;
mod market_maker;
mod news;
mod pipeline;
mod refining;
mod storage;
mod trade;
mod transport;

pub use execution::{execute_legs, wait_for_position, WaitOutcome, WaitPolicy};
pub use fundamental::FundamentalEngine;
pub use market_maker::{MarketMaker, SessionSummary};
pub use news::{HeadlineClassifier, NewsSignal};
pub use pipeline::PipelineCosts;
pub use refining::{refining_margin, RefiningEngine, RefiningMargin};
pub use storage::{expected_carry, SpreadSignal, StorageEngine};
pub use trade::{split_equal, ActiveTrade, Leg, TradeSlot};
pub use transport::{expected_profit, TransportEngine};

use std::fmt;

/// What an engine did during one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Orders or leases were submitted
    Acted(String),
    /// Nothing to do this cycle
    Skipped(String),
}

impl CycleOutcome {
    pub fn acted(&self) -> bool {
        matches!(self, CycleOutcome::Acted(_))
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Acted(reason) => write!(f, "acted: {}", reason),
            CycleOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
        }
    }
}
