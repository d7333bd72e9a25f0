//! Simulator integration.
//!
//! ## RIT REST API
//! - Market data (tick, books, positions, limits, news)
//! - Orders (market/limit submit, cancel)
//! - Leases (storage, refinery, pipelines)
//!
//! ## Mock
//! An in-memory exchange implementing the same gateway trait, used by the
//! engine and orchestrator tests.

mod client;
pub mod mock;
mod traits;
mod types;

pub use client::RitClient;
pub use mock::MockExchange;
pub use traits::{TradingGateway, REFINERY_TICKER};
pub use types::*;
