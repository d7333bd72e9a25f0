//! # RIT Commodity Trader
//!
//! Automated strategies for the Rotman Interactive Trader commodities case:
//! market making, news-driven futures trades, refining and pipeline
//! arbitrage, and storage spread monitoring.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `error`: Error taxonomy shared by the gateway and the engines
//! - `exchange`: Simulator REST client, gateway trait and in-memory mock
//! - `strategy`: Engines, trade lifecycle and headline classification
//! - `orchestrator`: The per-cycle control loop for the arbitrage engines
//! - `utils`: Shared utilities and decimal arithmetic

pub mod config;
pub mod error;
pub mod exchange;
pub mod orchestrator;
pub mod strategy;
pub mod utils;

pub use config::Config;
pub use error::{Result, TradingError};
