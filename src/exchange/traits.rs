//! Venue-agnostic gateway trait consumed by every strategy engine.
//!
//! The required methods map one-to-one onto simulator endpoints. The provided
//! methods are the composite read/write helpers the engines share:
//! - quotes and position lookups
//! - market/limit order shortcuts
//! - storage, refinery and pipeline lease workflows
//! - abandoned-lease reclamation

use crate::error::{Result, TradingError};
use crate::exchange::types::*;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Ticker of the refinery facility.
pub const REFINERY_TICKER: &str = "CL-REFINERY";

/// Read and write access to the trading simulator.
#[async_trait]
pub trait TradingGateway: Send + Sync {
    // ==================== Market Data ====================

    /// Current simulation tick.
    async fn get_tick(&self) -> Result<i64>;

    /// All securities with their positions.
    async fn get_securities(&self) -> Result<Vec<Security>>;

    /// Order book for one ticker.
    async fn get_book(&self, ticker: &str) -> Result<Book>;

    /// Trader's orders in a given status.
    async fn get_orders(&self, status: OrderStatus) -> Result<Vec<Order>>;

    /// Trader summary including NLV.
    async fn get_trader(&self) -> Result<TraderInfo>;

    /// Risk limit rows.
    async fn get_limits(&self) -> Result<Vec<RiskLimit>>;

    /// News feed, most recent first.
    async fn get_news(&self) -> Result<Vec<NewsItem>>;

    /// All currently held leases.
    async fn get_leases(&self) -> Result<Vec<Lease>>;

    // ==================== Orders & Leases ====================

    async fn place_order(&self, order: &NewOrder) -> Result<Order>;

    async fn cancel_order(&self, order_id: i64) -> Result<()>;

    /// `POST /leases`.
    async fn create_lease(&self, request: &LeaseRequest) -> Result<Lease>;

    /// `POST /leases/{id}`.
    async fn use_lease(&self, lease_id: i64, request: &LeaseRequest) -> Result<Lease>;

    /// `DELETE /leases/{id}`.
    async fn close_lease(&self, lease_id: i64) -> Result<()>;

    // ==================== Composite helpers ====================

    /// Best bid and ask; errors when either side of the book is empty.
    async fn get_quote(&self, ticker: &str) -> Result<Quote> {
        let book = self.get_book(ticker).await?;
        match (book.bids.first(), book.asks.first()) {
            (Some(bid), Some(ask)) => Ok(Quote {
                ticker: ticker.to_string(),
                best_bid: bid.price,
                best_ask: ask.price,
            }),
            _ => Err(TradingError::DataUnavailable(format!(
                "no bids or asks available for {}",
                ticker
            ))),
        }
    }

    /// Ticker -> signed position for every security.
    async fn get_positions(&self) -> Result<HashMap<String, Decimal>> {
        let securities = self.get_securities().await?;
        Ok(securities
            .into_iter()
            .map(|s| (s.ticker, s.position))
            .collect())
    }

    /// Position in a single ticker; errors when the ticker is unknown.
    async fn get_position(&self, ticker: &str) -> Result<Decimal> {
        let securities = self.get_securities().await?;
        securities
            .into_iter()
            .find(|s| s.ticker == ticker)
            .map(|s| s.position)
            .ok_or_else(|| {
                TradingError::DataUnavailable(format!("ticker {} not found in securities", ticker))
            })
    }

    /// Aggregate net position from the first limits row.
    async fn get_net_position(&self) -> Result<Decimal> {
        let limits = self.get_limits().await?;
        limits
            .first()
            .map(|l| l.net)
            .ok_or_else(|| TradingError::DataUnavailable("no risk limits reported".to_string()))
    }

    async fn get_nlv(&self) -> Result<Decimal> {
        Ok(self.get_trader().await?.nlv)
    }

    async fn market_order(&self, ticker: &str, side: OrderSide, quantity: Decimal) -> Result<Order> {
        debug!(%ticker, %side, %quantity, "Submitting market order");
        self.place_order(&NewOrder::market(ticker, side, quantity))
            .await
    }

    async fn limit_order(
        &self,
        ticker: &str,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<Order> {
        debug!(%ticker, %side, %quantity, %price, "Submitting limit order");
        self.place_order(&NewOrder::limit(ticker, side, quantity, price))
            .await
    }

    /// Lease one storage slot (e.g. `CL-STORAGE`, `AK-STORAGE`).
    async fn lease_storage(&self, ticker: &str) -> Result<Lease> {
        self.create_lease(&LeaseRequest::facility(ticker)).await
    }

    async fn lease_refinery(&self) -> Result<Lease> {
        self.create_lease(&LeaseRequest::facility(REFINERY_TICKER))
            .await
    }

    /// The currently held refinery lease, if any.
    async fn refinery_lease(&self) -> Result<Option<Lease>> {
        let leases = self.get_leases().await?;
        Ok(leases.into_iter().find(|l| l.ticker == REFINERY_TICKER))
    }

    /// Feed `quantity` of `from_ticker` into the held refinery lease.
    async fn use_refinery(&self, from_ticker: &str, quantity: Decimal) -> Result<Lease> {
        let lease = self.refinery_lease().await?.ok_or_else(|| {
            TradingError::DataUnavailable("no refinery lease held".to_string())
        })?;
        info!(lease_id = lease.id, %from_ticker, %quantity, "Feeding refinery");
        self.use_lease(lease.id, &LeaseRequest::input_only(from_ticker, quantity))
            .await
    }

    /// Lease a pipeline and ship `quantity` of `from_ticker` through it.
    async fn lease_use_transport(
        &self,
        pipeline: &str,
        from_ticker: &str,
        quantity: Decimal,
    ) -> Result<Lease> {
        self.create_lease(&LeaseRequest::with_input(pipeline, from_ticker, quantity))
            .await
    }

    /// Close every lease with zero or unknown containment usage.
    /// Returns the ids that were closed; individual close failures are logged.
    async fn close_empty_leases(&self) -> Result<Vec<i64>> {
        let leases = self.get_leases().await?;
        let mut closed = Vec::new();
        for lease in leases.iter().filter(|l| l.is_empty()) {
            match self.close_lease(lease.id).await {
                Ok(()) => closed.push(lease.id),
                Err(e) => warn!(lease_id = lease.id, ticker = %lease.ticker, error = %e, "Failed to close empty lease"),
            }
        }
        if !closed.is_empty() {
            debug!(count = closed.len(), "Closed empty leases");
        }
        Ok(closed)
    }
}
