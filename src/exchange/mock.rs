//! In-memory simulator exchange for tests.

use super::traits::{TradingGateway, REFINERY_TICKER};
use super::types::*;
use crate::error::{Result, TradingError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Simulated exchange state.
#[derive(Debug, Default)]
pub struct MockExchangeState {
    pub tick: i64,
    pub positions: HashMap<String, Decimal>,
    pub books: HashMap<String, Book>,
    /// Every order ever submitted, in submission order.
    pub orders: Vec<Order>,
    pub leases: Vec<Lease>,
    /// News in arrival order (oldest first).
    pub news: Vec<NewsItem>,
    pub nlv: Decimal,
    /// Overrides the computed net position when set.
    pub net_override: Option<Decimal>,
    /// Pipeline ticker -> destination spot ticker.
    pub pipelines: HashMap<String, String>,
    /// When false, shipped quantities stay in transit instead of arriving.
    pub deliver_transport: bool,
    /// Fail the n-th (1-based) order submission from now.
    pub fail_order_at: Option<usize>,
    /// Every lease request, in order.
    pub lease_requests: Vec<LeaseRequest>,
    /// When true, the case endpoint is unreachable.
    pub offline: bool,
}

/// Mock client that simulates the RIT API.
pub struct MockExchange {
    state: Arc<RwLock<MockExchangeState>>,
    order_id_counter: AtomicI64,
    lease_id_counter: AtomicI64,
    news_id_counter: AtomicI64,
}

impl Default for MockExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExchange {
    pub fn new() -> Self {
        let state = MockExchangeState {
            deliver_transport: true,
            ..Default::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
            order_id_counter: AtomicI64::new(1),
            lease_id_counter: AtomicI64::new(1),
            news_id_counter: AtomicI64::new(1),
        }
    }

    pub async fn set_tick(&self, tick: i64) {
        self.state.write().await.tick = tick;
    }

    pub async fn advance_ticks(&self, ticks: i64) {
        self.state.write().await.tick += ticks;
    }

    /// Set a one-level book for `ticker`.
    pub async fn set_quote(&self, ticker: &str, bid: Decimal, ask: Decimal) {
        let book = Book {
            bids: vec![BookLevel { price: bid, quantity: None }],
            asks: vec![BookLevel { price: ask, quantity: None }],
        };
        self.state.write().await.books.insert(ticker.to_string(), book);
    }

    pub async fn clear_book(&self, ticker: &str) {
        self.state
            .write()
            .await
            .books
            .insert(ticker.to_string(), Book::default());
    }

    pub async fn set_position(&self, ticker: &str, position: Decimal) {
        self.state
            .write()
            .await
            .positions
            .insert(ticker.to_string(), position);
    }

    pub async fn position(&self, ticker: &str) -> Decimal {
        self.state
            .read()
            .await
            .positions
            .get(ticker)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub async fn set_net_position(&self, net: Option<Decimal>) {
        self.state.write().await.net_override = net;
    }

    pub async fn set_nlv(&self, nlv: Decimal) {
        self.state.write().await.nlv = nlv;
    }

    pub async fn register_pipeline(&self, pipeline: &str, destination: &str) {
        self.state
            .write()
            .await
            .pipelines
            .insert(pipeline.to_string(), destination.to_string());
    }

    pub async fn set_transport_delivery(&self, deliver: bool) {
        self.state.write().await.deliver_transport = deliver;
    }

    pub async fn set_offline(&self, offline: bool) {
        self.state.write().await.offline = offline;
    }

    /// Make the n-th order submission from now fail with a transient error.
    pub async fn fail_order_at(&self, nth: usize) {
        self.state.write().await.fail_order_at = Some(nth);
    }

    /// Publish a news item; returns its id.
    pub async fn push_news(&self, ticker: &str, headline: &str) -> i64 {
        let news_id = self.news_id_counter.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().await;
        let tick = state.tick;
        state.news.push(NewsItem {
            news_id,
            ticker: ticker.to_string(),
            headline: headline.to_string(),
            body: String::new(),
            tick: Some(tick),
        });
        news_id
    }

    /// Finish the current refinery batch: remove the lease and credit outputs.
    pub async fn complete_refining(&self, outputs: &[(&str, Decimal)]) {
        let mut state = self.state.write().await;
        state.leases.retain(|l| l.ticker != REFINERY_TICKER);
        for (ticker, quantity) in outputs {
            *state.positions.entry(ticker.to_string()).or_default() += *quantity;
        }
    }

    /// All submitted orders, oldest first.
    pub async fn submitted_orders(&self) -> Vec<Order> {
        self.state.read().await.orders.clone()
    }

    pub async fn lease_requests(&self) -> Vec<LeaseRequest> {
        self.state.read().await.lease_requests.clone()
    }

    pub async fn held_leases(&self) -> Vec<Lease> {
        self.state.read().await.leases.clone()
    }

    fn next_order_id(&self) -> i64 {
        self.order_id_counter.fetch_add(1, Ordering::SeqCst)
    }

    fn next_lease_id(&self) -> i64 {
        self.lease_id_counter.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl TradingGateway for MockExchange {
    async fn get_tick(&self) -> Result<i64> {
        let state = self.state.read().await;
        if state.offline {
            return Err(TradingError::transient("/case", "connection refused"));
        }
        Ok(state.tick)
    }

    async fn get_securities(&self) -> Result<Vec<Security>> {
        let state = self.state.read().await;
        let mut tickers: Vec<&String> = state.positions.keys().chain(state.books.keys()).collect();
        tickers.sort();
        tickers.dedup();

        Ok(tickers
            .into_iter()
            .map(|ticker| {
                let book = state.books.get(ticker);
                Security {
                    ticker: ticker.clone(),
                    position: state.positions.get(ticker).copied().unwrap_or(Decimal::ZERO),
                    bid: book.and_then(|b| b.bids.first()).map(|l| l.price),
                    ask: book.and_then(|b| b.asks.first()).map(|l| l.price),
                    last: None,
                }
            })
            .collect())
    }

    async fn get_book(&self, ticker: &str) -> Result<Book> {
        self.state
            .read()
            .await
            .books
            .get(ticker)
            .cloned()
            .ok_or_else(|| TradingError::transient("/securities/book", format!("unknown ticker {}", ticker)))
    }

    /// Newest first, matching the simulator's listing order.
    async fn get_orders(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .rev()
            .filter(|o| o.status == status)
            .cloned()
            .collect())
    }

    async fn get_trader(&self) -> Result<TraderInfo> {
        Ok(TraderInfo {
            trader_id: Some("mock".to_string()),
            first_name: None,
            last_name: None,
            nlv: self.state.read().await.nlv,
        })
    }

    async fn get_limits(&self) -> Result<Vec<RiskLimit>> {
        let state = self.state.read().await;
        let net = state
            .net_override
            .unwrap_or_else(|| state.positions.values().copied().sum());
        let gross = state.positions.values().map(|p| p.abs()).sum();
        Ok(vec![RiskLimit {
            name: Some("LIMIT-CRUDE".to_string()),
            gross,
            net,
            gross_limit: None,
            net_limit: None,
        }])
    }

    async fn get_news(&self) -> Result<Vec<NewsItem>> {
        Ok(self.state.read().await.news.iter().rev().cloned().collect())
    }

    async fn get_leases(&self) -> Result<Vec<Lease>> {
        Ok(self.state.read().await.leases.clone())
    }

    async fn place_order(&self, order: &NewOrder) -> Result<Order> {
        let mut state = self.state.write().await;

        if let Some(nth) = state.fail_order_at {
            if nth <= 1 {
                state.fail_order_at = None;
                return Err(TradingError::transient("/orders", "HTTP 500: injected failure"));
            }
            state.fail_order_at = Some(nth - 1);
        }

        let order_id = self.next_order_id();
        let tick = state.tick;
        let book = state.books.get(&order.ticker);

        let (status, fill_price, filled) = match order.order_type {
            OrderType::Market => {
                let price = book.and_then(|b| match order.action {
                    OrderSide::Buy => b.asks.first().map(|l| l.price),
                    OrderSide::Sell => b.bids.first().map(|l| l.price),
                });
                (OrderStatus::Transacted, price, order.quantity)
            }
            OrderType::Limit => (OrderStatus::Open, None, Decimal::ZERO),
        };

        if status == OrderStatus::Transacted {
            *state.positions.entry(order.ticker.clone()).or_default() +=
                order.action.sign() * order.quantity;
        }

        let placed = Order {
            order_id,
            ticker: order.ticker.clone(),
            order_type: order.order_type,
            quantity: order.quantity,
            action: order.action,
            price: order.price.or(fill_price),
            quantity_filled: filled,
            vwap: fill_price,
            status,
            tick: Some(tick),
        };
        state.orders.push(placed.clone());

        debug!(
            order_id,
            ticker = %order.ticker,
            side = %order.action,
            quantity = %order.quantity,
            status = ?status,
            "Mock order accepted"
        );

        Ok(placed)
    }

    async fn cancel_order(&self, order_id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.order_id == order_id && o.status == OrderStatus::Open)
            .ok_or_else(|| {
                TradingError::transient(format!("/orders/{}", order_id), "HTTP 404: no open order")
            })?;
        order.status = OrderStatus::Cancelled;
        Ok(())
    }

    async fn create_lease(&self, request: &LeaseRequest) -> Result<Lease> {
        let mut state = self.state.write().await;
        state.lease_requests.push(request.clone());

        let ticker = request
            .ticker
            .clone()
            .ok_or_else(|| TradingError::transient("/leases", "HTTP 400: missing ticker"))?;

        let mut usage = None;
        if let (Some(from), Some(quantity)) = (&request.from1, request.quantity1) {
            *state.positions.entry(from.clone()).or_default() -= quantity;
            usage = Some(quantity);
            if state.deliver_transport {
                if let Some(destination) = state.pipelines.get(&ticker).cloned() {
                    *state.positions.entry(destination).or_default() += quantity;
                }
            }
        }

        let lease = Lease {
            id: self.next_lease_id(),
            ticker: ticker.clone(),
            containment_usage: usage,
            next_lease_tick: Some(state.tick + 30),
            start_lease_tick: Some(state.tick),
        };
        state.leases.push(lease.clone());

        info!(lease_id = lease.id, %ticker, "Mock lease created");
        Ok(lease)
    }

    async fn use_lease(&self, lease_id: i64, request: &LeaseRequest) -> Result<Lease> {
        let mut state = self.state.write().await;
        state.lease_requests.push(request.clone());

        let (from, quantity) = match (&request.from1, request.quantity1) {
            (Some(from), Some(quantity)) => (from.clone(), quantity),
            _ => {
                return Err(TradingError::transient(
                    format!("/leases/{}", lease_id),
                    "HTTP 400: missing from1/quantity1",
                ))
            }
        };

        *state.positions.entry(from).or_default() -= quantity;
        let lease = state
            .leases
            .iter_mut()
            .find(|l| l.id == lease_id)
            .ok_or_else(|| TradingError::transient(format!("/leases/{}", lease_id), "HTTP 404"))?;
        lease.containment_usage = Some(lease.containment_usage.unwrap_or_default() + quantity);
        Ok(lease.clone())
    }

    async fn close_lease(&self, lease_id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.leases.len();
        state.leases.retain(|l| l.id != lease_id);
        if state.leases.len() == before {
            return Err(TradingError::transient(format!("/leases/{}", lease_id), "HTTP 404"));
        }
        Ok(())
    }
}
