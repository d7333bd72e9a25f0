//! RIT REST API client.

use crate::config::ApiConfig;
use crate::error::{Result, TradingError};
use crate::exchange::traits::TradingGateway;
use crate::exchange::types::*;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

const API_KEY_HEADER: &str = "X-API-Key";

/// HTTP client for the simulator's REST API.
pub struct RitClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl RitClient {
    /// Create a new client from configuration.
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the API key, send, reject non-2xx and decode the JSON body.
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, endpoint: &str) -> Result<T> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| TradingError::transient(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TradingError::transient(
                endpoint,
                format!("HTTP {}: {}", status, body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| TradingError::transient(endpoint, format!("malformed response: {}", e)))
    }

    /// Like `send_json` but ignores the body.
    async fn send_empty(&self, request: RequestBuilder, endpoint: &str) -> Result<()> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| TradingError::transient(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TradingError::transient(
                endpoint,
                format!("HTTP {}: {}", status, body),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TradingGateway for RitClient {
    // ==================== Market Data ====================

    #[instrument(skip(self))]
    async fn get_tick(&self) -> Result<i64> {
        let case: CaseInfo = self
            .send_json(self.http.get(self.url("/case")), "/case")
            .await?;
        Ok(case.tick)
    }

    #[instrument(skip(self))]
    async fn get_securities(&self) -> Result<Vec<Security>> {
        self.send_json(self.http.get(self.url("/securities")), "/securities")
            .await
    }

    #[instrument(skip(self))]
    async fn get_book(&self, ticker: &str) -> Result<Book> {
        let request = self
            .http
            .get(self.url("/securities/book"))
            .query(&[("ticker", ticker)]);
        self.send_json(request, "/securities/book").await
    }

    #[instrument(skip(self))]
    async fn get_orders(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let request = self
            .http
            .get(self.url("/orders"))
            .query(&[("status", status.as_str())]);
        self.send_json(request, "/orders").await
    }

    #[instrument(skip(self))]
    async fn get_trader(&self) -> Result<TraderInfo> {
        self.send_json(self.http.get(self.url("/trader")), "/trader")
            .await
    }

    #[instrument(skip(self))]
    async fn get_limits(&self) -> Result<Vec<RiskLimit>> {
        self.send_json(self.http.get(self.url("/limits")), "/limits")
            .await
    }

    #[instrument(skip(self))]
    async fn get_news(&self) -> Result<Vec<NewsItem>> {
        self.send_json(self.http.get(self.url("/news")), "/news")
            .await
    }

    #[instrument(skip(self))]
    async fn get_leases(&self) -> Result<Vec<Lease>> {
        self.send_json(self.http.get(self.url("/leases")), "/leases")
            .await
    }

    // ==================== Orders & Leases ====================

    #[instrument(skip(self))]
    async fn place_order(&self, order: &NewOrder) -> Result<Order> {
        debug!("Placing order: {:?}", order);
        let request = self.http.post(self.url("/orders")).query(order);
        self.send_json(request, "/orders").await
    }

    #[instrument(skip(self))]
    async fn cancel_order(&self, order_id: i64) -> Result<()> {
        let path = format!("/orders/{}", order_id);
        self.send_empty(self.http.delete(self.url(&path)), &path)
            .await
    }

    #[instrument(skip(self))]
    async fn create_lease(&self, request: &LeaseRequest) -> Result<Lease> {
        let builder = self.http.post(self.url("/leases")).query(request);
        self.send_json(builder, "/leases").await
    }

    #[instrument(skip(self))]
    async fn use_lease(&self, lease_id: i64, request: &LeaseRequest) -> Result<Lease> {
        let path = format!("/leases/{}", lease_id);
        let builder = self.http.post(self.url(&path)).query(request);
        self.send_json(builder, &path).await
    }

    #[instrument(skip(self))]
    async fn close_lease(&self, lease_id: i64) -> Result<()> {
        let path = format!("/leases/{}", lease_id);
        self.send_empty(self.http.delete(self.url(&path)), &path)
            .await
    }
}
