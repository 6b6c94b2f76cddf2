//! Alpaca REST API client
//!
//! HTTP client for Alpaca's trading and market-data APIs with:
//! - Per-request timeout
//! - Bounded retry with exponential backoff on rate limits and timeouts
//! - Typed errors instead of panics
//!
//! # Example
//! ```no_run
//! use breakout_scanner::broker::{AlpacaClient, Broker, Credentials};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let client = AlpacaClient::new(Credentials::from_env()?)?;
//!     let clock = client.clock().await?;
//!     println!("Market open: {}", clock.is_open);
//!     Ok(())
//! }
//! ```

use anyhow::Context;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::error::{BrokerError, BrokerResult};
use super::retry::RetryPolicy;
use super::types::{
    AccountInfo, BarsResponse, ClockInfo, OrderAck, OrderRequest, PositionInfo, SnapshotInfo,
};
use super::Broker;
use crate::orders::BracketOrder;
use crate::types::{Bar, Clock, Snapshot};

/// Paper-trading endpoint
pub const PAPER_TRADING_URL: &str = "https://paper-api.alpaca.markets";

/// Live-trading endpoint
pub const LIVE_TRADING_URL: &str = "https://api.alpaca.markets";

/// Market-data endpoint
pub const DATA_URL: &str = "https://data.alpaca.markets";

const KEY_HEADER: &str = "APCA-API-KEY-ID";
const SECRET_HEADER: &str = "APCA-API-SECRET-KEY";

/// Query for the latest `limit` bars. Without `sort=desc` the API starts at
/// the beginning of the day and returns the earliest bars.
fn bars_query(timeframe: &str, limit: usize) -> [(&'static str, String); 3] {
    [
        ("timeframe", timeframe.to_string()),
        ("limit", limit.to_string()),
        ("sort", "desc".to_string()),
    ]
}

/// Newest-first page from the API, flipped to oldest first
fn oldest_first(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.reverse();
    bars
}

/// API key pair
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Load from `APCA_API_KEY_ID` and `APCA_API_SECRET_KEY`
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("APCA_API_KEY_ID").context("APCA_API_KEY_ID is not set")?;
        let api_secret =
            std::env::var("APCA_API_SECRET_KEY").context("APCA_API_SECRET_KEY is not set")?;
        Ok(Self::new(api_key, api_secret))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .finish()
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub trading_base_url: String,
    pub data_base_url: String,
    /// Per-attempt request timeout
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            trading_base_url: PAPER_TRADING_URL.to_string(),
            data_base_url: DATA_URL.to_string(),
            timeout: Duration::from_secs(20),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_trading_base_url(mut self, url: impl Into<String>) -> Self {
        self.trading_base_url = url.into();
        self
    }

    pub fn with_data_base_url(mut self, url: impl Into<String>) -> Self {
        self.data_base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Alpaca trading + market-data client
#[derive(Debug, Clone)]
pub struct AlpacaClient {
    http: Client,
    credentials: Credentials,
    trading_base_url: String,
    data_base_url: String,
    retry: RetryPolicy,
}

impl AlpacaClient {
    /// Paper-trading client with default settings
    pub fn new(credentials: Credentials) -> BrokerResult<Self> {
        Self::with_config(credentials, ClientConfig::default())
    }

    pub fn with_config(credentials: Credentials, config: ClientConfig) -> BrokerResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            credentials,
            trading_base_url: config.trading_base_url.trim_end_matches('/').to_string(),
            data_base_url: config.data_base_url.trim_end_matches('/').to_string(),
            retry: config.retry,
        })
    }

    fn trading_url(&self, path: &str) -> String {
        format!("{}{}", self.trading_base_url, path)
    }

    fn data_url(&self, path: &str) -> String {
        format!("{}{}", self.data_base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(KEY_HEADER, &self.credentials.api_key)
            .header(SECRET_HEADER, &self.credentials.api_secret)
    }

    /// Map status codes to errors and decode a successful body
    async fn decode<T: DeserializeOwned>(response: Response) -> BrokerResult<T> {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(BrokerError::RateLimited);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(BrokerError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> BrokerResult<T> {
        debug!("GET {}", url);
        self.retry
            .execute(move || async move {
                let response = self
                    .authorized(self.http.get(url))
                    .query(query)
                    .send()
                    .await?;
                Self::decode(response).await
            })
            .await
    }

    async fn post_json<B, T>(&self, url: &str, body: &B) -> BrokerResult<T>
    where
        B: serde::Serialize,
        T: DeserializeOwned,
    {
        debug!("POST {}", url);
        // A timed-out POST may still have been accepted, so only 429 is retried
        self.retry
            .execute_if(
                move || async move {
                    let response = self.authorized(self.http.post(url)).json(body).send().await?;
                    Self::decode(response).await
                },
                |e| matches!(e, BrokerError::RateLimited),
            )
            .await
    }
}

impl Broker for AlpacaClient {
    async fn clock(&self) -> BrokerResult<Clock> {
        let info: ClockInfo = self.get_json(&self.trading_url("/v2/clock"), &[]).await?;
        Ok(info.into())
    }

    async fn account(&self) -> BrokerResult<AccountInfo> {
        self.get_json(&self.trading_url("/v2/account"), &[]).await
    }

    async fn positions(&self) -> BrokerResult<Vec<PositionInfo>> {
        self.get_json(&self.trading_url("/v2/positions"), &[]).await
    }

    async fn bars(&self, symbol: &str, timeframe: &str, limit: usize) -> BrokerResult<Vec<Bar>> {
        let url = self.data_url(&format!("/v2/stocks/{}/bars", symbol));
        let query = bars_query(timeframe, limit);
        let response: BarsResponse = self.get_json(&url, &query).await?;
        response
            .bars
            .map(oldest_first)
            .ok_or(BrokerError::MissingField("bars"))
    }

    async fn snapshot(&self, symbol: &str) -> BrokerResult<Snapshot> {
        let url = self.data_url(&format!("/v2/stocks/{}/snapshot", symbol));
        let info: SnapshotInfo = self.get_json(&url, &[]).await?;
        Ok(info.into())
    }

    async fn place_bracket_order(&self, order: &BracketOrder) -> BrokerResult<OrderAck> {
        let request = OrderRequest::from(order);
        self.post_json(&self.trading_url("/v2/orders"), &request)
            .await
    }
}
