//! Upstream integrations.
//!
//! Defines the traits the monitor talks to and provides implementations for:
//! - Jupiter: reference quote for each pair
//! - Solana JSON-RPC: node health and current slot
//! - Raydium: mint price map, used as a real comparison venue
//!
//! All HTTP traffic goes through one [`HttpGate`]: a shared `reqwest`
//! client with a request timeout plus a semaphore capping in-flight
//! requests.

pub mod jupiter;
pub mod raydium;
pub mod solana_rpc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::config::UpstreamConfig;
use crate::types::{Quote, SpreadNetError, TradingPair, VenuePrice};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Source of the reference quote for a pair.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Quote `amount` raw input units of `pair`.
    ///
    /// Network errors, non-success statuses and malformed payloads all come
    /// back as transient [`SpreadNetError`]s.
    async fn fetch_quote(&self, pair: &TradingPair, amount: u64) -> Result<Quote, SpreadNetError>;

    /// Source name for logging and identification.
    fn name(&self) -> &str;
}

/// Liveness probe for the chain node.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainProbe: Send + Sync {
    /// Whether the node reports itself healthy.
    async fn health(&self) -> Result<bool, SpreadNetError>;

    /// Current slot as seen by the node.
    async fn slot(&self) -> Result<u64, SpreadNetError>;
}

/// Produces the prices the reference quote is compared against.
///
/// The synthetic implementation multiplies the reference by fixed factors;
/// the venue implementation fetches prices from another aggregator. The
/// monitor does not know which one it holds.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ComparisonPriceProvider: Send + Sync {
    async fn comparison_prices(
        &self,
        pair: &TradingPair,
        quote: &Quote,
    ) -> Result<Vec<VenuePrice>, SpreadNetError>;

    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// HTTP gate
// ---------------------------------------------------------------------------

/// Shared HTTP client with a bounded number of concurrent requests.
#[derive(Clone)]
pub struct HttpGate {
    http: Client,
    permits: Arc<Semaphore>,
    max_connections: usize,
}

impl HttpGate {
    /// Build the client. Failure here is fatal at startup.
    pub fn new(cfg: &UpstreamConfig) -> Result<Self, SpreadNetError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .pool_max_idle_per_host(cfg.max_connections)
            .user_agent(cfg.user_agent.clone())
            .build()
            .map_err(|e| SpreadNetError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            permits: Arc::new(Semaphore::new(cfg.max_connections)),
            max_connections: cfg.max_connections,
        })
    }

    /// GET `url` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: &str,
    ) -> Result<T, SpreadNetError> {
        self.execute(endpoint, self.http.get(url)).await
    }

    /// POST `body` as JSON to `url` and decode the JSON response.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: &str,
        body: &B,
    ) -> Result<T, SpreadNetError> {
        self.execute(endpoint, self.http.post(url).json(body)).await
    }

    /// Requests currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.max_connections - self.permits.available_permits()
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, SpreadNetError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| SpreadNetError::Network {
                endpoint: endpoint.to_string(),
                message: "connection pool closed".to_string(),
            })?;

        let resp = request.send().await.map_err(|e| classify(endpoint, e))?;

        let status = resp.status();
        if !status.is_success() {
            debug!(endpoint, status = status.as_u16(), "Upstream returned error status");
            return Err(SpreadNetError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|e| classify(endpoint, e))?;
        serde_json::from_str(&body).map_err(|e| SpreadNetError::malformed(endpoint, e.to_string()))
    }
}

/// Map a transport error onto the transient error taxonomy.
fn classify(endpoint: &str, err: reqwest::Error) -> SpreadNetError {
    if err.is_timeout() {
        SpreadNetError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else {
        SpreadNetError::Network {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
