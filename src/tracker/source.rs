//! External collaborators trackers read from.
//!
//! [`PayloadFetcher`] retrieves raw data source payloads; [`ChainSource`]
//! answers questions about on-chain state. Neither is implemented against a
//! live node here: [`HttpFetcher`] covers HTTP data sources and
//! [`StaticChainSource`] serves a JSON snapshot of chain state.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Fetches the raw payload behind a data source URL.
#[async_trait]
pub trait PayloadFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// [`PayloadFetcher`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("valuetrack/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl PayloadFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow::anyhow!("Request to {} timed out after {:?}", url, self.timeout)
            } else if e.is_connect() {
                anyhow::anyhow!("Cannot connect to {}", url)
            } else {
                anyhow::anyhow!("Failed to send request to {}: {}", url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("{} answered with status {}", url, status));
        }

        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read body from {}", url))?;

        Ok(body.to_vec())
    }
}

/// The request currently being mined on chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentRequest {
    pub challenge: String,
    pub request_id: u64,
    pub difficulty: u64,
    /// Data source URL for the request.
    pub query_url: String,
    /// Path into the query payload.
    #[serde(default)]
    pub query_args: Vec<String>,
    pub granularity: u64,
    pub total_tip: u64,
}

/// A value submitted on chain for a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedValue {
    pub request_id: u64,
    pub value: f64,
    pub timestamp: u64,
    /// Submitting miner.
    #[serde(default)]
    pub miner: String,
}

/// Read-only view of on-chain state.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Native token balance of the mining account.
    async fn balance(&self) -> Result<f64>;

    /// Tribute token balance of the mining account.
    async fn tribute_balance(&self) -> Result<f64>;

    async fn gas_price(&self) -> Result<f64>;

    /// Staking/dispute status code of the mining account.
    async fn dispute_status(&self) -> Result<u64>;

    async fn current_request(&self) -> Result<CurrentRequest>;

    /// Ids of the `n` most tipped requests, highest first.
    async fn top_requests(&self, n: usize) -> Result<Vec<u64>>;

    /// Values recently submitted by miners.
    async fn recent_values(&self) -> Result<Vec<SubmittedValue>>;
}

/// [`ChainSource`] backed by a fixed snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticChainSource {
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub tribute_balance: f64,
    #[serde(default)]
    pub gas_price: f64,
    #[serde(default)]
    pub dispute_status: u64,
    #[serde(default)]
    pub current_request: CurrentRequest,
    /// Request ids ordered by tip, highest first.
    #[serde(default)]
    pub top_requests: Vec<u64>,
    #[serde(default)]
    pub recent_values: Vec<SubmittedValue>,
}

impl StaticChainSource {
    /// Load a snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read chain snapshot: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse chain snapshot: {}", path.display()))
    }
}

#[async_trait]
impl ChainSource for StaticChainSource {
    async fn balance(&self) -> Result<f64> {
        Ok(self.balance)
    }

    async fn tribute_balance(&self) -> Result<f64> {
        Ok(self.tribute_balance)
    }

    async fn gas_price(&self) -> Result<f64> {
        Ok(self.gas_price)
    }

    async fn dispute_status(&self) -> Result<u64> {
        Ok(self.dispute_status)
    }

    async fn current_request(&self) -> Result<CurrentRequest> {
        Ok(self.current_request.clone())
    }

    async fn top_requests(&self, n: usize) -> Result<Vec<u64>> {
        Ok(self.top_requests.iter().take(n).copied().collect())
    }

    async fn recent_values(&self) -> Result<Vec<SubmittedValue>> {
        Ok(self.recent_values.clone())
    }
}
