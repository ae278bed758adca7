//! Trackers that record a single chain reading.

use super::{Tracker, TrackerContext};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

/// Number of requests the top-N tracker records.
pub const TOP_REQUESTS: usize = 50;

/// What a [`ChainStatusTracker`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Balance,
    TributeBalance,
    GasPrice,
    DisputeStatus,
    CurrentVariables,
    Top50,
}

impl StatusKind {
    /// Key the reading is stored under.
    pub fn key(&self) -> &'static str {
        match self {
            StatusKind::Balance => "balance",
            StatusKind::TributeBalance => "tributeBalance",
            StatusKind::GasPrice => "gasPrice",
            StatusKind::DisputeStatus => "disputeStatus",
            StatusKind::CurrentVariables => "currentVariables",
            StatusKind::Top50 => "top50",
        }
    }
}

/// Reads one quantity from the chain and records it in the status board.
#[derive(Debug, Clone, Copy)]
pub struct ChainStatusTracker {
    kind: StatusKind,
}

impl ChainStatusTracker {
    pub fn new(kind: StatusKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> StatusKind {
        self.kind
    }
}

#[async_trait]
impl Tracker for ChainStatusTracker {
    fn name(&self) -> String {
        self.kind.key().to_string()
    }

    async fn exec(&self, ctx: &TrackerContext) -> Result<()> {
        let chain = ctx.chain(self.kind.key())?;

        let reading: Value = match self.kind {
            StatusKind::Balance => json!(chain.balance().await?),
            StatusKind::TributeBalance => json!(chain.tribute_balance().await?),
            StatusKind::GasPrice => json!(chain.gas_price().await?),
            StatusKind::DisputeStatus => json!(chain.dispute_status().await?),
            StatusKind::CurrentVariables => serde_json::to_value(chain.current_request().await?)
                .context("Failed to encode current request")?,
            StatusKind::Top50 => json!(chain.top_requests(TOP_REQUESTS).await?),
        };

        info!("{} = {}", self.kind.key(), reading);
        ctx.store.set_status(self.kind.key(), reading);
        Ok(())
    }
}

/// Records a heartbeat so operators can see trackers are being run.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestTracker;

#[async_trait]
impl Tracker for TestTracker {
    fn name(&self) -> String {
        "test".to_string()
    }

    async fn exec(&self, ctx: &TrackerContext) -> Result<()> {
        ctx.store
            .set_status("heartbeat", json!(Utc::now().to_rfc3339()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::testutil::{context, MapFetcher};
    use crate::tracker::{CurrentRequest, StaticChainSource};
    use std::sync::Arc;

    fn chain() -> StaticChainSource {
        StaticChainSource {
            balance: 1.25,
            gas_price: 30.0,
            dispute_status: 1,
            top_requests: (1..=60).collect(),
            current_request: CurrentRequest {
                request_id: 2,
                challenge: "0xfeed".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_records_readings() {
        let ctx = context(MapFetcher::default()).with_chain(Arc::new(chain()));

        for kind in [
            StatusKind::Balance,
            StatusKind::GasPrice,
            StatusKind::DisputeStatus,
            StatusKind::CurrentVariables,
            StatusKind::Top50,
        ] {
            ChainStatusTracker::new(kind).exec(&ctx).await.unwrap();
        }

        assert_eq!(ctx.store.status("balance").unwrap().value, json!(1.25));
        assert_eq!(ctx.store.status("gasPrice").unwrap().value, json!(30.0));
        assert_eq!(ctx.store.status("disputeStatus").unwrap().value, json!(1));

        let current = ctx.store.status("currentVariables").unwrap().value;
        assert_eq!(current["request_id"], json!(2));
        assert_eq!(current["challenge"], json!("0xfeed"));

        let top = ctx.store.status("top50").unwrap().value;
        assert_eq!(top.as_array().map(Vec::len), Some(TOP_REQUESTS));
    }

    #[tokio::test]
    async fn test_fails_without_chain() {
        let ctx = context(MapFetcher::default());
        let err = ChainStatusTracker::new(StatusKind::TributeBalance)
            .exec(&ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("tributeBalance"));
        assert!(ctx.store.status("tributeBalance").is_none());
    }

    #[tokio::test]
    async fn test_heartbeat() {
        let ctx = context(MapFetcher::default());
        TestTracker.exec(&ctx).await.unwrap();
        assert!(ctx.store.status("heartbeat").is_some());
    }
}
