//! Flags on-chain values that stray too far from our own.

use super::{Tracker, TrackerContext};
use crate::models::PrespecifiedRequest;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

/// Status key the flagged values are recorded under.
pub const DISPUTE_CANDIDATES_KEY: &str = "disputeCandidates";

/// A submitted value that deviates from the local reportable value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisputeCandidate {
    pub request_id: u64,
    pub timestamp: u64,
    pub miner: String,
    pub submitted: f64,
    pub expected: f64,
    pub deviation: f64,
}

/// Compares recently submitted values against each configured request's
/// reportable value.
#[derive(Debug, Clone)]
pub struct DisputeChecker {
    requests: Vec<PrespecifiedRequest>,
    threshold: f64,
}

impl DisputeChecker {
    /// `threshold` is the tolerated relative deviation, e.g. 0.1 for 10%.
    pub fn new(requests: Vec<PrespecifiedRequest>, threshold: f64) -> Self {
        Self {
            requests,
            threshold,
        }
    }

    fn request(&self, request_id: u64) -> Option<&PrespecifiedRequest> {
        self.requests.iter().find(|r| r.request_id == request_id)
    }
}

/// Relative deviation of `submitted` from `expected`. Falls back to the
/// absolute difference when `expected` is zero.
fn deviation(submitted: f64, expected: f64) -> f64 {
    let diff = (submitted - expected).abs();
    if expected == 0.0 {
        diff
    } else {
        diff / expected.abs()
    }
}

#[async_trait]
impl Tracker for DisputeChecker {
    fn name(&self) -> String {
        "disputeChecker".to_string()
    }

    async fn exec(&self, ctx: &TrackerContext) -> Result<()> {
        let submitted = ctx.chain("disputeChecker")?.recent_values().await?;
        let now = Utc::now();
        let mut candidates = Vec::new();

        for value in submitted {
            let Some(request) = self.request(value.request_id) else {
                continue;
            };
            let Some(expected) = request.processor().value(request, ctx.store.as_ref(), now)
            else {
                debug!(
                    "Request {}: no reportable value yet, skipping dispute check",
                    value.request_id
                );
                continue;
            };

            let deviation = deviation(value.value, expected);
            if deviation > self.threshold {
                warn!(
                    "Request {}: miner {} submitted {} at {}, expected {} ({:.1}% off)",
                    value.request_id,
                    value.miner,
                    value.value,
                    value.timestamp,
                    expected,
                    deviation * 100.0
                );
                candidates.push(DisputeCandidate {
                    request_id: value.request_id,
                    timestamp: value.timestamp,
                    miner: value.miner,
                    submitted: value.value,
                    expected,
                    deviation,
                });
            }
        }

        ctx.store
            .set_status(DISPUTE_CANDIDATES_KEY, json!(candidates));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimedSample;
    use crate::processor::ReportingMethod;
    use crate::store::ValueStore;
    use crate::tracker::testutil::{context, MapFetcher};
    use crate::tracker::{StaticChainSource, SubmittedValue};
    use std::sync::Arc;
    use std::time::Duration;

    fn submitted(request_id: u64, value: f64, miner: &str) -> SubmittedValue {
        SubmittedValue {
            request_id,
            value,
            timestamp: 1_700_000_000,
            miner: miner.to_string(),
        }
    }

    #[test]
    fn test_deviation() {
        assert_eq!(deviation(110.0, 100.0), 0.1);
        assert_eq!(deviation(90.0, -100.0), 1.9);
        assert_eq!(deviation(3.0, 0.0), 3.0);
    }

    #[tokio::test]
    async fn test_flags_outliers_only() {
        let chain = StaticChainSource {
            recent_values: vec![
                submitted(1, 105.0, "honest"),
                submitted(1, 150.0, "outlier"),
                submitted(2, 1.0, "no-local-value"),
                submitted(99, 1.0, "untracked"),
            ],
            ..Default::default()
        };
        let ctx = context(MapFetcher::default()).with_chain(Arc::new(chain));
        ctx.store.commit(1, TimedSample::now(100.0));

        let cycle = Duration::from_secs(60);
        let requests = vec![
            PrespecifiedRequest::new(1, 1, ReportingMethod::Value, vec![], cycle),
            PrespecifiedRequest::new(2, 1, ReportingMethod::DayAverage, vec![], cycle),
        ];

        DisputeChecker::new(requests, 0.1).exec(&ctx).await.unwrap();

        let flagged = ctx.store.status(DISPUTE_CANDIDATES_KEY).unwrap().value;
        let flagged = flagged.as_array().unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0]["miner"], json!("outlier"));
        assert_eq!(flagged[0]["expected"], json!(100.0));
    }
}
