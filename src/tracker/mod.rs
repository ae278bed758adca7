//! Trackers and the tracker factory.
//!
//! A tracker is one job an external scheduler runs every cycle. Most
//! trackers read a single quantity from the chain and record it; PSR
//! trackers fetch their request's data sources and commit the processed
//! value. [`create_tracker`] maps a configured name to tracker instances.

pub mod dispute;
pub mod psr;
pub mod source;
pub mod status;

pub use dispute::DisputeChecker;
pub use psr::{PsrTracker, RequestDataTracker};
pub use source::{
    ChainSource, CurrentRequest, HttpFetcher, PayloadFetcher, StaticChainSource, SubmittedValue,
};
pub use status::{ChainStatusTracker, StatusKind, TestTracker};

use crate::config::Config;
use crate::error::ConfigError;
use crate::store::MemoryStore;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// One periodically executed job.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> String;

    /// Run one cycle.
    async fn exec(&self, ctx: &TrackerContext) -> Result<()>;
}

/// Everything a tracker cycle may touch.
#[derive(Clone)]
pub struct TrackerContext {
    pub store: Arc<MemoryStore>,
    pub fetcher: Arc<dyn PayloadFetcher>,
    pub chain: Option<Arc<dyn ChainSource>>,
}

impl TrackerContext {
    pub fn new(store: Arc<MemoryStore>, fetcher: Arc<dyn PayloadFetcher>) -> Self {
        Self {
            store,
            fetcher,
            chain: None,
        }
    }

    pub fn with_chain(mut self, chain: Arc<dyn ChainSource>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// The chain source, or an error naming the tracker that needed it.
    pub fn chain(&self, tracker: &str) -> Result<&dyn ChainSource> {
        self.chain.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "Tracker {} needs a chain source but none is configured",
                tracker
            )
        })
    }
}

/// Every tracker name the factory knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerKind {
    Test,
    Balance,
    CurrentVariables,
    DisputeStatus,
    Gas,
    Top50,
    TributeBalance,
    FetchData,
    Psr,
    DisputeChecker,
}

impl TrackerKind {
    pub const ALL: [TrackerKind; 10] = [
        TrackerKind::Test,
        TrackerKind::Balance,
        TrackerKind::CurrentVariables,
        TrackerKind::DisputeStatus,
        TrackerKind::Gas,
        TrackerKind::Top50,
        TrackerKind::TributeBalance,
        TrackerKind::FetchData,
        TrackerKind::Psr,
        TrackerKind::DisputeChecker,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerKind::Test => "test",
            TrackerKind::Balance => "balance",
            TrackerKind::CurrentVariables => "currentVariables",
            TrackerKind::DisputeStatus => "disputeStatus",
            TrackerKind::Gas => "gas",
            TrackerKind::Top50 => "top50",
            TrackerKind::TributeBalance => "tributeBalance",
            TrackerKind::FetchData => "fetchData",
            TrackerKind::Psr => "psr",
            TrackerKind::DisputeChecker => "disputeChecker",
        }
    }
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TrackerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrackerKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownTracker(s.to_string()))
    }
}

/// Create the tracker instances registered under `name`.
///
/// Names are case-sensitive. `psr` expands to one tracker per configured
/// pre-specified request; every other name yields exactly one tracker.
pub fn create_tracker(name: &str, config: &Config) -> Result<Vec<Box<dyn Tracker>>, ConfigError> {
    let kind: TrackerKind = name.parse()?;

    let trackers: Vec<Box<dyn Tracker>> = match kind {
        TrackerKind::Test => vec![Box::new(TestTracker)],
        TrackerKind::Balance => vec![Box::new(ChainStatusTracker::new(StatusKind::Balance))],
        TrackerKind::CurrentVariables => {
            vec![Box::new(ChainStatusTracker::new(StatusKind::CurrentVariables))]
        }
        TrackerKind::DisputeStatus => {
            vec![Box::new(ChainStatusTracker::new(StatusKind::DisputeStatus))]
        }
        TrackerKind::Gas => vec![Box::new(ChainStatusTracker::new(StatusKind::GasPrice))],
        TrackerKind::Top50 => vec![Box::new(ChainStatusTracker::new(StatusKind::Top50))],
        TrackerKind::TributeBalance => {
            vec![Box::new(ChainStatusTracker::new(StatusKind::TributeBalance))]
        }
        TrackerKind::FetchData => vec![Box::new(RequestDataTracker::new(config.tracker_cycle()))],
        TrackerKind::Psr => build_psr_trackers(config)?,
        TrackerKind::DisputeChecker => vec![Box::new(DisputeChecker::new(
            config.prespecified_requests(),
            config.dispute.deviation_threshold,
        ))],
    };

    debug!("Tracker '{}' built {} job(s)", name, trackers.len());
    Ok(trackers)
}

/// One [`PsrTracker`] per configured pre-specified request.
pub fn build_psr_trackers(config: &Config) -> Result<Vec<Box<dyn Tracker>>, ConfigError> {
    let requests = config.prespecified_requests();
    if requests.is_empty() {
        return Err(ConfigError::NoPrespecifiedRequests);
    }

    Ok(requests
        .into_iter()
        .map(|request| Box::new(PsrTracker::new(request)) as Box<dyn Tracker>)
        .collect())
}

/// Create the trackers for every configured name, failing on the first
/// unknown one.
pub fn build_trackers(
    names: &[String],
    config: &Config,
) -> Result<Vec<Box<dyn Tracker>>, ConfigError> {
    let mut trackers = Vec::new();
    for name in names {
        trackers.extend(create_tracker(name, config)?);
    }
    Ok(trackers)
}

/// Outcome of one tracker's cycle.
#[derive(Debug)]
pub struct CycleOutcome {
    pub tracker: String,
    pub result: Result<()>,
}

/// Run one cycle of every tracker concurrently.
///
/// A failing tracker does not stop the others; every outcome is returned.
pub async fn run_cycle(trackers: &[Box<dyn Tracker>], ctx: &TrackerContext) -> Vec<CycleOutcome> {
    let runs = trackers.iter().map(|tracker| async move {
        let result = tracker.exec(ctx).await;
        if let Err(ref e) = result {
            warn!("Tracker {} failed: {:#}", tracker.name(), e);
        }
        CycleOutcome {
            tracker: tracker.name(),
            result,
        }
    });

    join_all(runs).await
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use std::collections::HashMap;

    /// Serves canned payloads; unknown URLs fail like an unreachable host.
    #[derive(Debug, Default)]
    pub struct MapFetcher {
        pub payloads: HashMap<String, Vec<u8>>,
    }

    impl MapFetcher {
        pub fn with(mut self, url: &str, body: &str) -> Self {
            self.payloads.insert(url.to_string(), body.as_bytes().to_vec());
            self
        }
    }

    #[async_trait]
    impl PayloadFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.payloads
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("Cannot connect to {}", url))
        }
    }

    pub fn context(fetcher: MapFetcher) -> TrackerContext {
        TrackerContext::new(Arc::new(MemoryStore::new()), Arc::new(fetcher))
    }
}
