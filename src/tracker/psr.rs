//! Trackers that fetch data sources and commit processed values.

use super::{Tracker, TrackerContext};
use crate::models::{DataSource, PrespecifiedRequest, TimedSample};
use crate::processor::ReportingMethod;
use crate::store::ValueStore;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fetches every source of one pre-specified request, runs the request's
/// processor and commits the result.
#[derive(Debug, Clone)]
pub struct PsrTracker {
    request: PrespecifiedRequest,
}

impl PsrTracker {
    pub fn new(request: PrespecifiedRequest) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &PrespecifiedRequest {
        &self.request
    }
}

/// Fetch all sources concurrently. A source that fails yields `None` at its
/// position so payloads stay aligned with argument groups.
pub async fn fetch_payloads(ctx: &TrackerContext, sources: &[DataSource]) -> Vec<Option<Vec<u8>>> {
    let fetches = sources.iter().map(|source| async move {
        match ctx.fetcher.fetch(&source.url).await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!("Fetch failed for {}: {:#}", source.url, e);
                None
            }
        }
    });

    join_all(fetches).await
}

/// Run `request`'s processor over `payloads` and commit the value if any
/// payload parsed. Returns the committed value.
fn process_and_commit(
    ctx: &TrackerContext,
    request: &PrespecifiedRequest,
    payloads: &[Option<Vec<u8>>],
) -> Result<Option<f64>> {
    let aggregate = request.processor().transform(request, payloads)?;
    if !aggregate.has_data() {
        return Ok(None);
    }

    ctx.store
        .commit(request.request_id, TimedSample::now(aggregate.value));
    debug!(
        "Request {}: committed {} from {} of {} sources",
        request.request_id,
        aggregate.value,
        aggregate.samples,
        payloads.len()
    );
    Ok(Some(aggregate.value))
}

#[async_trait]
impl Tracker for PsrTracker {
    fn name(&self) -> String {
        format!("psr:{}", self.request.request_id)
    }

    async fn exec(&self, ctx: &TrackerContext) -> Result<()> {
        let payloads = fetch_payloads(ctx, &self.request.sources).await;
        process_and_commit(ctx, &self.request, &payloads)?;
        Ok(())
    }
}

/// Fetches the data for the request currently being mined on chain.
#[derive(Debug, Clone, Copy)]
pub struct RequestDataTracker {
    cycle: Duration,
}

impl RequestDataTracker {
    pub fn new(cycle: Duration) -> Self {
        Self { cycle }
    }
}

#[async_trait]
impl Tracker for RequestDataTracker {
    fn name(&self) -> String {
        "fetchData".to_string()
    }

    async fn exec(&self, ctx: &TrackerContext) -> Result<()> {
        let current = ctx.chain("fetchData")?.current_request().await?;
        if current.request_id == 0 || current.query_url.is_empty() {
            debug!("No current request to fetch data for");
            return Ok(());
        }

        let request = PrespecifiedRequest::new(
            current.request_id,
            current.granularity.max(1),
            ReportingMethod::Value,
            vec![DataSource {
                url: current.query_url.clone(),
                args: current.query_args.clone(),
            }],
            self.cycle,
        );

        let payloads = fetch_payloads(ctx, &request.sources).await;
        if let Some(value) = process_and_commit(ctx, &request, &payloads)? {
            info!("Request {}: fetched value {}", current.request_id, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::testutil::{context, MapFetcher};
    use crate::tracker::{CurrentRequest, StaticChainSource};
    use std::sync::Arc;

    const HOUR: Duration = Duration::from_secs(3600);

    fn request(method: ReportingMethod, urls: &[&str]) -> PrespecifiedRequest {
        let sources = urls
            .iter()
            .map(|url| DataSource {
                url: url.to_string(),
                args: vec!["price".to_string()],
            })
            .collect();
        PrespecifiedRequest::new(7, 100, method, sources, HOUR)
    }

    #[tokio::test]
    async fn test_psr_commits_median_of_sources() {
        let fetcher = MapFetcher::default()
            .with("https://a", r#"{"price": 1.0}"#)
            .with("https://b", r#"{"price": 4.0}"#)
            .with("https://c", r#"{"price": 2.0}"#);
        let ctx = context(fetcher);
        let tracker = PsrTracker::new(request(
            ReportingMethod::Median,
            &["https://a", "https://b", "https://c"],
        ));

        tracker.exec(&ctx).await.unwrap();

        assert_eq!(ctx.store.latest(7).map(|s| s.value), Some(200.0));
    }

    #[tokio::test]
    async fn test_psr_skips_unreachable_sources() {
        let fetcher = MapFetcher::default()
            .with("https://a", r#"{"price": 3.0}"#)
            .with("https://c", r#"{"price": 5.0}"#);
        let ctx = context(fetcher);
        let tracker = PsrTracker::new(request(
            ReportingMethod::Value,
            &["https://a", "https://down", "https://c"],
        ));

        tracker.exec(&ctx).await.unwrap();

        assert_eq!(ctx.store.latest(7).map(|s| s.value), Some(400.0));
    }

    #[tokio::test]
    async fn test_psr_commits_nothing_when_every_source_fails() {
        let fetcher = MapFetcher::default().with("https://a", "<html>oops</html>");
        let ctx = context(fetcher);
        let tracker = PsrTracker::new(request(
            ReportingMethod::Value,
            &["https://a", "https://down"],
        ));

        tracker.exec(&ctx).await.unwrap();

        assert_eq!(ctx.store.sample_count(7), 0);
    }

    #[tokio::test]
    async fn test_fetch_data_commits_current_request() {
        let fetcher = MapFetcher::default().with("https://eth", r#"{"last": "2500.5"}"#);
        let chain = StaticChainSource {
            current_request: CurrentRequest {
                request_id: 1,
                query_url: "https://eth".to_string(),
                query_args: vec!["last".to_string()],
                granularity: 1000,
                ..Default::default()
            },
            ..Default::default()
        };
        let ctx = context(fetcher).with_chain(Arc::new(chain));

        RequestDataTracker::new(HOUR).exec(&ctx).await.unwrap();

        assert_eq!(ctx.store.latest(1).map(|s| s.value), Some(2_500_500.0));
    }

    #[tokio::test]
    async fn test_fetch_data_without_current_request() {
        let ctx = context(MapFetcher::default()).with_chain(Arc::new(StaticChainSource::default()));
        RequestDataTracker::new(HOUR).exec(&ctx).await.unwrap();
        assert_eq!(ctx.store.sample_count(0), 0);
    }
}
