//! Value processors.
//!
//! A value processor decides how a pre-specified request turns freshly
//! fetched payloads into one number (`transform`) and what number is
//! currently reportable from the stored history (`value`). Each request
//! picks one through its `transformation` tag:
//!
//! | tag        | processor                  |
//! |------------|----------------------------|
//! | `""`       | [`DefaultProcessor`]       |
//! | `"value"`  | [`DefaultProcessor`]       |
//! | `"median"` | [`MedianProcessor`]        |
//! | `"dayAvg"` | [`TimeAverageProcessor`]   |

pub mod stats;

use crate::error::ConfigError;
use crate::models::{Aggregate, PrespecifiedRequest};
use crate::payload::parse_payload;
use crate::store::ValueStore;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

pub use stats::{exp_time_weighted_mean, exp_weight, mean, median};

/// Trailing window the day-average processor reports over.
pub const DAY_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Fraction of the expected samples that must be present before a
/// day-average is reported.
pub const QUORUM_RATIO: f64 = 0.6;

/// Combines payloads into values and reports values from history.
pub trait ValueProcessor: fmt::Debug + Send + Sync {
    /// Combine one cycle's payloads. `None` entries are sources that did not
    /// answer; they are skipped, as are payloads that fail to parse.
    fn transform(
        &self,
        request: &PrespecifiedRequest,
        payloads: &[Option<Vec<u8>>],
    ) -> Result<Aggregate>;

    /// The currently reportable value, or `None` if nothing should be
    /// reported yet.
    fn value(
        &self,
        request: &PrespecifiedRequest,
        store: &dyn ValueStore,
        now: DateTime<Utc>,
    ) -> Option<f64>;
}

/// Reporting method tag of a pre-specified request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReportingMethod {
    /// Mean of fresh payloads, latest stored value reported.
    #[default]
    Value,
    /// Median of fresh payloads, latest stored value reported.
    Median,
    /// Mean of fresh payloads, 24 hour average reported.
    DayAverage,
}

impl ReportingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportingMethod::Value => "value",
            ReportingMethod::Median => "median",
            ReportingMethod::DayAverage => "dayAvg",
        }
    }

    /// Build the processor for this method. `cycle` is the tracker sampling
    /// interval the day-average quorum is measured against.
    pub fn processor(&self, cycle: Duration) -> Arc<dyn ValueProcessor> {
        match self {
            ReportingMethod::Value => Arc::new(DefaultProcessor),
            ReportingMethod::Median => Arc::new(MedianProcessor::default()),
            ReportingMethod::DayAverage => Arc::new(TimeAverageProcessor::new(cycle)),
        }
    }
}

impl fmt::Display for ReportingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReportingMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "median" => Ok(ReportingMethod::Median),
            "value" | "" => Ok(ReportingMethod::Value),
            "dayAvg" => Ok(ReportingMethod::DayAverage),
            other => Err(ConfigError::UnknownTransformation(other.to_string())),
        }
    }
}

impl TryFrom<String> for ReportingMethod {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ReportingMethod> for String {
    fn from(method: ReportingMethod) -> Self {
        method.as_str().to_string()
    }
}

/// Parse every usable payload of a cycle.
///
/// Missing payloads, payloads without a matching argument group and
/// payloads that fail to parse are dropped.
pub fn parse_payloads(request: &PrespecifiedRequest, payloads: &[Option<Vec<u8>>]) -> Vec<f64> {
    let mut vals = Vec::with_capacity(payloads.len());

    for (i, payload) in payloads.iter().enumerate() {
        let Some(raw) = payload else {
            continue;
        };
        let Some(args) = request.arg_group(i) else {
            debug!(
                "Request {}: payload {} has no argument group, skipping",
                request.request_id, i
            );
            continue;
        };
        match parse_payload(raw, request.granularity, args) {
            Ok(v) => vals.push(v),
            Err(e) => debug!(
                "Request {}: skipping payload {}: {}",
                request.request_id, i, e
            ),
        }
    }

    if vals.is_empty() {
        error!(
            "No successful api hits, no value stored for id {}",
            request.request_id
        );
    }

    vals
}

/// Mean of fresh payloads; reports the latest stored sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProcessor;

impl ValueProcessor for DefaultProcessor {
    fn transform(
        &self,
        request: &PrespecifiedRequest,
        payloads: &[Option<Vec<u8>>],
    ) -> Result<Aggregate> {
        let vals = parse_payloads(request, payloads);
        Ok(Aggregate::new(mean(&vals), vals.len()))
    }

    fn value(
        &self,
        request: &PrespecifiedRequest,
        store: &dyn ValueStore,
        _now: DateTime<Utc>,
    ) -> Option<f64> {
        store.latest(request.request_id).map(|s| s.value)
    }
}

/// Median of fresh payloads; reporting is the default one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MedianProcessor {
    inner: DefaultProcessor,
}

impl ValueProcessor for MedianProcessor {
    fn transform(
        &self,
        request: &PrespecifiedRequest,
        payloads: &[Option<Vec<u8>>],
    ) -> Result<Aggregate> {
        let mut vals = parse_payloads(request, payloads);
        Ok(Aggregate::new(median(&mut vals), vals.len()))
    }

    fn value(
        &self,
        request: &PrespecifiedRequest,
        store: &dyn ValueStore,
        now: DateTime<Utc>,
    ) -> Option<f64> {
        self.inner.value(request, store, now)
    }
}

/// Outcome of the day-average quorum check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quorum {
    /// Enough samples; carries the window mean.
    Ready(f64),
    /// Not enough samples yet.
    Pending {
        ratio: f64,
        /// Rough time until the quorum is met, assuming samples keep
        /// arriving once per cycle.
        estimate: Duration,
    },
}

/// Rolling 24 hour mean of stored samples, gated on a 60% quorum.
#[derive(Debug, Clone, Copy)]
pub struct TimeAverageProcessor {
    inner: DefaultProcessor,
    cycle: Duration,
}

impl TimeAverageProcessor {
    pub fn new(cycle: Duration) -> Self {
        Self {
            inner: DefaultProcessor,
            cycle,
        }
    }

    /// Samples a full window should contain at the configured cycle.
    pub fn expected_samples(&self) -> u64 {
        let cycle = self.cycle.as_secs().max(1);
        (DAY_WINDOW.as_secs() / cycle).max(1)
    }

    /// Check the quorum for `request` at `now`.
    pub fn quorum(
        &self,
        request: &PrespecifiedRequest,
        store: &dyn ValueStore,
        now: DateTime<Utc>,
    ) -> Quorum {
        let window = chrono::Duration::seconds(DAY_WINDOW.as_secs() as i64);
        let vals: Vec<f64> = store
            .samples_in_window(request.request_id, now, window)
            .iter()
            .map(|s| s.value)
            .collect();

        let ratio = vals.len() as f64 / self.expected_samples() as f64;
        if ratio < QUORUM_RATIO {
            let estimate = Duration::from_secs_f64((QUORUM_RATIO - ratio) * DAY_WINDOW.as_secs_f64());
            return Quorum::Pending { ratio, estimate };
        }

        Quorum::Ready(mean(&vals))
    }
}

impl ValueProcessor for TimeAverageProcessor {
    fn transform(
        &self,
        request: &PrespecifiedRequest,
        payloads: &[Option<Vec<u8>>],
    ) -> Result<Aggregate> {
        self.inner.transform(request, payloads)
    }

    fn value(
        &self,
        request: &PrespecifiedRequest,
        store: &dyn ValueStore,
        now: DateTime<Utc>,
    ) -> Option<f64> {
        match self.quorum(request, store, now) {
            Quorum::Ready(v) => Some(v),
            Quorum::Pending { estimate, .. } => {
                info!(
                    "Insufficient data for request ID {}, expected in {}",
                    request.request_id,
                    format_estimate(estimate)
                );
                None
            }
        }
    }
}

/// Formats a duration as `8h24m0s`.
fn format_estimate(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataSource, TimedSample};
    use crate::store::MemoryStore;

    const HOUR: Duration = Duration::from_secs(3600);

    fn request(method: ReportingMethod, sources: usize) -> PrespecifiedRequest {
        let sources = (0..sources)
            .map(|i| DataSource {
                url: format!("https://source{}.example", i),
                args: vec!["price".to_string()],
            })
            .collect();
        PrespecifiedRequest::new(42, 1, method, sources, HOUR)
    }

    fn payload(price: f64) -> Option<Vec<u8>> {
        Some(format!(r#"{{"price": {}}}"#, price).into_bytes())
    }

    fn fill(store: &MemoryStore, id: u64, now: DateTime<Utc>, values: &[f64]) {
        for (i, v) in values.iter().enumerate() {
            let created = now - chrono::Duration::minutes(30 + 60 * i as i64);
            store.commit(id, TimedSample::new(*v, created));
        }
    }

    #[test]
    fn test_selector_tags() {
        assert_eq!("median".parse::<ReportingMethod>(), Ok(ReportingMethod::Median));
        assert_eq!("value".parse::<ReportingMethod>(), Ok(ReportingMethod::Value));
        assert_eq!("".parse::<ReportingMethod>(), Ok(ReportingMethod::Value));
        assert_eq!("dayAvg".parse::<ReportingMethod>(), Ok(ReportingMethod::DayAverage));
        assert_eq!(
            "bogus".parse::<ReportingMethod>(),
            Err(ConfigError::UnknownTransformation("bogus".to_string()))
        );
        // tags are case-sensitive
        assert!("Median".parse::<ReportingMethod>().is_err());
    }

    #[test]
    fn test_selected_processor_behavior() {
        let payloads = vec![payload(1.0), payload(2.0), payload(3.0), payload(10.0)];

        let median_req = request(ReportingMethod::Median, 4);
        let agg = median_req.processor().transform(&median_req, &payloads).unwrap();
        assert_eq!(agg.value, 3.0);

        let default_req = request("".parse().unwrap(), 4);
        let agg = default_req.processor().transform(&default_req, &payloads).unwrap();
        assert_eq!(agg.value, 4.0);
    }

    #[test]
    fn test_transform_skips_missing_payloads() {
        let req = request(ReportingMethod::Value, 3);
        let payloads = vec![payload(2.0), None, payload(4.0)];

        let agg = DefaultProcessor.transform(&req, &payloads).unwrap();
        assert_eq!(agg, Aggregate::new(3.0, 2));
    }

    #[test]
    fn test_transform_skips_unparseable_and_unmatched() {
        let req = request(ReportingMethod::Median, 2);
        // third payload has no argument group
        let payloads = vec![Some(b"not json".to_vec()), payload(7.0), payload(100.0)];

        let agg = MedianProcessor::default().transform(&req, &payloads).unwrap();
        assert_eq!(agg, Aggregate::new(7.0, 1));
    }

    #[test]
    fn test_transform_with_no_data_is_zero_not_error() {
        let req = request(ReportingMethod::Value, 2);
        let agg = DefaultProcessor.transform(&req, &[None, None]).unwrap();
        assert_eq!(agg.value, 0.0);
        assert!(!agg.has_data());

        // a true zero is distinguishable
        let agg = DefaultProcessor.transform(&req, &[payload(0.0), None]).unwrap();
        assert_eq!(agg.value, 0.0);
        assert!(agg.has_data());
    }

    #[test]
    fn test_granularity_scales_values() {
        let mut req = request(ReportingMethod::Value, 1);
        req.granularity = 1000;
        let agg = DefaultProcessor.transform(&req, &[payload(1.5)]).unwrap();
        assert_eq!(agg.value, 1500.0);
    }

    #[test]
    fn test_default_value_is_latest_sample() {
        let store = MemoryStore::new();
        let req = request(ReportingMethod::Value, 1);
        let now = Utc::now();

        assert_eq!(DefaultProcessor.value(&req, &store, now), None);

        store.commit(42, TimedSample::new(5.0, now - chrono::Duration::minutes(5)));
        store.commit(42, TimedSample::new(6.0, now));
        assert_eq!(DefaultProcessor.value(&req, &store, now), Some(6.0));

        let median_req = request(ReportingMethod::Median, 1);
        assert_eq!(median_req.processor().value(&median_req, &store, now), Some(6.0));
    }

    #[test]
    fn test_time_average_expected_samples() {
        assert_eq!(TimeAverageProcessor::new(HOUR).expected_samples(), 24);
        assert_eq!(
            TimeAverageProcessor::new(Duration::from_secs(60)).expected_samples(),
            1440
        );
        assert_eq!(
            TimeAverageProcessor::new(Duration::from_secs(7 * 3600)).expected_samples(),
            3
        );
    }

    #[test]
    fn test_time_average_below_quorum() {
        let store = MemoryStore::new();
        let req = request(ReportingMethod::DayAverage, 1);
        let now = Utc::now();
        fill(&store, 42, now, &[1.0; 14]);

        let processor = TimeAverageProcessor::new(HOUR);
        match processor.quorum(&req, &store, now) {
            Quorum::Pending { ratio, estimate } => {
                assert!((ratio - 14.0 / 24.0).abs() < 1e-9);
                // (0.6 - 14/24) * 24h = 24 minutes
                assert!((estimate.as_secs_f64() - 24.0 * 60.0).abs() < 1.0);
            }
            other => panic!("expected pending quorum, got {:?}", other),
        }
        assert_eq!(req.processor().value(&req, &store, now), None);
    }

    #[test]
    fn test_time_average_at_quorum() {
        let store = MemoryStore::new();
        let req = request(ReportingMethod::DayAverage, 1);
        let now = Utc::now();
        let values: Vec<f64> = (1..=15).map(|v| v as f64).collect();
        fill(&store, 42, now, &values);

        assert_eq!(req.processor().value(&req, &store, now), Some(8.0));
    }

    #[test]
    fn test_time_average_ignores_samples_outside_window() {
        let store = MemoryStore::new();
        let req = request(ReportingMethod::DayAverage, 1);
        let now = Utc::now();
        fill(&store, 42, now, &[2.0; 15]);
        store.commit(42, TimedSample::new(1000.0, now - chrono::Duration::hours(30)));

        assert_eq!(req.processor().value(&req, &store, now), Some(2.0));
    }

    #[test]
    fn test_time_average_transform_is_mean() {
        let req = request(ReportingMethod::DayAverage, 2);
        let agg = req
            .processor()
            .transform(&req, &[payload(1.0), payload(2.0)])
            .unwrap();
        assert_eq!(agg.value, 1.5);
    }

    #[test]
    fn test_reporting_method_serde() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(default)]
            transformation: ReportingMethod,
        }

        let w: Wrapper = serde_json::from_str(r#"{"transformation": "dayAvg"}"#).unwrap();
        assert_eq!(w.transformation, ReportingMethod::DayAverage);

        let w: Wrapper = serde_json::from_str("{}").unwrap();
        assert_eq!(w.transformation, ReportingMethod::Value);

        assert!(serde_json::from_str::<Wrapper>(r#"{"transformation": "bogus"}"#).is_err());
        assert_eq!(
            serde_json::to_string(&ReportingMethod::Median).unwrap(),
            "\"median\""
        );
    }

    #[test]
    fn test_format_estimate() {
        assert_eq!(format_estimate(Duration::from_secs(30240)), "8h24m0s");
    }
}
