//! Data models shared by processors, trackers and the value store.

use crate::processor::{ReportingMethod, ValueProcessor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A numeric value with the time it was committed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedSample {
    pub value: f64,
    pub created: DateTime<Utc>,
}

impl TimedSample {
    pub fn new(value: f64, created: DateTime<Utc>) -> Self {
        Self { value, created }
    }

    /// A sample stamped with the current time.
    pub fn now(value: f64) -> Self {
        Self::new(value, Utc::now())
    }
}

/// One configured data source of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    /// Endpoint returning a JSON payload.
    pub url: String,
    /// Path into the payload (object keys or array indices).
    #[serde(default)]
    pub args: Vec<String>,
}

/// A request whose data sources and reporting method are configured ahead of time.
#[derive(Debug, Clone)]
pub struct PrespecifiedRequest {
    pub request_id: u64,
    /// Scaling factor applied to every parsed payload value.
    pub granularity: u64,
    pub method: ReportingMethod,
    /// Positionally aligned with the payloads handed to `transform`.
    pub sources: Vec<DataSource>,
    processor: Arc<dyn ValueProcessor>,
}

impl PrespecifiedRequest {
    /// Builds a request and resolves its reporting method into a processor.
    ///
    /// `cycle` is the tracker sampling interval; only the day-average
    /// processor uses it.
    pub fn new(
        request_id: u64,
        granularity: u64,
        method: ReportingMethod,
        sources: Vec<DataSource>,
        cycle: Duration,
    ) -> Self {
        Self {
            request_id,
            granularity,
            method,
            sources,
            processor: method.processor(cycle),
        }
    }

    /// The processor this request was configured with.
    pub fn processor(&self) -> &dyn ValueProcessor {
        self.processor.as_ref()
    }

    /// Argument group of the source at `index`, if one is configured.
    pub fn arg_group(&self, index: usize) -> Option<&[String]> {
        self.sources.get(index).map(|s| s.args.as_slice())
    }
}

/// Result of combining one cycle's payloads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aggregate {
    pub value: f64,
    /// Number of payloads that parsed. Zero means `value` is a placeholder.
    pub samples: usize,
}

impl Aggregate {
    pub fn new(value: f64, samples: usize) -> Self {
        Self { value, samples }
    }

    /// True when at least one payload contributed to the value.
    pub fn has_data(&self) -> bool {
        self.samples > 0
    }
}

/// The reportable state of one request at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct ValueReport {
    pub request_id: u64,
    pub method: ReportingMethod,
    /// `None` while the processor is not ready to report.
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<TimedSample>,
    pub samples_24h: usize,
}
