//! Timed sample storage.
//!
//! Processors only ever read from a [`ValueStore`]; trackers write through
//! `commit`. [`MemoryStore`] is the in-process implementation and also keeps
//! the latest status reading of every non-request tracker.

use crate::models::TimedSample;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Read and write access to the per-request sample history.
pub trait ValueStore: Send + Sync {
    /// Most recent sample for the request.
    fn latest(&self, request_id: u64) -> Option<TimedSample>;

    /// Samples created in `(now - window, now]`, oldest first.
    fn samples_in_window(
        &self,
        request_id: u64,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Vec<TimedSample>;

    /// Commit a new sample.
    fn commit(&self, request_id: u64, sample: TimedSample);
}

/// A status reading recorded by a tracker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusEntry {
    pub value: Value,
    pub updated: DateTime<Utc>,
}

/// Default amount of history kept per request.
pub fn default_retention() -> Duration {
    Duration::hours(48)
}

/// Thread-safe in-memory value store.
#[derive(Debug)]
pub struct MemoryStore {
    samples: RwLock<HashMap<u64, Vec<TimedSample>>>,
    status: RwLock<HashMap<String, StatusEntry>>,
    retention: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_retention(default_retention())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples older than `retention` relative to the newest one are pruned on commit.
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            samples: RwLock::new(HashMap::new()),
            status: RwLock::new(HashMap::new()),
            retention,
        }
    }

    /// Record the latest status reading under `key`, replacing any previous one.
    pub fn set_status(&self, key: &str, value: Value) {
        let entry = StatusEntry {
            value,
            updated: Utc::now(),
        };
        self.status
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), entry);
    }

    pub fn status(&self, key: &str) -> Option<StatusEntry> {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Number of samples currently held for a request.
    pub fn sample_count(&self, request_id: u64) -> usize {
        self.samples
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request_id)
            .map_or(0, Vec::len)
    }
}

impl ValueStore for MemoryStore {
    fn latest(&self, request_id: u64) -> Option<TimedSample> {
        self.samples
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request_id)
            .and_then(|series| series.last().copied())
    }

    fn samples_in_window(
        &self,
        request_id: u64,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Vec<TimedSample> {
        let start = now - window;
        let samples = self.samples.read().unwrap_or_else(PoisonError::into_inner);

        samples
            .get(&request_id)
            .map(|series| {
                series
                    .iter()
                    .filter(|s| s.created > start && s.created <= now)
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn commit(&self, request_id: u64, sample: TimedSample) {
        let mut samples = self.samples.write().unwrap_or_else(PoisonError::into_inner);
        let series = samples.entry(request_id).or_default();

        // keep the series ordered by creation time
        let at = series.partition_point(|s| s.created <= sample.created);
        series.insert(at, sample);

        if let Some(newest) = series.last().map(|s| s.created) {
            let cutoff = newest - self.retention;
            let before = series.len();
            series.retain(|s| s.created >= cutoff);
            if series.len() != before {
                debug!(
                    "Pruned {} samples for request {}",
                    before - series.len(),
                    request_id
                );
            }
        }
    }
}
