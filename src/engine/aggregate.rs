//! The running aggregate owned by the driver

use super::{AggregateMode, BucketKey};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-bucket counts with an incrementally tracked maximum
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BucketCounts {
    counts: BTreeMap<BucketKey, u64>,
    max: Option<(BucketKey, u64)>,
}

impl BucketCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to `key` and update the maximum.
    ///
    /// The maximum moves only when the updated bucket strictly exceeds it, so on
    /// ties the bucket that reached the value first keeps it.
    pub fn add(&mut self, key: BucketKey, delta: u64) {
        if delta == 0 {
            return;
        }
        let count = self.counts.entry(key).or_insert(0);
        *count += delta;
        let count = *count;
        match self.max {
            Some((_, max)) if count <= max => {}
            _ => self.max = Some((key, count)),
        }
    }

    pub fn get(&self, key: BucketKey) -> u64 {
        self.counts.get(&key).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &BTreeMap<BucketKey, u64> {
        &self.counts
    }

    /// Tracked `(bucket, count)` maximum, `None` while every bucket is empty
    pub fn max(&self) -> Option<(BucketKey, u64)> {
        self.max
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Largest count over the full mapping, computed from scratch
    pub fn scan_max(&self) -> Option<u64> {
        self.counts.values().copied().max()
    }
}

/// Value part of the aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateValue {
    Scalar(u64),
    Bucketed(BucketCounts),
}

/// Process-wide running total plus run statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    pub value: AggregateValue,
    /// Records examined across all reduced rounds
    pub records: u64,
    /// Records excluded through extraction skips
    pub skipped: u64,
    /// Rounds reduced into this aggregate
    pub rounds: u64,
}

impl Aggregate {
    pub fn new(mode: AggregateMode) -> Self {
        let value = match mode {
            AggregateMode::Scalar => AggregateValue::Scalar(0),
            AggregateMode::Bucketed => AggregateValue::Bucketed(BucketCounts::new()),
        };
        Self {
            value,
            records: 0,
            skipped: 0,
            rounds: 0,
        }
    }

    pub fn mode(&self) -> AggregateMode {
        match self.value {
            AggregateValue::Scalar(_) => AggregateMode::Scalar,
            AggregateValue::Bucketed(_) => AggregateMode::Bucketed,
        }
    }

    /// Scalar count, `None` for bucketed aggregates
    pub fn count(&self) -> Option<u64> {
        match self.value {
            AggregateValue::Scalar(n) => Some(n),
            AggregateValue::Bucketed(_) => None,
        }
    }

    pub fn buckets(&self) -> Option<&BucketCounts> {
        match &self.value {
            AggregateValue::Bucketed(buckets) => Some(buckets),
            AggregateValue::Scalar(_) => None,
        }
    }

    /// Number of matched records regardless of shape
    pub fn total(&self) -> u64 {
        match &self.value {
            AggregateValue::Scalar(n) => *n,
            AggregateValue::Bucketed(buckets) => buckets.total(),
        }
    }
}
