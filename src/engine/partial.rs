//! Partial results produced by work units

use super::{AggregateMode, BucketKey};
use crate::error::{EngineError, ErrorCode, Result};
use crate::extract::Verdict;
use serde::Serialize;
use std::collections::BTreeMap;

/// Counted value of a partial result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tally {
    Count(u64),
    Buckets(BTreeMap<BucketKey, u64>),
}

impl Tally {
    pub fn empty(mode: AggregateMode) -> Self {
        match mode {
            AggregateMode::Scalar => Tally::Count(0),
            AggregateMode::Bucketed => Tally::Buckets(BTreeMap::new()),
        }
    }

    pub fn mode(&self) -> AggregateMode {
        match self {
            Tally::Count(_) => AggregateMode::Scalar,
            Tally::Buckets(_) => AggregateMode::Bucketed,
        }
    }

    /// Sum over all buckets, or the count itself
    pub fn total(&self) -> u64 {
        match self {
            Tally::Count(n) => *n,
            Tally::Buckets(buckets) => buckets.values().sum(),
        }
    }
}

/// Output of one work unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartialResult {
    pub tally: Tally,
    /// Records the unit examined
    pub records: u64,
    /// Records excluded because a required field was missing or unparseable
    pub skipped: u64,
}

impl PartialResult {
    pub fn empty(mode: AggregateMode) -> Self {
        Self {
            tally: Tally::empty(mode),
            records: 0,
            skipped: 0,
        }
    }

    pub fn count(n: u64) -> Self {
        Self {
            tally: Tally::Count(n),
            records: n,
            skipped: 0,
        }
    }

    pub fn buckets(buckets: impl IntoIterator<Item = (BucketKey, u64)>) -> Self {
        let buckets: BTreeMap<_, _> = buckets.into_iter().collect();
        let records = buckets.values().sum();
        Self {
            tally: Tally::Buckets(buckets),
            records,
            skipped: 0,
        }
    }

    /// Result for a single evaluated record
    pub fn from_verdict(mode: AggregateMode, verdict: &Verdict) -> Self {
        let mut partial = Self::empty(mode);
        partial.observe(verdict);
        partial
    }

    pub fn mode(&self) -> AggregateMode {
        self.tally.mode()
    }

    /// Fold one record's verdict into this partial.
    ///
    /// Scalar tallies count both `Match` and `Bucket`; bucketed tallies count
    /// only `Bucket`, since a bare match names no bucket.
    pub fn observe(&mut self, verdict: &Verdict) {
        self.records += 1;
        match (&mut self.tally, verdict) {
            (_, Verdict::Skip(_)) => self.skipped += 1,
            (Tally::Count(n), Verdict::Match | Verdict::Bucket(_)) => *n += 1,
            (Tally::Buckets(buckets), Verdict::Bucket(key)) => {
                *buckets.entry(*key).or_insert(0) += 1;
            }
            _ => {}
        }
    }

    /// Combine two partials of the same shape. Associative and commutative.
    pub fn merge(self, other: PartialResult) -> Result<PartialResult> {
        let tally = match (self.tally, other.tally) {
            (Tally::Count(a), Tally::Count(b)) => Tally::Count(a + b),
            (Tally::Buckets(mut a), Tally::Buckets(b)) => {
                for (key, n) in b {
                    *a.entry(key).or_insert(0) += n;
                }
                Tally::Buckets(a)
            }
            (a, b) => {
                return Err(EngineError::reduce(
                    ErrorCode::REDUCE_SHAPE_MISMATCH,
                    format!(
                        "cannot merge {:?} partial with {:?} partial",
                        a.mode(),
                        b.mode()
                    ),
                ))
            }
        };
        Ok(PartialResult {
            tally,
            records: self.records + other.records,
            skipped: self.skipped + other.skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::SkipReason;

    #[test]
    fn test_observe_scalar() {
        let mut partial = PartialResult::empty(AggregateMode::Scalar);
        partial.observe(&Verdict::Match);
        partial.observe(&Verdict::NoMatch);
        partial.observe(&Verdict::Skip(SkipReason::MissingDate));
        assert_eq!(partial.tally, Tally::Count(1));
        assert_eq!(partial.records, 3);
        assert_eq!(partial.skipped, 1);
    }

    #[test]
    fn test_observe_bucketed_ignores_bare_match() {
        let mut partial = PartialResult::empty(AggregateMode::Bucketed);
        partial.observe(&Verdict::Bucket(3));
        partial.observe(&Verdict::Bucket(3));
        partial.observe(&Verdict::Match);
        assert_eq!(partial.tally, Tally::Buckets(BTreeMap::from([(3, 2)])));
        assert_eq!(partial.tally.total(), 2);
    }

    #[test]
    fn test_merge_buckets() {
        let a = PartialResult::buckets([(0, 1), (1, 2)]);
        let b = PartialResult::buckets([(1, 3), (5, 1)]);
        let merged = a.merge(b).unwrap();
        assert_eq!(
            merged.tally,
            Tally::Buckets(BTreeMap::from([(0, 1), (1, 5), (5, 1)]))
        );
        assert_eq!(merged.records, 7);
    }

    #[test]
    fn test_merge_shape_mismatch() {
        let err = PartialResult::count(1)
            .merge(PartialResult::buckets([(0, 1)]))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::REDUCE_SHAPE_MISMATCH);
    }

    #[test]
    fn test_from_verdict() {
        let hit = PartialResult::from_verdict(AggregateMode::Bucketed, &Verdict::Bucket(7));
        assert_eq!(hit.tally, Tally::Buckets(BTreeMap::from([(7, 1)])));
        let miss = PartialResult::from_verdict(AggregateMode::Bucketed, &Verdict::NoMatch);
        assert_eq!(miss.tally.total(), 0);
        assert_eq!(miss.records, 1);
    }
}
