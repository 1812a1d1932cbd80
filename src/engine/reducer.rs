//! Combining a round's partial results into the running aggregate

use super::aggregate::{Aggregate, AggregateValue};
use super::partial::{PartialResult, Tally};
use crate::error::{EngineError, ErrorCode, Result};
use tracing::trace;

/// Associative, commutative combine step.
///
/// A round is first folded into a single delta, then applied to the aggregate
/// in ascending bucket order. The aggregate after a round is therefore the
/// same for any ordering or pre-grouping of that round's partials.
#[derive(Debug, Default, Clone, Copy)]
pub struct Reducer;

impl Reducer {
    pub fn new() -> Self {
        Self
    }

    /// Fold `partials` into one partial of `aggregate`'s shape
    pub fn fold(
        &self,
        aggregate: &Aggregate,
        partials: impl IntoIterator<Item = PartialResult>,
    ) -> Result<PartialResult> {
        partials
            .into_iter()
            .try_fold(PartialResult::empty(aggregate.mode()), PartialResult::merge)
    }

    /// Apply one round. On error the aggregate is left untouched.
    pub fn combine(
        &self,
        aggregate: &mut Aggregate,
        partials: impl IntoIterator<Item = PartialResult>,
    ) -> Result<()> {
        let delta = self.fold(aggregate, partials)?;
        let mode = aggregate.mode();

        match (&mut aggregate.value, delta.tally) {
            (AggregateValue::Scalar(count), Tally::Count(n)) => *count += n,
            (AggregateValue::Bucketed(buckets), Tally::Buckets(round)) => {
                for (key, n) in round {
                    buckets.add(key, n);
                }
                debug_assert_eq!(
                    buckets.max().map(|(_, n)| n),
                    buckets.scan_max(),
                    "tracked maximum diverged from bucket contents"
                );
            }
            // `fold` starts from the aggregate's own shape, so a mismatch here
            // can only come from a broken `merge`.
            (_, tally) => {
                return Err(EngineError::reduce(
                    ErrorCode::REDUCE_SHAPE_MISMATCH,
                    format!("{:?} round delta for {:?} aggregate", tally.mode(), mode),
                ))
            }
        }

        aggregate.records += delta.records;
        aggregate.skipped += delta.skipped;
        aggregate.rounds += 1;

        trace!(
            "Reduced round {} (records: {}, skipped: {}, total: {})",
            aggregate.rounds,
            delta.records,
            delta.skipped,
            aggregate.total()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AggregateMode;

    #[test]
    fn test_scalar_sum() {
        let mut aggregate = Aggregate::new(AggregateMode::Scalar);
        let reducer = Reducer::new();
        reducer
            .combine(&mut aggregate, vec![PartialResult::count(2), PartialResult::count(3)])
            .unwrap();
        reducer.combine(&mut aggregate, vec![PartialResult::count(1)]).unwrap();
        assert_eq!(aggregate.count(), Some(6));
        assert_eq!(aggregate.rounds, 2);
    }

    #[test]
    fn test_empty_round_counts_as_round() {
        let mut aggregate = Aggregate::new(AggregateMode::Scalar);
        Reducer::new().combine(&mut aggregate, Vec::new()).unwrap();
        assert_eq!(aggregate.count(), Some(0));
        assert_eq!(aggregate.rounds, 1);
    }

    #[test]
    fn test_bucketed_max_across_rounds() {
        let mut aggregate = Aggregate::new(AggregateMode::Bucketed);
        let reducer = Reducer::new();

        reducer
            .combine(&mut aggregate, vec![PartialResult::buckets([(0, 3), (2, 1)])])
            .unwrap();
        assert_eq!(aggregate.buckets().unwrap().max(), Some((0, 3)));

        reducer
            .combine(&mut aggregate, vec![PartialResult::buckets([(1, 5)])])
            .unwrap();
        let buckets = aggregate.buckets().unwrap();
        assert_eq!(buckets.max(), Some((1, 5)));
        assert_eq!(buckets.total(), 9);
    }

    #[test]
    fn test_tie_within_round_prefers_lower_bucket() {
        let mut aggregate = Aggregate::new(AggregateMode::Bucketed);
        Reducer::new()
            .combine(
                &mut aggregate,
                vec![PartialResult::buckets([(6, 2)]), PartialResult::buckets([(3, 2)])],
            )
            .unwrap();
        assert_eq!(aggregate.buckets().unwrap().max(), Some((3, 2)));
    }

    #[test]
    fn test_tie_across_rounds_keeps_earlier_bucket() {
        let mut aggregate = Aggregate::new(AggregateMode::Bucketed);
        let reducer = Reducer::new();
        reducer
            .combine(&mut aggregate, vec![PartialResult::buckets([(9, 2)])])
            .unwrap();
        reducer
            .combine(&mut aggregate, vec![PartialResult::buckets([(1, 2)])])
            .unwrap();
        assert_eq!(aggregate.buckets().unwrap().max(), Some((9, 2)));
    }

    #[test]
    fn test_mismatch_leaves_aggregate_untouched() {
        let mut aggregate = Aggregate::new(AggregateMode::Scalar);
        let reducer = Reducer::new();
        reducer.combine(&mut aggregate, vec![PartialResult::count(4)]).unwrap();
        let before = aggregate.clone();

        let err = reducer
            .combine(
                &mut aggregate,
                vec![PartialResult::count(1), PartialResult::buckets([(0, 1)])],
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::REDUCE_SHAPE_MISMATCH);
        assert_eq!(aggregate, before);
    }

    #[test]
    fn test_permutations_agree() {
        let partials = vec![
            PartialResult::buckets([(0, 2), (1, 1)]),
            PartialResult::buckets([(1, 1)]),
            PartialResult::buckets([(0, 0), (2, 2)]),
        ];
        let reducer = Reducer::new();
        let run = |order: &[usize]| {
            let mut aggregate = Aggregate::new(AggregateMode::Bucketed);
            reducer
                .combine(&mut aggregate, order.iter().map(|&i| partials[i].clone()))
                .unwrap();
            aggregate
        };
        let expected = run(&[0, 1, 2]);
        for order in [[0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]] {
            assert_eq!(run(&order), expected);
        }
    }
}
