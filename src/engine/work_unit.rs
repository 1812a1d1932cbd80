//! Schedulable units of work at two granularities

use super::partial::PartialResult;
use crate::extract::{QueryPlan, Verdict};
use crate::source::{Batch, Record};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

/// How a batch is split into work units
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
    /// One unit per batch, returning the batch's aggregated partial
    Coarse,
    /// One unit per record
    #[default]
    Fine,
}

#[derive(Debug, Clone)]
enum Payload {
    Coarse(Arc<[Record]>),
    Fine(Record),
}

/// Immutable unit of work: records plus the plan to evaluate them with.
/// Clones share the coarse records, so broadcasting a batch never copies it.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    round: u64,
    payload: Payload,
    plan: Arc<QueryPlan>,
}

impl WorkUnit {
    pub fn coarse(round: u64, records: Vec<Record>, plan: Arc<QueryPlan>) -> Self {
        Self {
            round,
            payload: Payload::Coarse(Arc::from(records)),
            plan,
        }
    }

    pub fn fine(round: u64, record: Record, plan: Arc<QueryPlan>) -> Self {
        Self {
            round,
            payload: Payload::Fine(record),
            plan,
        }
    }

    /// Split `batch` into units for one dispatch round
    pub fn build(granularity: Granularity, batch: Batch, plan: &Arc<QueryPlan>) -> Vec<WorkUnit> {
        let round = batch.index;
        match granularity {
            Granularity::Coarse if batch.is_empty() => Vec::new(),
            Granularity::Coarse => vec![WorkUnit::coarse(round, batch.records, plan.clone())],
            Granularity::Fine => batch
                .records
                .into_iter()
                .map(|record| WorkUnit::fine(round, record, plan.clone()))
                .collect(),
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn granularity(&self) -> Granularity {
        match self.payload {
            Payload::Coarse(_) => Granularity::Coarse,
            Payload::Fine(_) => Granularity::Fine,
        }
    }

    /// Number of records carried by this unit
    pub fn len(&self) -> usize {
        match &self.payload {
            Payload::Coarse(records) => records.len(),
            Payload::Fine(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evaluate every record. Extraction skips are counted, never raised.
    pub fn execute(&self) -> PartialResult {
        let mut partial = PartialResult::empty(self.plan.mode());
        match &self.payload {
            Payload::Coarse(records) => {
                for record in records.iter() {
                    self.evaluate_into(&mut partial, record);
                }
            }
            Payload::Fine(record) => self.evaluate_into(&mut partial, record),
        }
        partial
    }

    fn evaluate_into(&self, partial: &mut PartialResult, record: &str) {
        let verdict = self.plan.evaluate(record);
        if let Verdict::Skip(reason) = &verdict {
            trace!("Skipping record in round {}: {}", self.round, reason);
        }
        partial.observe(&verdict);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Tally;
    use crate::extract::TagPredicate;

    fn plan() -> Arc<QueryPlan> {
        Arc::new(QueryPlan::with_predicate(TagPredicate::apache_storm()))
    }

    fn batch() -> Batch {
        Batch {
            index: 4,
            records: vec![
                r#"<row Tags="&lt;storm&gt;&lt;apache&gt;" />"#.to_string(),
                r#"<row Tags="&lt;apache-storm&gt;" />"#.to_string(),
                r#"<row Tags="&lt;java&gt;" />"#.to_string(),
            ],
        }
    }

    #[test]
    fn test_coarse_builds_single_unit() {
        let units = WorkUnit::build(Granularity::Coarse, batch(), &plan());
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].len(), 3);
        assert_eq!(units[0].round(), 4);
        assert_eq!(units[0].granularity(), Granularity::Coarse);

        let partial = units[0].execute();
        assert_eq!(partial.tally, Tally::Count(2));
        assert_eq!(partial.records, 3);
    }

    #[test]
    fn test_broadcast_clones_share_records() {
        let unit = WorkUnit::build(Granularity::Coarse, batch(), &plan()).remove(0);
        let copy = unit.clone();

        match (&unit.payload, &copy.payload) {
            (Payload::Coarse(a), Payload::Coarse(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected coarse payloads"),
        }
        assert_eq!(copy.execute(), unit.execute());
    }

    #[test]
    fn test_fine_builds_unit_per_record() {
        let units = WorkUnit::build(Granularity::Fine, batch(), &plan());
        assert_eq!(units.len(), 3);
        let counts: Vec<u64> = units.iter().map(|u| u.execute().tally.total()).collect();
        assert_eq!(counts, vec![1, 1, 0]);
    }

    #[test]
    fn test_empty_batch_builds_nothing() {
        for granularity in [Granularity::Coarse, Granularity::Fine] {
            assert!(WorkUnit::build(granularity, Batch::default(), &plan()).is_empty());
        }
    }
}
