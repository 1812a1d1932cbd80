//! Final report emitted when the driver reaches DONE

use super::aggregate::Aggregate;
use super::BucketKey;
use crate::extract::QueryPlan;
use serde::Serialize;
use std::fmt;

/// Bucket holding the tracked maximum
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopBucket {
    pub key: BucketKey,
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub subject: String,
    pub bucket_kind: String,
    pub aggregate: Aggregate,
    pub failed_rounds: u64,
    pub top_bucket: Option<TopBucket>,
}

impl Report {
    pub fn new(
        plan: &QueryPlan,
        subject: Option<String>,
        aggregate: Aggregate,
        failed_rounds: u64,
    ) -> Self {
        let predicate = &plan.predicate;
        let top_bucket = aggregate
            .buckets()
            .and_then(|b| b.max())
            .map(|(key, count)| TopBucket {
                key,
                label: predicate.bucket_label(key),
                count,
            });

        Self {
            subject: subject.unwrap_or_else(|| predicate.describe()),
            bucket_kind: predicate.bucket_kind().to_string(),
            aggregate,
            failed_rounds,
            top_bucket,
        }
    }

    /// Scalar count, `None` for bucketed reports
    pub fn count(&self) -> Option<u64> {
        self.aggregate.count()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.aggregate.count(), &self.top_bucket) {
            (Some(count), _) => write!(f, ">>> Total number of {} is '{}'.", self.subject, count)?,
            (None, Some(top)) => write!(
                f,
                ">>> Most popular {} of {} is '{}' ({} posts).",
                self.bucket_kind, self.subject, top.label, top.count
            )?,
            (None, None) => write!(f, ">>> No {} found.", self.subject)?,
        }
        if self.failed_rounds > 0 {
            write!(
                f,
                " ({} batches skipped after dispatch failures)",
                self.failed_rounds
            )?;
        }
        Ok(())
    }
}
