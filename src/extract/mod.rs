//! Per-record capabilities consumed by the engine
//!
//! A [`RecordExtractor`] turns one raw line into [`RecordFields`]; a
//! [`RecordPredicate`] turns those fields into a [`Verdict`]. The engine only
//! sees the pair through a [`QueryPlan`] and never inspects fields itself.
//!
//! Missing or malformed fields never raise. A predicate that needs a field it
//! cannot get answers [`Verdict::Skip`], which the engine counts and otherwise
//! ignores.

mod predicate;
mod row;

pub use predicate::{DateRangePredicate, MonthlyTagPredicate, TagPredicate};
pub use row::{decode_entities, parse_creation_date, split_tags, RowAttributeExtractor};

use crate::engine::{AggregateMode, BucketKey};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Outcome of reading one field from a record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldValue<T> {
    #[default]
    Absent,
    /// The field was present but could not be parsed; holds the raw text
    Invalid(String),
    Present(T),
}

impl<T> FieldValue<T> {
    pub fn present(&self) -> Option<&T> {
        match self {
            FieldValue::Present(v) => Some(v),
            _ => None,
        }
    }
}

/// Typed fields of one record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordFields {
    /// Tag tokens without their angle brackets; `None` when the record has no tags field
    pub tags: Option<BTreeSet<String>>,
    pub created: FieldValue<DateTime<Utc>>,
}

/// Why a record was excluded from aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingDate,
    UnparseableDate(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingDate => write!(f, "record has no creation date"),
            SkipReason::UnparseableDate(raw) => write!(f, "unparseable creation date '{}'", raw),
        }
    }
}

/// Result of evaluating a predicate against one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Counts once toward a scalar aggregate
    Match,
    /// Counts once toward the given bucket
    Bucket(BucketKey),
    NoMatch,
    Skip(SkipReason),
}

/// Parses one raw line into typed fields
pub trait RecordExtractor: Send + Sync + fmt::Debug {
    fn extract(&self, raw: &str) -> RecordFields;
}

/// Classifies extracted fields
pub trait RecordPredicate: Send + Sync + fmt::Debug {
    /// Shape of the aggregate this predicate feeds
    fn mode(&self) -> AggregateMode;

    fn evaluate(&self, fields: &RecordFields) -> Verdict;

    /// Noun phrase naming what is being counted, used in reports
    fn describe(&self) -> String;

    /// Human label for a bucket key
    fn bucket_label(&self, key: BucketKey) -> String {
        key.to_string()
    }

    /// What a bucket is called in reports
    fn bucket_kind(&self) -> &'static str {
        "bucket"
    }
}

/// Extractor and predicate shared by every work unit of a run
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub extractor: Arc<dyn RecordExtractor>,
    pub predicate: Arc<dyn RecordPredicate>,
}

impl QueryPlan {
    pub fn new(extractor: Arc<dyn RecordExtractor>, predicate: Arc<dyn RecordPredicate>) -> Self {
        Self {
            extractor,
            predicate,
        }
    }

    /// Plan using the default `<row .../>` extractor
    pub fn with_predicate(predicate: impl RecordPredicate + 'static) -> Self {
        Self::new(Arc::new(RowAttributeExtractor::new()), Arc::new(predicate))
    }

    pub fn mode(&self) -> AggregateMode {
        self.predicate.mode()
    }

    pub fn evaluate(&self, raw: &str) -> Verdict {
        let fields = self.extractor.extract(raw);
        self.predicate.evaluate(&fields)
    }
}
