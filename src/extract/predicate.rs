//! Tag, date-range and month-bucket predicates over extracted fields

use super::{FieldValue, RecordFields, RecordPredicate, SkipReason, Verdict};
use crate::engine::{AggregateMode, BucketKey};
use chrono::{DateTime, Datelike, Month, Utc};
use std::collections::BTreeSet;

/// Matches when every tag of at least one group is present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPredicate {
    any_of: Vec<Vec<String>>,
}

impl TagPredicate {
    /// Tags may be given bare (`storm`) or bracketed (`<storm>`)
    pub fn any_of<G, T>(groups: G) -> Self
    where
        G: IntoIterator<Item = T>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        let any_of = groups
            .into_iter()
            .map(|group| {
                group
                    .into_iter()
                    .map(|tag| normalize_tag(tag.as_ref()))
                    .filter(|tag| !tag.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|group| !group.is_empty())
            .collect();
        Self { any_of }
    }

    /// `<storm>` with `<apache>`, or `<apache-storm>`
    pub fn apache_storm() -> Self {
        Self::any_of([vec!["storm", "apache"], vec!["apache-storm"]])
    }

    pub fn groups(&self) -> &[Vec<String>] {
        &self.any_of
    }

    pub fn matches(&self, tags: &BTreeSet<String>) -> bool {
        self.any_of
            .iter()
            .any(|group| group.iter().all(|tag| tags.contains(tag)))
    }

    fn describe_groups(&self) -> String {
        self.any_of
            .iter()
            .map(|group| group.iter().map(|t| format!("<{}>", t)).collect::<String>())
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

impl RecordPredicate for TagPredicate {
    fn mode(&self) -> AggregateMode {
        AggregateMode::Scalar
    }

    fn evaluate(&self, fields: &RecordFields) -> Verdict {
        match &fields.tags {
            Some(tags) if self.matches(tags) => Verdict::Match,
            _ => Verdict::NoMatch,
        }
    }

    fn describe(&self) -> String {
        format!("posts tagged with {}", self.describe_groups())
    }
}

/// Matches when the creation instant lies in `[start, end]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRangePredicate {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateRangePredicate {
    /// Returns `None` when `start` is after `end`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

impl RecordPredicate for DateRangePredicate {
    fn mode(&self) -> AggregateMode {
        AggregateMode::Scalar
    }

    fn evaluate(&self, fields: &RecordFields) -> Verdict {
        match created_at(fields) {
            Ok(instant) if instant >= self.start && instant <= self.end => Verdict::Match,
            Ok(_) => Verdict::NoMatch,
            Err(reason) => Verdict::Skip(reason),
        }
    }

    fn describe(&self) -> String {
        format!(
            "posts created between {} and {}",
            self.start.to_rfc3339(),
            self.end.to_rfc3339()
        )
    }
}

/// Buckets tag matches by 0-based UTC month of creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyTagPredicate {
    tags: TagPredicate,
}

impl MonthlyTagPredicate {
    pub fn new(tags: TagPredicate) -> Self {
        Self { tags }
    }
}

impl RecordPredicate for MonthlyTagPredicate {
    fn mode(&self) -> AggregateMode {
        AggregateMode::Bucketed
    }

    fn evaluate(&self, fields: &RecordFields) -> Verdict {
        if self.tags.evaluate(fields) != Verdict::Match {
            return Verdict::NoMatch;
        }
        match created_at(fields) {
            Ok(instant) => Verdict::Bucket(instant.month0()),
            Err(reason) => Verdict::Skip(reason),
        }
    }

    fn describe(&self) -> String {
        format!("posts tagged with {}", self.tags.describe_groups())
    }

    fn bucket_kind(&self) -> &'static str {
        "month"
    }

    fn bucket_label(&self, key: BucketKey) -> String {
        key.checked_add(1)
            .and_then(|n| u8::try_from(n).ok())
            .and_then(|n| Month::try_from(n).ok())
            .map(|month| month.name().to_string())
            .unwrap_or_else(|| format!("month {}", key))
    }
}

fn created_at(fields: &RecordFields) -> Result<DateTime<Utc>, SkipReason> {
    match &fields.created {
        FieldValue::Present(instant) => Ok(*instant),
        FieldValue::Absent => Err(SkipReason::MissingDate),
        FieldValue::Invalid(raw) => Err(SkipReason::UnparseableDate(raw.clone())),
    }
}

fn normalize_tag(tag: &str) -> String {
    tag.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim()
        .to_string()
}
