//! Query selection: explicit predicates or named presets

use crate::error::{EngineError, ErrorCode, Result};
use crate::extract::{DateRangePredicate, MonthlyTagPredicate, QueryPlan, TagPredicate};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A named, ready-made query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
}

pub const PRESETS: &[Preset] = &[
    Preset {
        name: "storm-posts",
        description: "Count posts tagged <storm> and <apache>, or <apache-storm>",
    },
    Preset {
        name: "july-2014-posts",
        description: "Count posts created during July 2014 (UTC)",
    },
    Preset {
        name: "storm-popular-month",
        description: "Find the month with the most Apache Storm posts",
    },
];

pub const DEFAULT_PRESET: &str = "storm-posts";

const STORM_SUBJECT: &str = "posts that were tagged with Apache Storm";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum QueryConfig {
    /// Count records whose tags satisfy any group
    Tagged {
        any_of: Vec<Vec<String>>,
        #[serde(default)]
        subject: Option<String>,
    },
    /// Count records created inside an inclusive range
    DateRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        #[serde(default)]
        subject: Option<String>,
    },
    /// Bucket tagged records by creation month
    MonthlyTagged {
        any_of: Vec<Vec<String>>,
        #[serde(default)]
        subject: Option<String>,
    },
    Preset {
        name: String,
        #[serde(default)]
        subject: Option<String>,
    },
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self::preset(DEFAULT_PRESET)
    }
}

/// A query plan together with the noun phrase its report uses
#[derive(Debug)]
pub struct CompiledQuery {
    pub plan: QueryPlan,
    pub subject: Option<String>,
}

impl QueryConfig {
    pub fn preset(name: impl Into<String>) -> Self {
        Self::Preset {
            name: name.into(),
            subject: None,
        }
    }

    /// Expand a preset into the query it names; other queries are returned as-is
    pub fn resolve(&self) -> Result<QueryConfig> {
        let Self::Preset { name, subject } = self else {
            return Ok(self.clone());
        };

        let storm = || {
            vec![
                vec!["storm".to_string(), "apache".to_string()],
                vec!["apache-storm".to_string()],
            ]
        };
        let resolved = match name.as_str() {
            "storm-posts" => Self::Tagged {
                any_of: storm(),
                subject: Some(STORM_SUBJECT.to_string()),
            },
            "july-2014-posts" => Self::DateRange {
                start: Utc
                    .with_ymd_and_hms(2014, 7, 1, 0, 0, 0)
                    .single()
                    .ok_or_else(bad_preset_date)?,
                end: Utc
                    .with_ymd_and_hms(2014, 7, 31, 23, 59, 59)
                    .single()
                    .ok_or_else(bad_preset_date)?
                    + chrono::Duration::milliseconds(999),
                subject: Some("posts created in July 2014".to_string()),
            },
            "storm-popular-month" => Self::MonthlyTagged {
                any_of: storm(),
                subject: Some(STORM_SUBJECT.to_string()),
            },
            other => {
                let known: Vec<_> = PRESETS.iter().map(|p| p.name).collect();
                return Err(EngineError::config_with_code(
                    ErrorCode::CONFIG_UNKNOWN_PRESET,
                    format!("unknown query preset '{}' (known: {})", other, known.join(", ")),
                    Some("query.name".to_string()),
                ));
            }
        };

        Ok(match subject {
            Some(subject) => resolved.with_subject(subject.clone()),
            None => resolved,
        })
    }

    /// Resolve presets and build the extractor/predicate pair
    pub fn compile(&self) -> Result<CompiledQuery> {
        match self.resolve()? {
            Self::Tagged { any_of, subject } => Ok(CompiledQuery {
                plan: QueryPlan::with_predicate(tag_predicate(&any_of)?),
                subject,
            }),
            Self::DateRange { start, end, subject } => {
                let predicate = DateRangePredicate::new(start, end).ok_or_else(|| {
                    EngineError::config_with_code(
                        ErrorCode::CONFIG_INVALID_VALUE,
                        format!("date range starts ({}) after it ends ({})", start, end),
                        Some("query.start".to_string()),
                    )
                })?;
                Ok(CompiledQuery {
                    plan: QueryPlan::with_predicate(predicate),
                    subject,
                })
            }
            Self::MonthlyTagged { any_of, subject } => Ok(CompiledQuery {
                plan: QueryPlan::with_predicate(MonthlyTagPredicate::new(tag_predicate(&any_of)?)),
                subject,
            }),
            Self::Preset { name, .. } => Err(EngineError::config_with_code(
                ErrorCode::CONFIG_UNKNOWN_PRESET,
                format!("preset '{}' did not resolve to a query", name),
                Some("query.name".to_string()),
            )),
        }
    }

    fn with_subject(self, subject: String) -> Self {
        let subject = Some(subject);
        match self {
            Self::Tagged { any_of, .. } => Self::Tagged { any_of, subject },
            Self::DateRange { start, end, .. } => Self::DateRange { start, end, subject },
            Self::MonthlyTagged { any_of, .. } => Self::MonthlyTagged { any_of, subject },
            Self::Preset { name, .. } => Self::Preset { name, subject },
        }
    }
}

fn tag_predicate(any_of: &[Vec<String>]) -> Result<TagPredicate> {
    let predicate = TagPredicate::any_of(any_of);
    if predicate.groups().is_empty() {
        return Err(EngineError::config_with_code(
            ErrorCode::CONFIG_INVALID_VALUE,
            "tag query needs at least one non-empty tag group",
            Some("query.any_of".to_string()),
        ));
    }
    Ok(predicate)
}

fn bad_preset_date() -> EngineError {
    EngineError::config("preset date out of range")
}
