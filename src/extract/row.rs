//! Attribute extraction from `<row .../>` post markup

use super::{FieldValue, RecordExtractor, RecordFields};
use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};

static ROW_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<row\b").expect("valid regex"));

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][A-Za-z0-9_:.\-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid regex")
});

static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[A-Za-z]+);").expect("valid regex"));

static TAG_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([^<>]+)>").expect("valid regex"));

const CREATION_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Reads `Tags` and `CreationDate` from the first `<row>` element of a line
#[derive(Debug, Clone)]
pub struct RowAttributeExtractor {
    tags_attr: String,
    date_attr: String,
}

impl RowAttributeExtractor {
    pub fn new() -> Self {
        Self {
            tags_attr: "tags".to_string(),
            date_attr: "creationdate".to_string(),
        }
    }

    /// Read tags and dates from differently named attributes (matched case-insensitively)
    pub fn with_attributes(tags: &str, created: &str) -> Self {
        Self {
            tags_attr: tags.to_ascii_lowercase(),
            date_attr: created.to_ascii_lowercase(),
        }
    }

    fn attributes<'a>(&self, raw: &'a str) -> HashMap<String, &'a str> {
        let Some(start) = ROW_START.find(raw) else {
            return HashMap::new();
        };
        // Quoted values are consumed whole by the pattern, so unescaped '<' and
        // '>' inside them do not end the element early.
        let element = &raw[start.end()..];

        let mut attrs = HashMap::new();
        for caps in ATTRIBUTE.captures_iter(element) {
            let name = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            attrs.entry(name).or_insert(value);
        }
        attrs
    }
}

impl Default for RowAttributeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordExtractor for RowAttributeExtractor {
    fn extract(&self, raw: &str) -> RecordFields {
        let attrs = self.attributes(raw);

        let tags = attrs
            .get(&self.tags_attr)
            .map(|value| split_tags(&decode_entities(value)));

        let created = match attrs.get(&self.date_attr) {
            None => FieldValue::Absent,
            Some(value) if value.trim().is_empty() => FieldValue::Absent,
            Some(value) => match parse_creation_date(value) {
                Some(instant) => FieldValue::Present(instant),
                None => FieldValue::Invalid((*value).to_string()),
            },
        };

        RecordFields { tags, created }
    }
}

/// Decode the XML entities and numeric character references used in the dump
pub fn decode_entities(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }
    ENTITY.replace_all(value, |caps: &Captures<'_>| {
        let entity = &caps[1];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
            }
            _ if entity.starts_with('#') => entity[1..].parse().ok().and_then(char::from_u32),
            _ => None,
        };
        match decoded {
            Some(c) => c.to_string(),
            None => caps[0].to_string(),
        }
    })
}

/// Split `<a><b-c>` into `{"a", "b-c"}`
pub fn split_tags(value: &str) -> BTreeSet<String> {
    TAG_TOKEN
        .captures_iter(value)
        .map(|caps| caps[1].trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Parse `yyyy-MM-ddTHH:mm:ss[.fff]` as a UTC instant
pub fn parse_creation_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let value = value.strip_suffix('Z').unwrap_or(value);
    NaiveDateTime::parse_from_str(value, CREATION_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
