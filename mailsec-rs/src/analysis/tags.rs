//! Tag-list parsing shared by DMARC and DKIM records
//!
//! Parsing is a two-stage pipeline:
//!
//! 1. [`parse_tag_list`], a strict RFC 6376 style `tag=value;` parser. It
//!    gives up (returns `None`) on a segment without `=`, an empty tag name,
//!    a duplicated tag, or a record with no tags at all.
//! 2. [`parse_lenient`], which strips all whitespace, drops segments it
//!    cannot split and lets later duplicates win.
//!
//! [`parse_policy`] runs stage one and falls back to stage two when stage one
//! returns `None` or its output is rejected by the caller's `accept` check.
//! Both stages feed their pairs through the same [`TagTable`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Value of a single tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Int(u32),
    List(Vec<String>),
    Text(String),
}

impl TagValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TagValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<u32> {
        match self {
            TagValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            TagValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Parsed record: lower-cased tag name to value
///
/// Tags without a handler are kept verbatim as [`TagValue::Text`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParsedPolicy {
    tags: BTreeMap<String, TagValue>,
}

impl ParsedPolicy {
    pub fn get(&self, tag: &str) -> Option<&TagValue> {
        self.tags.get(tag)
    }

    pub fn text(&self, tag: &str) -> Option<&str> {
        self.get(tag).and_then(TagValue::as_text)
    }

    pub fn int(&self, tag: &str) -> Option<u32> {
        self.get(tag).and_then(TagValue::as_int)
    }

    pub fn list(&self, tag: &str) -> Option<&[String]> {
        self.get(tag).and_then(TagValue::as_list)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TagValue)> {
        self.tags.iter()
    }

    pub fn insert(&mut self, tag: impl Into<String>, value: TagValue) {
        self.tags.insert(tag.into(), value);
    }
}

/// Converts a raw tag value
pub type TagParser = fn(&str) -> TagValue;

/// Static lookup table from tag name to its value parser
pub type TagTable = &'static [(&'static str, TagParser)];

pub fn text_value(raw: &str) -> TagValue {
    TagValue::Text(raw.to_string())
}

/// Comma-separated list, each item trimmed, empty items dropped
pub fn list_value(raw: &str) -> TagValue {
    TagValue::List(
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Colon-separated list, as used by DKIM `h=` and `s=`
pub fn colon_list_value(raw: &str) -> TagValue {
    TagValue::List(
        raw.split(':')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Stage one: strict tag-list parser
pub fn parse_tag_list(record: &str) -> Option<Vec<(String, String)>> {
    let mut pairs: Vec<(String, String)> = Vec::new();

    for segment in record.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let (tag, value) = segment.split_once('=')?;
        let tag = tag.trim().to_ascii_lowercase();
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return None;
        }
        if pairs.iter().any(|(existing, _)| *existing == tag) {
            return None;
        }

        pairs.push((tag, value.trim().to_string()));
    }

    if pairs.is_empty() {
        None
    } else {
        Some(pairs)
    }
}

/// Stage two: whitespace-insensitive fallback parser
pub fn parse_lenient(record: &str) -> Vec<(String, String)> {
    let compact: String = record.chars().filter(|c| !c.is_whitespace()).collect();

    compact
        .split(';')
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| segment.split_once('='))
        .map(|(tag, value)| (tag.to_ascii_lowercase(), value.to_string()))
        .collect()
}

/// Apply the table to raw pairs; unknown tags are stored verbatim
pub fn build_policy(pairs: Vec<(String, String)>, table: TagTable) -> ParsedPolicy {
    let mut policy = ParsedPolicy::default();

    for (tag, raw) in pairs {
        let value = match table.iter().find(|(name, _)| *name == tag) {
            Some((_, parser)) => parser(&raw),
            None => TagValue::Text(raw),
        };
        policy.insert(tag, value);
    }

    policy
}

/// Run the two-stage pipeline
///
/// Falls back to the lenient parser when the strict parser gives up or when
/// `accept` rejects its result.
pub fn parse_policy<F>(record: &str, table: TagTable, accept: F) -> ParsedPolicy
where
    F: Fn(&ParsedPolicy) -> bool,
{
    parse_tag_list(record)
        .map(|pairs| build_policy(pairs, table))
        .filter(|policy| accept(policy))
        .unwrap_or_else(|| {
            debug!("Strict tag-list parse rejected, using lenient parser");
            build_policy(parse_lenient(record), table)
        })
}
