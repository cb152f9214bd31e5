use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::error::{HabitError, Result};
use crate::frontmatter::Frontmatter;
use crate::window::DateId;

pub const ENTRIES_KEY: &str = "entries";

pub type CompletionSet = BTreeSet<DateId>;

/// Completion set read from a document. `warning` is set when the block was
/// absent or could not be decoded; the set is then empty.
#[derive(Debug, Default)]
pub struct ParsedEntries {
    pub entries: CompletionSet,
    pub warning: Option<HabitError>,
}

pub fn parse_entries(raw: &str) -> ParsedEntries {
    match Frontmatter::from_document(raw) {
        Ok(frontmatter) => entries_from_frontmatter(&frontmatter),
        Err(err) => ParsedEntries {
            entries: CompletionSet::new(),
            warning: Some(err),
        },
    }
}

/// Reads the `entries` field. A scalar counts as a single entry; items that
/// are not canonical dates are skipped and reported.
pub fn entries_from_frontmatter(frontmatter: &Frontmatter) -> ParsedEntries {
    let mut entries = CompletionSet::new();
    let mut invalid = Vec::new();
    for item in entry_items(frontmatter) {
        match as_date(item) {
            Some(date) => {
                entries.insert(date);
            }
            None => invalid.push(match item {
                Value::String(raw) => raw.clone(),
                other => other.to_string(),
            }),
        }
    }

    ParsedEntries {
        entries,
        warning: (!invalid.is_empty()).then_some(HabitError::InvalidEntries(invalid)),
    }
}

/// Items of the `entries` field that are not dates, kept verbatim so a
/// rewrite does not drop them.
pub fn foreign_items(frontmatter: &Frontmatter) -> Vec<Value> {
    entry_items(frontmatter)
        .into_iter()
        .filter(|item| as_date(item).is_none())
        .cloned()
        .collect()
}

fn entry_items(frontmatter: &Frontmatter) -> Vec<&Value> {
    match frontmatter.get(ENTRIES_KEY) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

fn as_date(item: &Value) -> Option<DateId> {
    item.as_str().and_then(|raw| raw.parse().ok())
}

pub fn toggle(completions: &CompletionSet, date: DateId, currently_ticked: bool) -> CompletionSet {
    let mut next = completions.clone();
    if currently_ticked {
        next.remove(&date);
    } else {
        next.insert(date);
    }
    next
}

pub fn entries_value(entries: &CompletionSet) -> Value {
    Value::Array(
        entries
            .iter()
            .map(|date| Value::String(date.to_string()))
            .collect(),
    )
}

/// Full metadata block holding `entries` next to the untouched other fields.
pub fn serialize(
    entries: &CompletionSet,
    other_fields: &BTreeMap<String, Value>,
) -> Result<String> {
    let mut fields = other_fields.clone();
    fields.insert(ENTRIES_KEY.to_string(), entries_value(entries));
    Frontmatter::from_fields(fields).render()
}
