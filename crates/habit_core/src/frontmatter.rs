//! YAML frontmatter fenced by `---` lines at the top of a markdown
//! document. Fields are held as JSON values so other fields pass through a
//! rewrite untouched.

use std::collections::BTreeMap;
use std::ops::Range;

use serde::Serialize;
use serde_json::Value;

use crate::error::{HabitError, Result};

pub const DELIMITER: &str = "---";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frontmatter {
    fields: BTreeMap<String, Value>,
}

/// Byte ranges of a frontmatter block inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BlockSpan {
    inner: Range<usize>,
    end: usize,
    first_line: usize,
}

impl Frontmatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }

    /// Reads the block at the top of `raw`.
    pub fn from_document(raw: &str) -> Result<Self> {
        let span = locate(raw)?.ok_or(HabitError::MissingFrontmatter)?;
        parse_block(&raw[span.inner], span.first_line)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn string_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(key.into(), value)
    }

    /// Renders the block including both delimiter lines, keys in ascending
    /// order.
    pub fn render(&self) -> Result<String> {
        let mut out = format!("{DELIMITER}\n");
        for (key, value) in &self.fields {
            out.push_str(&render_field(key, value)?);
        }
        out.push_str(DELIMITER);
        out.push('\n');
        Ok(out)
    }
}

/// Returns the document with its frontmatter replaced by `frontmatter`, or
/// prefixed with it when the document had none. The body is kept as is.
pub fn apply_frontmatter(raw: &str, frontmatter: &Frontmatter) -> Result<String> {
    let rendered = frontmatter.render()?;
    match locate(raw)? {
        Some(span) => Ok(format!("{rendered}{}", &raw[span.end..])),
        None => Ok(format!("{rendered}{raw}")),
    }
}

fn locate(raw: &str) -> Result<Option<BlockSpan>> {
    let start = if raw.starts_with('\u{feff}') { 3 } else { 0 };
    let mut lines = raw[start..].split_inclusive('\n');
    let Some(first) = lines.next() else {
        return Ok(None);
    };
    if first.trim_end() != DELIMITER {
        return Ok(None);
    }

    let inner_start = start + first.len();
    let mut offset = inner_start;
    let mut line_no = 1;
    for line in lines {
        line_no += 1;
        if line.trim_end() == DELIMITER {
            return Ok(Some(BlockSpan {
                inner: inner_start..offset,
                end: offset + line.len(),
                first_line: 2,
            }));
        }
        offset += line.len();
    }
    Err(HabitError::MalformedFrontmatter {
        line: line_no,
        reason: "frontmatter block is not terminated".to_string(),
    })
}

fn parse_block(block: &str, first_line: usize) -> Result<Frontmatter> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(block).map_err(|err| {
        let line = err
            .location()
            .map_or(first_line, |loc| first_line + loc.line().saturating_sub(1));
        HabitError::MalformedFrontmatter {
            line,
            reason: err.to_string(),
        }
    })?;
    let malformed = |reason: String| HabitError::MalformedFrontmatter {
        line: first_line,
        reason,
    };
    match serde_json::to_value(&yaml).map_err(|err| malformed(err.to_string()))? {
        Value::Null => Ok(Frontmatter::new()),
        Value::Object(map) => Ok(Frontmatter {
            fields: map.into_iter().collect(),
        }),
        other => Err(malformed(format!("expected `key: value` fields, found {other}"))),
    }
}

/// One field of the block. Lists of one-line scalars keep the indented
/// `  - item` form; every other value is laid out by serde_yaml.
fn render_field(key: &str, value: &Value) -> Result<String> {
    if let Value::Array(items) = value {
        if !items.is_empty() {
            let key_line = inline_scalar(&Value::String(key.to_string()))?;
            let lines = items
                .iter()
                .map(inline_scalar)
                .collect::<Result<Option<Vec<String>>>>()?;
            if let (Some(key_line), Some(lines)) = (key_line, lines) {
                let mut out = format!("{key_line}:\n");
                for line in lines {
                    out.push_str(&format!("  - {line}\n"));
                }
                return Ok(out);
            }
        }
    }
    let mut single = BTreeMap::new();
    single.insert(key, value);
    Ok(serde_yaml::to_string(&single)?)
}

/// Scalar encoded on a single line, or `None` when it needs more.
fn inline_scalar(value: &Value) -> Result<Option<String>> {
    if value.is_array() || value.is_object() {
        return Ok(None);
    }
    let encoded = serde_yaml::to_string(value)?;
    let encoded = encoded.trim_end_matches('\n');
    Ok((!encoded.contains('\n')).then(|| encoded.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_scalars_and_lists() {
        let raw = "---\ntitle: Drink water\ncount: 3\nratio: 0.5\ndone: false\nentries:\n  - 2024-04-22\n  - 2024-04-23\ntags: [health, daily]\nnotes:\n---\nbody text\n";
        let fm = Frontmatter::from_document(raw).unwrap();
        assert_eq!(fm.string_field("title"), Some("Drink water"));
        assert_eq!(fm.get("count"), Some(&json!(3)));
        assert_eq!(fm.get("ratio"), Some(&json!(0.5)));
        assert_eq!(fm.get("done"), Some(&json!(false)));
        assert_eq!(fm.get("entries"), Some(&json!(["2024-04-22", "2024-04-23"])));
        assert_eq!(fm.get("tags"), Some(&json!(["health", "daily"])));
        assert_eq!(fm.get("notes"), Some(&Value::Null));
    }

    #[test]
    fn quoted_strings_and_comments() {
        let fm = Frontmatter::from_document("---\na: \"yes: no\"\nb: 'it''s'\nc: plain # trailing\n---\n")
            .unwrap();
        assert_eq!(fm.string_field("a"), Some("yes: no"));
        assert_eq!(fm.string_field("b"), Some("it's"));
        assert_eq!(fm.string_field("c"), Some("plain"));
    }

    #[test]
    fn reads_block_scalars_and_nested_maps() {
        let raw = "---\ndescription: |\n  Ten minutes\n  every morning\nreminder:\n  time: \"07:00\"\n  days: [mon, wed]\nentries:\n  - 2024-04-24\n---\n";
        let fm = Frontmatter::from_document(raw).unwrap();
        assert_eq!(fm.string_field("description"), Some("Ten minutes\nevery morning\n"));
        assert_eq!(
            fm.get("reminder"),
            Some(&json!({"time": "07:00", "days": ["mon", "wed"]}))
        );
        assert_eq!(fm.get("entries"), Some(&json!(["2024-04-24"])));
    }

    #[test]
    fn missing_and_unterminated_blocks() {
        assert!(matches!(
            Frontmatter::from_document("# Just a note\n"),
            Err(HabitError::MissingFrontmatter)
        ));
        assert!(matches!(
            Frontmatter::from_document("---\nentries:\n  - 2024-01-01\n"),
            Err(HabitError::MalformedFrontmatter { .. })
        ));
        assert_eq!(Frontmatter::from_document("---\n---\n").unwrap(), Frontmatter::new());
    }

    #[test]
    fn rejects_invalid_yaml() {
        let err = Frontmatter::from_document("---\ntitle: ok\ntags: [one\n---\n").unwrap_err();
        match err {
            HabitError::MalformedFrontmatter { line, .. } => assert!(line >= 2, "line {line}"),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(Frontmatter::from_document("---\na: 1\na: 2\n---\n").is_err());
        assert!(Frontmatter::from_document("---\njust words\n---\n").is_err());
        assert!(Frontmatter::from_document("---\n- a\n- b\n---\n").is_err());
    }

    #[test]
    fn renders_sorted_block() {
        let mut fm = Frontmatter::new();
        fm.insert("zeta", json!("last"));
        fm.insert("entries", json!(["2024-04-22", "2024-04-24"]));
        fm.insert("alpha", json!(true));
        fm.insert("empty", json!([]));
        fm.insert("numeric", json!("42"));
        assert_eq!(
            fm.render().unwrap(),
            "---\nalpha: true\nempty: []\nentries:\n  - 2024-04-22\n  - 2024-04-24\nnumeric: '42'\nzeta: last\n---\n"
        );
    }

    #[test]
    fn render_then_parse_preserves_values() {
        let mut fm = Frontmatter::new();
        fm.insert("title", json!("Run: 5k #1"));
        fm.insert("flag", json!("true"));
        fm.insert("nothing", Value::Null);
        fm.insert("score", json!(-7));
        fm.insert("padded", json!(" spaced "));
        fm.insert("nested", json!({"k": [1, 2]}));
        fm.insert("story", json!("line one\nline two\n"));
        fm.insert("mixed", json!(["plain", {"deep": true}]));
        let parsed = Frontmatter::from_document(&fm.render().unwrap()).unwrap();
        assert_eq!(parsed, fm);
    }

    #[test]
    fn apply_replaces_or_prepends_block() {
        let mut fm = Frontmatter::new();
        fm.insert("entries", json!(["2024-01-02"]));

        let with_block = "---\nentries: []\n---\n# Habit\n\nnotes\n";
        assert_eq!(
            apply_frontmatter(with_block, &fm).unwrap(),
            "---\nentries:\n  - 2024-01-02\n---\n# Habit\n\nnotes\n"
        );

        let without = "# Habit\n";
        assert_eq!(
            apply_frontmatter(without, &fm).unwrap(),
            "---\nentries:\n  - 2024-01-02\n---\n# Habit\n"
        );
    }

    #[test]
    fn handles_crlf_documents() {
        let raw = "---\r\nentries:\r\n  - 2024-01-01\r\n---\r\nbody\r\n";
        let fm = Frontmatter::from_document(raw).unwrap();
        assert_eq!(fm.get("entries"), Some(&json!(["2024-01-01"])));
        assert_eq!(apply_frontmatter(raw, &fm).unwrap(), "---\nentries:\n  - 2024-01-01\n---\nbody\r\n");
    }
}
