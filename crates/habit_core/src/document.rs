use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::entries::{self, CompletionSet, ParsedEntries, ENTRIES_KEY};
use crate::error::{HabitError, Result};
use crate::frontmatter::{self, Frontmatter};
use crate::store::is_markdown;

/// Markdown habit document as read from the store. Frontmatter is decoded
/// on demand.
#[derive(Debug, Clone, Serialize)]
pub struct HabitDocument {
    path: String,
    raw: String,
}

impl HabitDocument {
    pub fn from_string(path: impl Into<String>, raw: String) -> Self {
        Self {
            path: path.into(),
            raw,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn frontmatter(&self) -> Result<Frontmatter> {
        Frontmatter::from_document(&self.raw)
    }

    pub fn entries(&self) -> ParsedEntries {
        entries::parse_entries(&self.raw)
    }

    /// Display name: the `title_property` string field when present and
    /// non-empty, the file stem otherwise.
    pub fn display_name(&self, title_property: Option<&str>) -> String {
        title_property
            .and_then(|key| {
                self.frontmatter()
                    .ok()
                    .and_then(|fm| fm.string_field(key).map(str::trim).map(str::to_string))
            })
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| file_stem(&self.path))
    }

    /// Frontmatter to rewrite. A document without a block starts from an
    /// empty one; a malformed block is an error so its contents survive.
    pub fn writable_frontmatter(&self) -> Result<Frontmatter> {
        match self.frontmatter() {
            Ok(fm) => Ok(fm),
            Err(HabitError::MissingFrontmatter) => Ok(Frontmatter::new()),
            Err(err) => Err(err),
        }
    }

    /// Document text with `entries` replaced by `completions`. Entry items
    /// that are not dates are carried over.
    pub fn with_entries(&self, completions: &CompletionSet) -> Result<String> {
        let mut fm = self.writable_frontmatter()?;
        let mut value = entries::entries_value(completions);
        if let Value::Array(items) = &mut value {
            items.extend(entries::foreign_items(&fm));
        }
        fm.insert(ENTRIES_KEY, value);
        frontmatter::apply_frontmatter(&self.raw, &fm)
    }
}

pub fn file_stem(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    let stem = Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|_| is_markdown(Path::new(name)));
    stem.unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(raw: &str) -> crate::window::DateId {
        raw.parse().unwrap()
    }

    #[test]
    fn display_name_prefers_title_property() {
        let doc = HabitDocument::from_string(
            "Habits/Good/meditate.md",
            "---\ntitle: Morning meditation\nentries: []\n---\n".to_string(),
        );
        assert_eq!(doc.display_name(None), "meditate");
        assert_eq!(doc.display_name(Some("title")), "Morning meditation");
        assert_eq!(doc.display_name(Some("missing")), "meditate");
    }

    #[test]
    fn blank_title_falls_back_to_stem() {
        let doc = HabitDocument::from_string("walk.md", "---\ntitle: \"  \"\n---\n".to_string());
        assert_eq!(doc.display_name(Some("title")), "walk");
    }

    #[test]
    fn with_entries_keeps_other_fields_and_body() {
        let doc = HabitDocument::from_string(
            "read.md",
            "---\ntitle: Read\nentries:\n  - 2024-04-22\n---\n# Reading log\n".to_string(),
        );
        let completions: CompletionSet = [d("2024-04-22"), d("2024-04-21")].into_iter().collect();
        let updated = doc.with_entries(&completions).unwrap();
        assert_eq!(
            updated,
            "---\nentries:\n  - 2024-04-21\n  - 2024-04-22\ntitle: Read\n---\n# Reading log\n"
        );
    }

    #[test]
    fn with_entries_refuses_malformed_block() {
        let doc = HabitDocument::from_string("x.md", "---\n  broken: [\n---\n".to_string());
        assert!(doc.with_entries(&CompletionSet::new()).is_err());
    }

    #[test]
    fn with_entries_keeps_foreign_items() {
        let doc = HabitDocument::from_string(
            "x.md",
            "---\nentries:\n  - someday\n  - 2024-01-01\n---\n".to_string(),
        );
        let updated = doc.with_entries(&CompletionSet::new()).unwrap();
        assert_eq!(updated, "---\nentries:\n  - someday\n---\n");
    }

    #[test]
    fn with_entries_adds_block_when_missing() {
        let doc = HabitDocument::from_string("x.md", "plain note\n".to_string());
        let updated = doc.with_entries(&[d("2024-01-01")].into_iter().collect()).unwrap();
        assert_eq!(updated, "---\nentries:\n  - 2024-01-01\n---\nplain note\n");
    }

    #[test]
    fn file_stem_strips_folders_and_extension() {
        assert_eq!(file_stem("Habits/Good/run.md"), "run");
        assert_eq!(file_stem("notes"), "notes");
        assert_eq!(file_stem("Habits/Run.MD"), "Run");
        assert_eq!(file_stem("Habits/v1.2"), "v1.2");
    }
}
