use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::entries::{self, CompletionSet};
use crate::error::{HabitError, Result};
use crate::store::is_markdown;
use crate::window::{self, DateId, DisplayWindow, Weekday};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Habit {
    pub path: String,
    pub name: String,
    pub entries: CompletionSet,
}

/// Markdown paths whose vault path contains `filter`, ordered by file name
/// and then by full path. An empty filter matches every document.
pub fn discover_habits(paths: &[String], filter: &str) -> Vec<String> {
    let mut habits: Vec<&String> = paths
        .iter()
        .filter(|path| is_markdown(Path::new(path.as_str())))
        .filter(|path| path.contains(filter))
        .collect();
    habits.sort_by(|a, b| {
        file_name(a)
            .to_lowercase()
            .cmp(&file_name(b).to_lowercase())
            .then_with(|| a.cmp(b))
    });
    habits.into_iter().cloned().collect()
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub date: DateId,
    pub ticked: bool,
    pub streak: u32,
    pub weekday: Weekday,
    pub is_today: bool,
    pub label: String,
    /// Label plus the running streak, e.g. `April 20, 2024 · 3 days streak`.
    pub tooltip: String,
}

fn tooltip(label: &str, streak: u32) -> String {
    if streak == 0 {
        return label.to_string();
    }
    format!(
        "{label} · {streak} {} streak",
        window::pluralize(streak, "day", None)
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitRow {
    pub path: String,
    pub name: String,
    pub cells: Vec<Cell>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl HabitRow {
    pub fn build(habit: &Habit, window: &DisplayWindow, today: DateId) -> Self {
        Self::from_entries(
            habit.path.clone(),
            habit.name.clone(),
            &habit.entries,
            window,
            today,
        )
    }

    /// Row for a habit whose document could not be read.
    pub fn unreadable(
        path: impl Into<String>,
        name: impl Into<String>,
        window: &DisplayWindow,
        today: DateId,
        warning: impl Into<String>,
    ) -> Self {
        let mut row = Self::from_entries(
            path.into(),
            name.into(),
            &CompletionSet::new(),
            window,
            today,
        );
        row.warning = Some(warning.into());
        row
    }

    fn from_entries(
        path: String,
        name: String,
        entries: &CompletionSet,
        window: &DisplayWindow,
        today: DateId,
    ) -> Self {
        // the hidden lookback day seeds the first visible streak
        let dates = window.with_lookback();
        let streaks = window::streaks(entries, &dates);
        let cells = dates
            .iter()
            .zip(streaks)
            .skip(1)
            .map(|(date, streak)| {
                let label = window::pretty_date(*date, today);
                Cell {
                    date: *date,
                    ticked: entries.contains(date),
                    streak,
                    weekday: date.weekday(),
                    is_today: *date == today,
                    tooltip: tooltip(&label, streak),
                    label,
                }
            })
            .collect();
        Self {
            path,
            name,
            cells,
            warning: None,
        }
    }

    pub fn cell(&self, date: DateId) -> Option<&Cell> {
        self.cells.iter().find(|cell| cell.date == date)
    }

    pub fn current_streak(&self) -> u32 {
        self.cells.last().map(|cell| cell.streak).unwrap_or(0)
    }
}

/// Vault path for a new habit called `name` next to the habits matched by
/// `path`. A `path` naming a single document uses that document's folder.
pub fn new_habit_path(path: &str, name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(HabitError::InvalidHabitName("name is required".to_string()));
    }
    if name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(HabitError::InvalidHabitName(format!(
            "`{name}` cannot contain path separators or start with a dot"
        )));
    }

    let trimmed = path.trim().trim_matches('/');
    let folder = if is_markdown(Path::new(trimmed)) {
        trimmed.rsplit_once('/').map(|(folder, _)| folder).unwrap_or("")
    } else {
        trimmed
    };
    let file = if is_markdown(Path::new(name)) {
        name.to_string()
    } else {
        format!("{name}.md")
    };
    Ok(if folder.is_empty() {
        file
    } else {
        format!("{folder}/{file}")
    })
}

/// Initial contents of a new habit document.
pub fn new_habit_contents() -> Result<String> {
    entries::serialize(&CompletionSet::new(), &BTreeMap::new())
}
