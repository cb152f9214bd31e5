use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{GlobalSettings, TrackerConfig};
use crate::document::HabitDocument;
use crate::entries;
use crate::error::{HabitError, Result};
use crate::habit::{self, Habit, HabitRow};
use crate::notice::{Notice, NoticeSink, TracingNoticeSink};
use crate::store::DocumentStore;
use crate::window::{DateId, DisplayWindow, Weekday};

/// One habit grid bound to a document store. Nothing read from the store
/// is kept between calls.
pub struct HabitTracker {
    store: Arc<dyn DocumentStore>,
    notices: Arc<dyn NoticeSink>,
    config: TrackerConfig,
}

pub struct HabitTrackerBuilder {
    store: Arc<dyn DocumentStore>,
    notices: Option<Arc<dyn NoticeSink>>,
    settings: GlobalSettings,
    block: Option<String>,
}

impl HabitTrackerBuilder {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            notices: None,
            settings: GlobalSettings::default(),
            block: None,
        }
    }

    pub fn with_notice_sink(mut self, sink: Arc<dyn NoticeSink>) -> Self {
        self.notices = Some(sink);
        self
    }

    pub fn with_settings(mut self, settings: GlobalSettings) -> Self {
        self.settings = settings;
        self
    }

    /// JSON options of this grid, merged over the global settings.
    pub fn with_block(mut self, source: impl Into<String>) -> Self {
        self.block = Some(source.into());
        self
    }

    pub fn build(self) -> HabitTracker {
        let notices = self
            .notices
            .unwrap_or_else(|| Arc::new(TracingNoticeSink) as Arc<dyn NoticeSink>);
        let resolved = TrackerConfig::resolve(self.block.as_deref().unwrap_or(""), &self.settings);
        for warning in &resolved.warnings {
            notices.notify(Notice::warning(warning.to_string()));
        }
        HabitTracker {
            store: self.store,
            notices,
            config: resolved.config,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderCell {
    pub date: DateId,
    pub day_of_month: u32,
    pub weekday: Weekday,
    pub is_today: bool,
}

/// Render model of a whole grid. Hosts project it; they never read state
/// back from what they drew.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grid {
    pub config: TrackerConfig,
    pub header: Vec<HeaderCell>,
    pub rows: Vec<HabitRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<String>,
}

impl Grid {
    pub fn row(&self, path: &str) -> Option<&HabitRow> {
        self.rows.iter().find(|row| row.path == path)
    }
}

impl HabitTracker {
    pub fn builder(store: Arc<dyn DocumentStore>) -> HabitTrackerBuilder {
        HabitTrackerBuilder::new(store)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn window(&self, today: DateId) -> DisplayWindow {
        self.config.window(today)
    }

    /// Habit documents under the configured path.
    pub fn discover(&self) -> Result<Vec<String>> {
        let all = self.store.list_documents()?;
        Ok(habit::discover_habits(&all, &self.config.path))
    }

    /// Reads one habit fresh from the store. Decode problems are reported
    /// and leave the completion set empty.
    pub fn load_habit(&self, path: &str) -> Result<Habit> {
        let doc = self.store.load(path)?;
        let parsed = doc.entries();
        if let Some(warning) = parsed.warning {
            warn!(path, %warning, "habit entries unreadable");
            self.notices
                .notify(Notice::warning(format!("{path}: {warning}")));
        }
        Ok(Habit {
            path: path.to_string(),
            name: doc.display_name(self.config.title_property_name.as_deref()),
            entries: parsed.entries,
        })
    }

    pub fn render(&self, today: DateId) -> Result<Grid> {
        let window = self.window(today);
        if self.config.debug {
            info!(config = ?self.config, ?window, "habit tracker debug: render pass");
        }

        let paths = self.discover().map_err(|err| {
            self.notices
                .notify(Notice::error(format!("unable to list habits: {err}")));
            err
        })?;

        let header = window
            .visible()
            .into_iter()
            .map(|date| HeaderCell {
                date,
                day_of_month: date.day_of_month(),
                weekday: date.weekday(),
                is_today: date == today,
            })
            .collect();

        let empty_message = paths
            .is_empty()
            .then(|| format!("No habits found under {}", self.config.path));

        let rows: Vec<HabitRow> = paths
            .iter()
            .map(|path| self.render_row(path, today))
            .collect();

        info!(
            habits = rows.len(),
            days = window.days(),
            anchor = %window.anchor(),
            "habit grid rendered"
        );
        Ok(Grid {
            config: self.config.clone(),
            header,
            rows,
            empty_message,
        })
    }

    /// Renders one row. An unreadable document yields an empty row carrying
    /// the failure instead of an error.
    pub fn render_row(&self, path: &str, today: DateId) -> HabitRow {
        let window = self.window(today);
        let row = match self.load_habit(path) {
            Ok(habit) => HabitRow::build(&habit, &window, today),
            Err(err) => {
                warn!(path, %err, "skipping unreadable habit");
                self.notices
                    .notify(Notice::warning(format!("{path}: {err}")));
                HabitRow::unreadable(
                    path,
                    crate::document::file_stem(path),
                    &window,
                    today,
                    err.to_string(),
                )
            }
        };
        if self.config.debug {
            info!(path, row = ?row, "habit tracker debug: row");
        } else {
            debug!(path, streak = row.current_streak(), "habit row rendered");
        }
        row
    }

    /// Flips `date` for the habit at `path`, writes the document and
    /// returns the re-rendered row.
    pub fn toggle(
        &self,
        path: &str,
        date: DateId,
        currently_ticked: bool,
        today: DateId,
    ) -> Result<HabitRow> {
        let doc = self.store.load(path).map_err(|err| {
            self.report_error(format!("file missing while trying to toggle habit: {err}"));
            err
        })?;
        let updated = self.toggled_text(&doc, date, currently_ticked).map_err(|err| {
            self.report_error(format!("{path}: not toggling, {err}"));
            err
        })?;
        self.store.write(path, &updated).map_err(|err| {
            self.report_error(format!("could not save changes to {path}: {err}"));
            err
        })?;
        info!(path, %date, ticked = !currently_ticked, "habit toggled");
        Ok(self.render_row(path, today))
    }

    /// Like [`HabitTracker::toggle`], reading the current tick from the
    /// document first.
    pub fn toggle_cell(&self, path: &str, date: DateId, today: DateId) -> Result<HabitRow> {
        let ticked = self.load_habit(path)?.entries.contains(&date);
        self.toggle(path, date, ticked, today)
    }

    /// Creates an empty habit document next to the tracked ones and returns
    /// its path.
    pub fn create_habit(&self, name: &str) -> Result<String> {
        let path = habit::new_habit_path(&self.config.path, name).map_err(|err| {
            self.report_error(err.to_string());
            err
        })?;
        habit::new_habit_contents()
            .and_then(|contents| self.store.create(&path, &contents))
            .map_err(|err| {
                self.report_error(format!("could not create habit: {err}"));
                err
            })?;
        info!(path = %path, "habit created");
        Ok(path)
    }

    fn toggled_text(
        &self,
        doc: &HabitDocument,
        date: DateId,
        currently_ticked: bool,
    ) -> Result<String> {
        let fm = doc.writable_frontmatter()?;
        let current = entries::entries_from_frontmatter(&fm).entries;
        let next = entries::toggle(&current, date, currently_ticked);
        doc.with_entries(&next)
    }

    fn report_error(&self, message: String) {
        warn!(%message, "habit tracker operation failed");
        self.notices.notify(Notice::error(message));
    }
}

impl std::fmt::Debug for HabitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HabitTracker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::{CollectingNoticeSink, NoticeLevel};
    use crate::store::MemoryDocumentStore;

    fn d(raw: &str) -> DateId {
        raw.parse().unwrap()
    }

    fn tracker(
        store: MemoryDocumentStore,
        block: &str,
    ) -> (HabitTracker, Arc<MemoryDocumentStore>, Arc<CollectingNoticeSink>) {
        let store = Arc::new(store);
        let notices = Arc::new(CollectingNoticeSink::new());
        let tracker = HabitTracker::builder(store.clone())
            .with_notice_sink(notices.clone())
            .with_block(block)
            .build();
        (tracker, store, notices)
    }

    fn vault() -> MemoryDocumentStore {
        MemoryDocumentStore::new()
            .with_document(
                "Habits/run.md",
                "---\nentries:\n  - 2024-04-22\n  - 2024-04-23\n  - 2024-04-24\n---\n",
            )
            .with_document(
                "Habits/read.md",
                "---\ntitle: Read a chapter\nentries:\n  - 2024-04-22\n  - 2024-04-24\n---\nNotes\n",
            )
            .with_document("Journal/today.md", "# Today\n")
    }

    const BLOCK: &str = r#"{"path": "Habits", "daysToShow": 5, "lastDisplayedDate": "2024-04-24", "titlePropertyName": "title"}"#;

    #[test]
    fn renders_rows_with_streaks() {
        let (tracker, _, notices) = tracker(vault(), BLOCK);
        let grid = tracker.render(d("2024-04-24")).unwrap();

        assert!(grid.empty_message.is_none());
        assert_eq!(
            grid.header.iter().map(|h| h.day_of_month).collect::<Vec<_>>(),
            vec![20, 21, 22, 23, 24]
        );
        assert_eq!(grid.rows.len(), 2);
        assert_eq!(grid.rows[0].name, "Read a chapter");
        assert_eq!(grid.rows[1].name, "run");

        let run = grid.row("Habits/run.md").unwrap();
        let streaks: Vec<u32> = run.cells.iter().map(|c| c.streak).collect();
        assert_eq!(streaks, vec![0, 0, 1, 2, 3]);
        assert!(notices.is_empty());
    }

    #[test]
    fn empty_discovery_sets_message() {
        let (tracker, _, _) = tracker(vault(), r#"{"path": "Nowhere"}"#);
        let grid = tracker.render(d("2024-04-24")).unwrap();
        assert!(grid.rows.is_empty());
        assert_eq!(grid.empty_message.as_deref(), Some("No habits found under Nowhere"));
    }

    #[test]
    fn toggle_off_rewrites_document_and_row() {
        let (tracker, store, _) = tracker(vault(), BLOCK);
        let row = tracker
            .toggle("Habits/read.md", d("2024-04-24"), true, d("2024-04-24"))
            .unwrap();
        assert!(!row.cell(d("2024-04-24")).unwrap().ticked);
        assert_eq!(
            store.get("Habits/read.md").unwrap(),
            "---\nentries:\n  - 2024-04-22\ntitle: Read a chapter\n---\nNotes\n"
        );
    }

    #[test]
    fn toggle_cell_twice_is_identity_on_entries() {
        let (tracker, store, _) = tracker(vault(), BLOCK);
        let today = d("2024-04-24");
        let before = crate::entries::parse_entries(&store.get("Habits/run.md").unwrap()).entries;

        let row = tracker.toggle_cell("Habits/run.md", d("2024-04-21"), today).unwrap();
        let cell = row.cell(d("2024-04-21")).unwrap();
        assert!(cell.ticked);
        assert_eq!(row.current_streak(), 4);

        tracker.toggle_cell("Habits/run.md", d("2024-04-21"), today).unwrap();
        let after = crate::entries::parse_entries(&store.get("Habits/run.md").unwrap()).entries;
        assert_eq!(before, after);
    }

    #[test]
    fn malformed_document_renders_empty_and_refuses_toggle() {
        let store = vault().with_document("Habits/broken.md", "---\nentries:\n  - 2024-04-24\n");
        let (tracker, store, notices) = tracker(store, BLOCK);

        let grid = tracker.render(d("2024-04-24")).unwrap();
        let broken = grid.row("Habits/broken.md").unwrap();
        assert!(broken.cells.iter().all(|c| !c.ticked));
        assert_eq!(notices.take().len(), 1);

        let err = tracker
            .toggle("Habits/broken.md", d("2024-04-23"), false, d("2024-04-24"))
            .unwrap_err();
        assert!(matches!(err, HabitError::MalformedFrontmatter { .. }));
        assert_eq!(
            store.get("Habits/broken.md").unwrap(),
            "---\nentries:\n  - 2024-04-24\n"
        );
        let notices = notices.take();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
    }

    #[test]
    fn toggles_documents_with_rich_frontmatter() {
        let raw = "---\ndescription: |\n  Ten minutes\n  every morning\nreminder:\n  time: \"07:00\"\nentries:\n  - 2024-04-24\n---\nBody\n";
        let store = vault().with_document("Habits/meditate.md", raw);
        let (tracker, store, notices) = tracker(store, BLOCK);

        let grid = tracker.render(d("2024-04-24")).unwrap();
        let row = grid.row("Habits/meditate.md").unwrap();
        assert!(row.cell(d("2024-04-24")).unwrap().ticked);
        assert!(row.warning.is_none());

        let row = tracker
            .toggle_cell("Habits/meditate.md", d("2024-04-23"), d("2024-04-24"))
            .unwrap();
        assert_eq!(row.current_streak(), 2);
        assert!(notices.is_empty());

        let written = store.get("Habits/meditate.md").unwrap();
        assert!(written.ends_with("---\nBody\n"));
        let before = crate::frontmatter::Frontmatter::from_document(raw).unwrap();
        let after = crate::frontmatter::Frontmatter::from_document(&written).unwrap();
        assert_eq!(after.get("description"), before.get("description"));
        assert_eq!(after.get("reminder"), before.get("reminder"));
        assert_eq!(
            crate::entries::parse_entries(&written).entries,
            [d("2024-04-23"), d("2024-04-24")].into_iter().collect()
        );
    }

    #[test]
    fn oversized_window_is_capped_when_rendering() {
        let (tracker, _, notices) = tracker(
            vault(),
            r#"{"path": "Habits", "daysToShow": 18446744073709551615, "lastDisplayedDate": "2024-04-24"}"#,
        );
        assert_eq!(tracker.config().days_to_show, crate::window::MAX_DAYS_TO_SHOW);
        assert_eq!(notices.len(), 1);
        let row = tracker.render_row("Habits/run.md", d("2024-04-24"));
        assert_eq!(row.cells.len(), crate::window::MAX_DAYS_TO_SHOW);
        assert_eq!(row.current_streak(), 3);
    }

    struct ReadOnlyStore(MemoryDocumentStore);

    impl DocumentStore for ReadOnlyStore {
        fn list_documents(&self) -> Result<Vec<String>> {
            self.0.list_documents()
        }
        fn read(&self, path: &str) -> Result<String> {
            self.0.read(path)
        }
        fn write(&self, path: &str, _contents: &str) -> Result<()> {
            Err(HabitError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            ))
        }
        fn create(&self, path: &str, contents: &str) -> Result<()> {
            self.0.create(path, contents)
        }
    }

    #[test]
    fn write_failure_is_reported() {
        let notices = Arc::new(CollectingNoticeSink::new());
        let tracker = HabitTracker::builder(Arc::new(ReadOnlyStore(vault())))
            .with_notice_sink(notices.clone())
            .with_block(BLOCK)
            .build();
        let err = tracker
            .toggle("Habits/run.md", d("2024-04-20"), false, d("2024-04-24"))
            .unwrap_err();
        assert!(matches!(err, HabitError::Io { .. }));
        let notices = notices.take();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].message.contains("could not save changes"));
    }

    #[test]
    fn missing_document_toggle_is_reported() {
        let (tracker, _, notices) = tracker(vault(), BLOCK);
        let err = tracker
            .toggle("Habits/gone.md", d("2024-04-20"), false, d("2024-04-24"))
            .unwrap_err();
        assert!(matches!(err, HabitError::DocumentNotFound(_)));
        assert_eq!(notices.len(), 1);
    }

    #[test]
    fn bad_block_warns_and_uses_defaults() {
        let (tracker, _, notices) = tracker(vault(), "{bad json");
        assert_eq!(tracker.config().path, "");
        assert_eq!(tracker.config().days_to_show, crate::config::DEFAULT_DAYS_TO_SHOW);
        assert_eq!(notices.len(), 1);
        let grid = tracker.render(d("2024-04-24")).unwrap();
        assert_eq!(grid.rows.len(), 3);
    }

    #[test]
    fn creates_habit_in_configured_folder() {
        let (tracker, store, _) = tracker(vault(), BLOCK);
        let path = tracker.create_habit("Stretch").unwrap();
        assert_eq!(path, "Habits/Stretch.md");
        assert_eq!(store.get(&path).unwrap(), "---\nentries: []\n---\n");
        assert!(matches!(
            tracker.create_habit("Stretch"),
            Err(HabitError::DocumentExists(_))
        ));
    }
}
