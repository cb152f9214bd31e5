use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use anyhow::{bail, Context, Result};
use habit_core::{
    config::GlobalSettings,
    notice::{CollectingNoticeSink, Notice, NoticeLevel, NoticeSink},
    render,
    store::FsDocumentStore,
    DateId, Grid, HabitTracker,
};
use tracing::{debug, info};

const SETTINGS_DIR: &str = ".habitgrid";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) vault: PathBuf,
    pub(crate) settings_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn new(vault: impl Into<PathBuf>) -> Self {
        Self {
            vault: vault.into(),
            settings_path: None,
        }
    }

    pub fn from_env() -> Result<Self> {
        let vault = match std::env::var("HABITGRID_VAULT") {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => std::env::current_dir().context("unable to determine working directory")?,
        };
        let mut config = Self::new(vault);
        if let Ok(path) = std::env::var("HABITGRID_SETTINGS") {
            if !path.trim().is_empty() {
                config.settings_path = Some(PathBuf::from(path));
            }
        }
        Ok(config)
    }

    pub fn with_vault(mut self, vault: Option<PathBuf>) -> Self {
        if let Some(vault) = vault {
            self.vault = vault;
        }
        self
    }

    pub fn with_settings_path(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.settings_path = path;
        }
        self
    }

    pub fn vault(&self) -> &Path {
        &self.vault
    }

    pub fn settings_path(&self) -> PathBuf {
        self.settings_path
            .clone()
            .unwrap_or_else(|| self.vault.join(SETTINGS_DIR).join(SETTINGS_FILE))
    }

    /// Global settings; a missing or unreadable file yields the defaults.
    /// Anything other than a missing file is reported to `notices`.
    pub fn load_settings(&self, notices: &dyn NoticeSink) -> GlobalSettings {
        let path = self.settings_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return GlobalSettings::default();
            }
            Err(err) => {
                notices.notify(Notice::warning(format!(
                    "{}: {err}, using default settings",
                    path.display()
                )));
                return GlobalSettings::default();
            }
        };
        match GlobalSettings::from_json(&raw) {
            Ok(settings) => settings,
            Err(err) => {
                notices.notify(Notice::warning(format!(
                    "{}: {err}, using default settings",
                    path.display()
                )));
                GlobalSettings::default()
            }
        }
    }

    pub fn save_settings(&self, settings: &GlobalSettings) -> Result<()> {
        let path = self.settings_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("unable to create {}", parent.display()))?;
        }
        fs::write(&path, settings.to_json())
            .with_context(|| format!("unable to write {}", path.display()))?;
        info!(path = %path.display(), "settings saved");
        Ok(())
    }
}

/// Tracker bound to the configured vault, plus the sink its notices land in.
pub struct Session {
    store: Arc<FsDocumentStore>,
    tracker: HabitTracker,
    notices: Arc<CollectingNoticeSink>,
}

impl Session {
    pub fn open(config: &AppConfig, block: Option<&str>) -> Result<Self> {
        if !config.vault.is_dir() {
            bail!("vault `{}` is not a directory", config.vault.display());
        }
        let store = Arc::new(FsDocumentStore::new(&config.vault));
        let notices = Arc::new(CollectingNoticeSink::new());
        let settings = config.load_settings(notices.as_ref());
        let mut builder = HabitTracker::builder(store.clone())
            .with_notice_sink(notices.clone())
            .with_settings(settings);
        if let Some(block) = block {
            builder = builder.with_block(block);
        }
        let tracker = builder.build();
        info!(vault = %config.vault.display(), config = ?tracker.config(), "session opened");
        Ok(Self {
            store,
            tracker,
            notices,
        })
    }

    pub fn tracker(&self) -> &HabitTracker {
        &self.tracker
    }

    /// Prints pending notices to `err`.
    pub fn flush_notices(&self, err: &mut impl Write) -> Result<()> {
        print_notices(&self.notices, err)
    }
}

pub fn print_notices(notices: &CollectingNoticeSink, err: &mut impl Write) -> Result<()> {
    for notice in notices.take() {
        let label = match notice.level {
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        writeln!(err, "{label}: {}", notice.message)?;
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn format_grid(grid: &Grid, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => render::render_text(grid),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(grid).context("unable to encode grid")?;
            json.push('\n');
            json
        }
    })
}

pub fn show(
    session: &Session,
    today: DateId,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let grid = session.tracker.render(today)?;
    out.write_all(format_grid(&grid, format)?.as_bytes())?;
    Ok(())
}

pub fn toggle(
    session: &Session,
    path: &str,
    date: DateId,
    today: DateId,
    out: &mut impl Write,
) -> Result<()> {
    let path = normalize_habit_path(path);
    let row = session
        .tracker
        .toggle_cell(&path, date, today)
        .with_context(|| format!("unable to toggle {path} on {date}"))?;
    let ticked = row.cell(date).map(|cell| cell.ticked);
    let state = match ticked {
        Some(true) => "done",
        Some(false) => "not done",
        None => "updated (outside the displayed window)",
    };
    writeln!(
        out,
        "{} {date}: {state}, streak {}",
        row.name,
        row.current_streak()
    )?;
    Ok(())
}

pub fn new_habit(session: &Session, name: &str, out: &mut impl Write) -> Result<()> {
    let path = session.tracker.create_habit(name)?;
    writeln!(out, "created {path}")?;
    Ok(())
}

/// Re-renders the grid on every change to a markdown file in the vault
/// until the watcher channel closes.
pub fn watch(session: &Session, format: OutputFormat, out: &mut impl Write) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let _watcher = session.store.watch(move |paths| {
        if tx.send(paths).is_err() {
            debug!("watch receiver dropped");
        }
    })?;
    show(session, DateId::today(), format, out)?;
    session.flush_notices(&mut io::stderr())?;
    for changed in rx {
        info!(?changed, "vault changed, re-rendering");
        show(session, DateId::today(), format, out)?;
        session.flush_notices(&mut io::stderr())?;
    }
    Ok(())
}

/// Accepts paths with or without the `.md` suffix.
fn normalize_habit_path(path: &str) -> String {
    let trimmed = path.trim().trim_start_matches("./");
    if trimmed.ends_with(".md") {
        trimmed.to_string()
    } else {
        format!("{trimmed}.md")
    }
}

pub fn parse_date(raw: Option<&str>) -> Result<DateId> {
    match raw {
        None => Ok(DateId::today()),
        Some("today") => Ok(DateId::today()),
        Some("yesterday") => DateId::today()
            .pred()
            .context("no day before today"),
        Some(raw) => raw
            .parse()
            .with_context(|| format!("`{raw}` is not a YYYY-MM-DD date")),
    }
}
