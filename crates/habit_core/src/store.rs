use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use walkdir::{DirEntry, WalkDir};

use crate::document::HabitDocument;
use crate::error::{HabitError, Result};

/// Host-owned document storage. Paths are vault-relative and `/` separated.
pub trait DocumentStore: Send + Sync {
    /// Every markdown document in the vault.
    fn list_documents(&self) -> Result<Vec<String>>;

    fn read(&self, path: &str) -> Result<String>;

    /// Overwrites an existing document.
    fn write(&self, path: &str, contents: &str) -> Result<()>;

    /// Creates a new document, failing if one already exists.
    fn create(&self, path: &str, contents: &str) -> Result<()>;

    fn load(&self, path: &str) -> Result<HabitDocument> {
        Ok(HabitDocument::from_string(path, self.read(path)?))
    }
}

/// Markdown vault on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Calls `on_change` with the markdown documents touched by each
    /// filesystem event. The watch lasts as long as the returned watcher.
    pub fn watch<F>(&self, on_change: F) -> Result<RecommendedWatcher>
    where
        F: Fn(Vec<String>) + Send + 'static,
    {
        let root = self.root.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    tracing::debug!(?event, "filesystem change detected");
                    let changed: Vec<String> = event
                        .paths
                        .iter()
                        .filter(|path| is_markdown(path))
                        .filter_map(|path| relative_path(&root, path))
                        .collect();
                    if !changed.is_empty() {
                        on_change(changed);
                    }
                }
                Err(err) => tracing::warn!(%err, "vault watch error"),
            }
        })?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        Ok(watcher)
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|part| !matches!(part, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(HabitError::DocumentNotFound(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl DocumentStore for FsDocumentStore {
    fn list_documents(&self) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        let walker = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));
        for entry in walker {
            let entry = entry.map_err(|err| {
                let path = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| self.root.display().to_string());
                HabitError::io(path, err.into())
            })?;
            if entry.file_type().is_file() && is_markdown(entry.path()) {
                if let Some(relative) = relative_path(&self.root, entry.path()) {
                    paths.push(relative);
                }
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn read(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        fs::read_to_string(&full).map_err(|err| match err.kind() {
            ErrorKind::NotFound => HabitError::DocumentNotFound(path.to_string()),
            _ => HabitError::io(path, err),
        })
    }

    fn write(&self, path: &str, contents: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if !full.is_file() {
            return Err(HabitError::DocumentNotFound(path.to_string()));
        }
        fs::write(&full, contents).map_err(|err| HabitError::io(path, err))
    }

    fn create(&self, path: &str, contents: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|err| HabitError::io(path, err))?;
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .map_err(|err| match err.kind() {
                ErrorKind::AlreadyExists => HabitError::DocumentExists(path.to_string()),
                _ => HabitError::io(path, err),
            })?;
        file.write_all(contents.as_bytes())
            .map_err(|err| HabitError::io(path, err))
    }
}

/// Documents held in memory, for embedding hosts and tests.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<BTreeMap<String, String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.documents.write().insert(path.into(), contents.into());
        self
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.documents.read().get(path).cloned()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn list_documents(&self) -> Result<Vec<String>> {
        Ok(self
            .documents
            .read()
            .keys()
            .filter(|path| is_markdown(Path::new(path.as_str())))
            .cloned()
            .collect())
    }

    fn read(&self, path: &str) -> Result<String> {
        self.get(path)
            .ok_or_else(|| HabitError::DocumentNotFound(path.to_string()))
    }

    fn write(&self, path: &str, contents: &str) -> Result<()> {
        let mut docs = self.documents.write();
        let doc = docs
            .get_mut(path)
            .ok_or_else(|| HabitError::DocumentNotFound(path.to_string()))?;
        *doc = contents.to_string();
        Ok(())
    }

    fn create(&self, path: &str, contents: &str) -> Result<()> {
        let mut docs = self.documents.write();
        if docs.contains_key(path) {
            return Err(HabitError::DocumentExists(path.to_string()));
        }
        docs.insert(path.to_string(), contents.to_string());
        Ok(())
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// `.md` in any letter case.
pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|part| part.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}
