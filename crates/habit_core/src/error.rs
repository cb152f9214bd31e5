use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HabitError>;

#[derive(Debug, Error)]
pub enum HabitError {
    #[error("`{0}` is not a valid YYYY-MM-DD date")]
    InvalidDate(String),

    #[error("document has no frontmatter block")]
    MissingFrontmatter,

    #[error("malformed frontmatter at line {line}: {reason}")]
    MalformedFrontmatter { line: usize, reason: String },

    #[error("unable to encode frontmatter: {0}")]
    Encode(#[from] serde_yaml::Error),

    #[error("ignored {} invalid entries: {}", .0.len(), .0.join(", "))]
    InvalidEntries(Vec<String>),

    #[error("invalid tracker configuration: {0}")]
    InvalidConfig(String),

    #[error("document `{0}` not found")]
    DocumentNotFound(String),

    #[error("document `{0}` already exists")]
    DocumentExists(String),

    #[error("invalid habit name: {0}")]
    InvalidHabitName(String),

    #[error("i/o error on `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("unable to watch vault: {0}")]
    Watch(#[from] notify::Error),
}

impl HabitError {
    pub(crate) fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
