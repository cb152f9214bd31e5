pub mod config;
pub mod document;
pub mod entries;
pub mod error;
pub mod frontmatter;
pub mod habit;
pub mod notice;
pub mod render;
pub mod store;
pub mod tracker;
pub mod window;

pub use crate::error::{HabitError, Result};
pub use crate::tracker::{Grid, HabitTracker, HabitTrackerBuilder};
pub use crate::window::DateId;
