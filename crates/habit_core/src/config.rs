use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{HabitError, Result};
use crate::window::{DateId, DisplayWindow, MAX_DAYS_TO_SHOW};

pub const DEFAULT_DAYS_TO_SHOW: usize = 21;

/// Vault-wide defaults. Every field can be overridden per grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalSettings {
    pub path: String,
    pub days_to_show: usize,
    pub debug: bool,
    pub match_line_length: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            path: String::new(),
            days_to_show: DEFAULT_DAYS_TO_SHOW,
            debug: false,
            match_line_length: false,
        }
    }
}

impl GlobalSettings {
    pub fn from_json(raw: &str) -> Result<Self> {
        let mut settings: Self =
            serde_json::from_str(raw).map_err(|err| HabitError::InvalidConfig(err.to_string()))?;
        if settings.days_to_show == 0 {
            return Err(HabitError::InvalidConfig(
                "daysToShow must be a positive integer".to_string(),
            ));
        }
        if settings.days_to_show > MAX_DAYS_TO_SHOW {
            warn!(
                days = settings.days_to_show,
                max = MAX_DAYS_TO_SHOW,
                "daysToShow capped"
            );
            settings.days_to_show = MAX_DAYS_TO_SHOW;
        }
        Ok(settings)
    }

    pub fn to_json(&self) -> String {
        // plain struct of strings, numbers and bools
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Options of one rendered grid after merging the block over the globals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerConfig {
    pub path: String,
    pub days_to_show: usize,
    pub last_displayed_date: Option<DateId>,
    pub title_property_name: Option<String>,
    pub debug: bool,
    pub match_line_length: bool,
}

#[derive(Debug)]
pub struct ResolvedConfig {
    pub config: TrackerConfig,
    pub warnings: Vec<HabitError>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::from_settings(&GlobalSettings::default())
    }
}

impl TrackerConfig {
    pub fn from_settings(settings: &GlobalSettings) -> Self {
        Self {
            path: settings.path.clone(),
            days_to_show: settings.days_to_show.clamp(1, MAX_DAYS_TO_SHOW),
            last_displayed_date: None,
            title_property_name: None,
            debug: settings.debug,
            match_line_length: settings.match_line_length,
        }
    }

    /// Merges a JSON block over `settings`. Never fails: an unparseable
    /// block yields the global defaults, and each bad or unknown key is
    /// skipped. Both cases are reported in `warnings`.
    pub fn resolve(source: &str, settings: &GlobalSettings) -> ResolvedConfig {
        let mut config = Self::from_settings(settings);
        let mut warnings = Vec::new();

        if source.trim().is_empty() {
            return ResolvedConfig { config, warnings };
        }

        let options: Map<String, Value> = match serde_json::from_str(source) {
            Ok(options) => options,
            Err(err) => {
                warn!(%err, "invalid tracker settings, using defaults");
                warnings.push(HabitError::InvalidConfig(format!(
                    "received invalid settings ({err}), continuing with default settings"
                )));
                return ResolvedConfig { config, warnings };
            }
        };

        for (key, value) in options {
            if let Err(err) = config.apply_option(&key, &value) {
                warn!(key = %key, %err, "tracker option not applied as given");
                warnings.push(err);
            }
        }
        ResolvedConfig { config, warnings }
    }

    fn apply_option(&mut self, key: &str, value: &Value) -> Result<()> {
        let invalid = |expected: &str| {
            HabitError::InvalidConfig(format!("`{key}` must be {expected}, got {value}"))
        };
        match key {
            "path" => {
                self.path = value.as_str().ok_or_else(|| invalid("a string"))?.to_string();
            }
            "daysToShow" => {
                let days = match value {
                    Value::Number(n) => n.as_u64(),
                    Value::String(s) => s.trim().parse::<u64>().ok(),
                    _ => None,
                }
                .filter(|days| *days > 0)
                .ok_or_else(|| invalid("a positive integer"))?;
                let capped = usize::try_from(days)
                    .unwrap_or(usize::MAX)
                    .min(MAX_DAYS_TO_SHOW);
                self.days_to_show = capped;
                if capped as u64 != days {
                    return Err(HabitError::InvalidConfig(format!(
                        "`daysToShow` is capped at {MAX_DAYS_TO_SHOW}, got {days}"
                    )));
                }
            }
            "lastDisplayedDate" => {
                let date = value
                    .as_str()
                    .and_then(|raw| raw.parse::<DateId>().ok())
                    .ok_or_else(|| invalid("a YYYY-MM-DD date"))?;
                self.last_displayed_date = Some(date);
            }
            "titlePropertyName" => {
                let name = value
                    .as_str()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| invalid("a non-empty string"))?;
                self.title_property_name = Some(name.to_string());
            }
            "debug" => {
                self.debug = value.as_bool().ok_or_else(|| invalid("a boolean"))?;
            }
            "matchLineLength" => {
                self.match_line_length = value.as_bool().ok_or_else(|| invalid("a boolean"))?;
            }
            other => {
                return Err(HabitError::InvalidConfig(format!(
                    "ignoring unrecognized option `{other}`"
                )));
            }
        }
        Ok(())
    }

    pub fn anchor(&self, today: DateId) -> DateId {
        self.last_displayed_date.unwrap_or(today)
    }

    pub fn window(&self, today: DateId) -> DisplayWindow {
        DisplayWindow::new(self.anchor(today), self.days_to_show)
    }
}
