use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Local, NaiveDate};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{HabitError, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Widest display window, one leap year of columns.
pub const MAX_DAYS_TO_SHOW: usize = 366;

/// Calendar-local day in canonical `YYYY-MM-DD` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateId(NaiveDate);

impl DateId {
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    pub fn pred(&self) -> Option<Self> {
        self.0.pred_opt().map(Self)
    }

    pub fn day_of_month(&self) -> u32 {
        self.0.day()
    }

    pub fn weekday(&self) -> Weekday {
        day_of_week(*self)
    }
}

impl fmt::Display for DateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl FromStr for DateId {
    type Err = HabitError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let date = NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
            .map_err(|_| HabitError::InvalidDate(s.to_string()))?;
        // chrono accepts unpadded fields, the canonical form does not
        if date.format(DATE_FORMAT).to_string() != trimmed {
            return Err(HabitError::InvalidDate(s.to_string()));
        }
        Ok(Self(date))
    }
}

impl From<NaiveDate> for DateId {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl Serialize for DateId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Sunday => "sunday",
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
            Weekday::Saturday => "saturday",
        }
    }

    pub fn short_label(&self) -> &'static str {
        &self.as_str()[..2]
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Sun => Weekday::Sunday,
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
        }
    }
}

/// `length` consecutive days ending at `anchor`, oldest first.
pub fn date_range(anchor: DateId, length: usize) -> Vec<DateId> {
    if length == 0 {
        return Vec::new();
    }
    let start = anchor
        .0
        .checked_sub_days(Days::new(length as u64 - 1))
        .unwrap_or(NaiveDate::MIN);
    start
        .iter_days()
        .take_while(|day| *day <= anchor.0)
        .map(DateId)
        .collect()
}

pub fn day_of_week(date: DateId) -> Weekday {
    date.0.weekday().into()
}

/// Consecutive completed days walking backward from `as_of`, inclusive.
pub fn streak(completions: &BTreeSet<DateId>, as_of: DateId) -> u32 {
    let mut count = 0;
    let mut cursor = Some(as_of);
    while let Some(day) = cursor {
        if !completions.contains(&day) {
            break;
        }
        count += 1;
        cursor = day.pred();
    }
    count
}

/// Streak for every date in `dates`, which must be consecutive and ascending.
///
/// Only the first date walks the completion set backward; every following
/// date extends the previous count.
pub fn streaks(completions: &BTreeSet<DateId>, dates: &[DateId]) -> Vec<u32> {
    let mut out = Vec::with_capacity(dates.len());
    let mut previous: Option<u32> = None;
    for date in dates {
        let current = match previous {
            None => streak(completions, *date),
            Some(prev) if completions.contains(date) => prev + 1,
            Some(_) => 0,
        };
        out.push(current);
        previous = Some(current);
    }
    out
}

/// Visible columns plus one hidden day before them that seeds the first
/// visible streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayWindow {
    anchor: DateId,
    days: usize,
}

impl DisplayWindow {
    pub fn new(anchor: DateId, days: usize) -> Self {
        Self {
            anchor,
            days: days.clamp(1, MAX_DAYS_TO_SHOW),
        }
    }

    pub fn anchor(&self) -> DateId {
        self.anchor
    }

    pub fn days(&self) -> usize {
        self.days
    }

    pub fn visible(&self) -> Vec<DateId> {
        date_range(self.anchor, self.days)
    }

    pub fn with_lookback(&self) -> Vec<DateId> {
        date_range(self.anchor, self.days.saturating_add(1))
    }
}

/// Long-form label, e.g. `Today, April 24, 2024`.
pub fn pretty_date(date: DateId, today: DateId) -> String {
    let pretty = date.0.format("%B %-d, %Y").to_string();
    if date == today {
        format!("Today, {pretty}")
    } else {
        pretty
    }
}

pub fn pluralize(count: u32, singular: &str, plural: Option<&str>) -> String {
    if count == 1 {
        return singular.to_string();
    }
    match plural {
        Some(plural) => plural.to_string(),
        None => format!("{singular}s"),
    }
}
