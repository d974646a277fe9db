//! Public holiday and weekend classification.
//!
//! The table is a versioned TOML document. `[[fixed]]` entries are keyed by
//! month and day and repeat in every supported year; `[[dated]]` entries
//! carry a full date and cover lunar-calendar and substitute holidays. A date
//! whose year falls outside `first_year..=last_year` is never a holiday, but
//! can still be a weekend.

use std::collections::BTreeMap;
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use tracing::{debug, info};

use crate::datetime::is_weekend;
use crate::error::{CalendarError, CalendarResult};

const BUILTIN_TABLE_TOML: &str = include_str!("../assets/holidays.toml");
const SUPPORTED_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct TableFile {
    version: u32,
    first_year: i32,
    last_year: i32,
    #[serde(default)]
    fixed: Vec<FixedEntry>,
    #[serde(default)]
    dated: Vec<DatedEntry>,
}

#[derive(Debug, Deserialize)]
struct FixedEntry {
    month: u32,
    day: u32,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DatedEntry {
    date: NaiveDate,
    name: String,
    #[serde(default)]
    kind: HolidayKind,
}

/// Where a holiday's date comes from. `[[dated]]` entries default to
/// `lunar`; `fixed` there marks a one-off solar holiday.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HolidayKind {
    Fixed,
    #[default]
    Lunar,
    Substitute,
}

impl HolidayKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Fixed => "양력",
            Self::Lunar => "음력",
            Self::Substitute => "대체",
        }
    }
}

/// One entry of a year listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
    pub kind: HolidayKind,
}

/// Display classification of a single date. A holiday that falls on a
/// weekend is reported as `Holiday` so its name is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayKind {
    Workday,
    Weekend,
    Holiday(String),
}

impl DayKind {
    pub fn is_red(&self) -> bool {
        !matches!(self, Self::Workday)
    }

    pub fn holiday_name(&self) -> Option<&str> {
        match self {
            Self::Holiday(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HolidayTable {
    version: u32,
    first_year: i32,
    last_year: i32,
    fixed: BTreeMap<(u32, u32), Vec<String>>,
    dated: BTreeMap<NaiveDate, Vec<(String, HolidayKind)>>,
}

impl HolidayTable {
    /// The table compiled into the crate.
    pub fn builtin() -> CalendarResult<Self> {
        Self::from_toml(BUILTIN_TABLE_TOML)
    }

    #[tracing::instrument(skip(path), fields(path = %path.display()))]
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading holiday table {}", path.display()))?;
        let table = Self::from_toml(&raw)
            .with_context(|| format!("failed loading holiday table {}", path.display()))?;
        info!(
            version = table.version,
            first_year = table.first_year,
            last_year = table.last_year,
            "loaded holiday table"
        );
        Ok(table)
    }

    pub fn from_toml(raw: &str) -> CalendarResult<Self> {
        let file: TableFile =
            toml::from_str(raw).map_err(|err| CalendarError::HolidayTable(err.to_string()))?;

        if file.version != SUPPORTED_VERSION {
            return Err(CalendarError::HolidayTable(format!(
                "unsupported table version {} (expected {SUPPORTED_VERSION})",
                file.version
            )));
        }
        if file.first_year > file.last_year {
            return Err(CalendarError::HolidayTable(format!(
                "first_year {} is after last_year {}",
                file.first_year, file.last_year
            )));
        }

        let mut fixed: BTreeMap<(u32, u32), Vec<String>> = BTreeMap::new();
        for entry in file.fixed {
            // 2000 is a leap year, so Feb 29 is accepted here.
            if NaiveDate::from_ymd_opt(2000, entry.month, entry.day).is_none() {
                return Err(CalendarError::HolidayTable(format!(
                    "invalid month/day {}/{} for {}",
                    entry.month, entry.day, entry.name
                )));
            }
            fixed.entry((entry.month, entry.day)).or_default().push(entry.name);
        }

        let years = file.first_year..=file.last_year;
        let mut dated: BTreeMap<NaiveDate, Vec<(String, HolidayKind)>> = BTreeMap::new();
        for entry in file.dated {
            if !years.contains(&entry.date.year()) {
                return Err(CalendarError::HolidayTable(format!(
                    "{} ({}) is outside {}..={}",
                    entry.date, entry.name, file.first_year, file.last_year
                )));
            }
            debug!(date = %entry.date, name = %entry.name, kind = ?entry.kind, "dated holiday");
            dated
                .entry(entry.date)
                .or_default()
                .push((entry.name, entry.kind));
        }

        Ok(Self {
            version: file.version,
            first_year: file.first_year,
            last_year: file.last_year,
            fixed,
            dated,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn years(&self) -> RangeInclusive<i32> {
        self.first_year..=self.last_year
    }

    pub fn supports_year(&self, year: i32) -> bool {
        self.years().contains(&year)
    }

    pub fn holiday_name(&self, date: NaiveDate) -> Option<String> {
        if !self.supports_year(date.year()) {
            return None;
        }

        let fixed = self
            .fixed
            .get(&(date.month(), date.day()))
            .into_iter()
            .flatten()
            .map(String::as_str);
        let dated = self
            .dated
            .get(&date)
            .into_iter()
            .flatten()
            .map(|(name, _)| name.as_str());
        let names: Vec<&str> = fixed.chain(dated).collect();

        if names.is_empty() {
            None
        } else {
            Some(names.join(", "))
        }
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holiday_name(date).is_some()
    }

    pub fn is_red_day(&self, date: NaiveDate) -> bool {
        is_weekend(date) || self.is_holiday(date)
    }

    pub fn classify(&self, date: NaiveDate) -> DayKind {
        if let Some(name) = self.holiday_name(date) {
            DayKind::Holiday(name)
        } else if is_weekend(date) {
            DayKind::Weekend
        } else {
            DayKind::Workday
        }
    }

    /// Every holiday entry of `year` in date order, fixed entries first on
    /// a shared date; empty for unsupported years.
    pub fn holidays_in_year(&self, year: i32) -> Vec<Holiday> {
        if !self.supports_year(year) {
            return Vec::new();
        }

        let mut holidays = Vec::new();
        for ((month, day), names) in &self.fixed {
            // Feb 29 only exists in leap years.
            let Some(date) = NaiveDate::from_ymd_opt(year, *month, *day) else {
                continue;
            };
            holidays.extend(names.iter().map(|name| Holiday {
                date,
                name: name.clone(),
                kind: HolidayKind::Fixed,
            }));
        }
        for (date, entries) in self.dated.iter().filter(|(date, _)| date.year() == year) {
            holidays.extend(entries.iter().map(|(name, kind)| Holiday {
                date: *date,
                name: name.clone(),
                kind: *kind,
            }));
        }

        holidays.sort_by_key(|holiday| holiday.date);
        holidays
    }
}
