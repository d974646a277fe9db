//! Date ranges for the month, week
//! and day grids, and navigation
//! between them. Weeks start on
//! Sunday.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  Datelike,
  NaiveDate,
  Weekday
};
use serde::{
  Deserialize,
  Serialize
};

use crate::datetime::{
  add_days,
  end_of_week,
  first_day_of_month,
  last_day_of_month,
  shift_months,
  start_of_week,
  weekday_label
};

pub const WEEK_START: Weekday =
  Weekday::Sun;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
  #[default]
  Month,
  Week,
  Day
}

impl ViewMode {
  pub fn all() -> [Self; 3] {
    [Self::Month, Self::Week, Self::Day]
  }

  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Month => "month",
      | Self::Week => "week",
      | Self::Day => "day"
    }
  }

  pub fn from_key(
    key: &str
  ) -> Option<Self> {
    match key
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "month" | "m" => {
        Some(Self::Month)
      }
      | "week" | "w" => Some(Self::Week),
      | "day" | "d" => Some(Self::Day),
      | _ => None
    }
  }
}

impl fmt::Display for ViewMode {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_key())
  }
}

impl FromStr for ViewMode {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Self::from_key(s).ok_or_else(|| {
      anyhow!(
        "unknown view mode: {s} \
         (expected month, week or day)"
      )
    })
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Direction {
  Prev,
  Next
}

impl Direction {
  fn step(self) -> i64 {
    match self {
      | Self::Prev => -1,
      | Self::Next => 1
    }
  }
}

/// First and last date of the grid for
/// `reference` in `mode`.
pub fn period_bounds(
  reference: NaiveDate,
  mode: ViewMode
) -> (NaiveDate, NaiveDate) {
  match mode {
    | ViewMode::Month => {
      let first = first_day_of_month(
        reference.year(),
        reference.month()
      );
      let last = last_day_of_month(
        reference.year(),
        reference.month()
      );
      (
        start_of_week(first, WEEK_START),
        end_of_week(last, WEEK_START)
      )
    }
    | ViewMode::Week => {
      (
        start_of_week(
          reference, WEEK_START
        ),
        end_of_week(
          reference, WEEK_START
        )
      )
    }
    | ViewMode::Day => {
      (reference, reference)
    }
  }
}

/// Ordered dates to render. Month
/// grids always cover whole weeks, so
/// leading and trailing days of the
/// neighbouring months are included.
pub fn generate_range(
  reference: NaiveDate,
  mode: ViewMode
) -> Vec<NaiveDate> {
  let (start, end) =
    period_bounds(reference, mode);
  start
    .iter_days()
    .take_while(|day| *day <= end)
    .collect()
}

/// Whether `day` belongs to the period
/// being viewed, as opposed to padding.
pub fn in_current_period(
  day: NaiveDate,
  reference: NaiveDate,
  mode: ViewMode
) -> bool {
  match mode {
    | ViewMode::Month => {
      day.year() == reference.year()
        && day.month()
          == reference.month()
    }
    | ViewMode::Week | ViewMode::Day => {
      let (start, end) =
        period_bounds(reference, mode);
      day >= start && day <= end
    }
  }
}

/// Moves the reference date by one
/// unit of `mode`. Month moves land on
/// the first of the target month.
pub fn navigate(
  reference: NaiveDate,
  mode: ViewMode,
  direction: Direction
) -> NaiveDate {
  let step = direction.step();
  match mode {
    | ViewMode::Month => {
      let shifted = shift_months(
        reference,
        step as i32
      );
      first_day_of_month(
        shifted.year(),
        shifted.month()
      )
    }
    | ViewMode::Week => {
      add_days(reference, step * 7)
    }
    | ViewMode::Day => {
      add_days(reference, step)
    }
  }
}

pub fn period_title(
  reference: NaiveDate,
  mode: ViewMode
) -> String {
  match mode {
    | ViewMode::Month => {
      format!(
        "{}년 {}월",
        reference.year(),
        reference.month()
      )
    }
    | ViewMode::Week => {
      let (start, end) =
        period_bounds(reference, mode);
      let end_text =
        if start.year() == end.year() {
          format!(
            "{}월 {}일",
            end.month(),
            end.day()
          )
        } else {
          format!(
            "{}년 {}월 {}일",
            end.year(),
            end.month(),
            end.day()
          )
        };
      format!(
        "{}년 {}월 {}일 ~ {end_text}",
        start.year(),
        start.month(),
        start.day()
      )
    }
    | ViewMode::Day => {
      format!(
        "{}년 {}월 {}일 ({})",
        reference.year(),
        reference.month(),
        reference.day(),
        weekday_label(
          reference.weekday()
        )
      )
    }
  }
}
