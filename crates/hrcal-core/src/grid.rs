use chrono::NaiveDate;
use tracing::debug;

use crate::binning::bin_events;
use crate::event::Event;
use crate::holiday::{DayKind, HolidayTable};
use crate::range::{ViewMode, generate_range, in_current_period};

/// One rendered day. Rebuilt on every render, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub in_current_period: bool,
    pub red_day: bool,
    pub is_today: bool,
    pub holiday: Option<String>,
    pub events: Vec<Event>,
}

impl CalendarCell {
    pub fn day_kind(&self) -> DayKind {
        match (&self.holiday, self.red_day) {
            (Some(name), _) => DayKind::Holiday(name.clone()),
            (None, true) => DayKind::Weekend,
            (None, false) => DayKind::Workday,
        }
    }
}

pub fn build_cells(
    reference: NaiveDate,
    mode: ViewMode,
    today: NaiveDate,
    events: &[Event],
    holidays: &HolidayTable,
) -> Vec<CalendarCell> {
    let dates = generate_range(reference, mode);
    let mut buckets = bin_events(events, &dates);

    let cells: Vec<CalendarCell> = dates
        .into_iter()
        .map(|date| {
            let kind = holidays.classify(date);
            CalendarCell {
                date,
                in_current_period: in_current_period(date, reference, mode),
                red_day: kind.is_red(),
                is_today: date == today,
                holiday: kind.holiday_name().map(str::to_string),
                events: buckets
                    .remove(&date)
                    .unwrap_or_default()
                    .into_iter()
                    .cloned()
                    .collect(),
            }
        })
        .collect();

    debug!(
        %reference,
        mode = %mode,
        cells = cells.len(),
        events = cells.iter().map(|c| c.events.len()).sum::<usize>(),
        "calendar cells rebuilt"
    );
    cells
}
