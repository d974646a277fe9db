use chrono::NaiveDate;

use crate::binning::events_on;
use crate::event::Event;

/// Popup content for events happening today.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayNotice {
    pub date: NaiveDate,
    pub events: Vec<Event>,
}

impl DayNotice {
    pub fn title(&self) -> String {
        format!("오늘의 일정 ({}건)", self.events.len())
    }

    pub fn lines(&self) -> Vec<String> {
        self.events
            .iter()
            .map(|event| match event.description.as_deref() {
                Some(description) => {
                    format!("[{}] {}: {}", event.kind.label(), event.title, description)
                }
                None => format!("[{}] {}", event.kind.label(), event.title),
            })
            .collect()
    }
}

/// `None` when nothing is dated `today`, so no popup is shown.
pub fn collect_day_notice(events: &[Event], today: NaiveDate) -> Option<DayNotice> {
    let todays: Vec<Event> = events_on(events, today).into_iter().cloned().collect();
    if todays.is_empty() {
        return None;
    }
    tracing::debug!(%today, count = todays.len(), "same-day notice collected");
    Some(DayNotice {
        date: today,
        events: todays,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::event::{EventType, NewEvent};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn notice_lists_only_todays_events() {
        let now = Utc::now();
        let events = vec![
            Event::from_new(
                NewEvent::new("Payroll", day(2024, 5, 10), EventType::Payroll)
                    .with_description("May salaries"),
                now,
            ),
            Event::from_new(NewEvent::new("Audit", day(2024, 5, 11), EventType::Notice), now),
        ];

        let notice = collect_day_notice(&events, day(2024, 5, 10)).expect("notice");
        assert_eq!(notice.events.len(), 1);
        assert_eq!(notice.title(), "오늘의 일정 (1건)");
        assert_eq!(notice.lines(), vec!["[급여지급] Payroll: May salaries".to_string()]);

        assert!(collect_day_notice(&events, day(2024, 5, 12)).is_none());
    }
}
