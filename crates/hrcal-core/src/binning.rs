use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::event::Event;

/// Groups events into per-date buckets by exact date match.
///
/// Every date in `dates` gets an entry, empty when nothing falls on it.
/// Events keep their input order inside a bucket. Events dated outside
/// `dates` are left out.
pub fn bin_events<'a>(
    events: &'a [Event],
    dates: &[NaiveDate],
) -> BTreeMap<NaiveDate, Vec<&'a Event>> {
    let mut buckets: BTreeMap<NaiveDate, Vec<&Event>> =
        dates.iter().map(|date| (*date, Vec::new())).collect();

    for event in events {
        if let Some(bucket) = buckets.get_mut(&event.date) {
            bucket.push(event);
        }
    }

    buckets
}

/// Events dated `day`, in input order.
pub fn events_on<'a>(events: &'a [Event], day: NaiveDate) -> Vec<&'a Event> {
    events.iter().filter(|event| event.date == day).collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::event::{EventType, NewEvent};
    use crate::range::{ViewMode, generate_range};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn event(title: &str, date: NaiveDate) -> Event {
        Event::from_new(NewEvent::new(title, date, EventType::Other), Utc::now())
    }

    #[test]
    fn shared_date_lands_in_one_bucket() {
        let events = vec![
            event("payroll", day(2024, 5, 10)),
            event("onboarding", day(2024, 5, 10)),
        ];
        let dates = generate_range(day(2024, 5, 1), ViewMode::Month);
        let buckets = bin_events(&events, &dates);

        let may_10 = &buckets[&day(2024, 5, 10)];
        assert_eq!(may_10.len(), 2);
        assert_eq!(may_10[0].title, "payroll");
        assert_eq!(may_10[1].title, "onboarding");

        let elsewhere: usize = buckets
            .iter()
            .filter(|(date, _)| **date != day(2024, 5, 10))
            .map(|(_, bucket)| bucket.len())
            .sum();
        assert_eq!(elsewhere, 0);
    }

    #[test]
    fn every_date_has_a_bucket() {
        let dates = generate_range(day(2024, 2, 14), ViewMode::Month);
        let buckets = bin_events(&[], &dates);
        assert_eq!(buckets.len(), dates.len());
        assert!(buckets.values().all(Vec::is_empty));
    }

    #[test]
    fn in_range_events_are_counted_once() {
        let events = vec![
            event("a", day(2024, 4, 28)),
            event("b", day(2024, 5, 1)),
            event("c", day(2024, 5, 31)),
            event("d", day(2024, 6, 1)),
            event("e", day(2024, 5, 15)),
        ];
        // May 2024 grid runs Apr 28 .. Jun 1.
        let dates = generate_range(day(2024, 5, 20), ViewMode::Month);
        let buckets = bin_events(&events, &dates);
        let total: usize = buckets.values().map(Vec::len).sum();
        assert_eq!(total, events.len());
        for e in &events {
            let hits = buckets
                .values()
                .flatten()
                .filter(|binned| binned.id == e.id)
                .count();
            assert_eq!(hits, 1, "{}", e.title);
        }
    }

    #[test]
    fn out_of_range_events_are_skipped() {
        let events = vec![event("later", day(2024, 7, 1))];
        let dates = generate_range(day(2024, 5, 10), ViewMode::Week);
        let buckets = bin_events(&events, &dates);
        assert_eq!(buckets.values().map(Vec::len).sum::<usize>(), 0);
    }

    #[test]
    fn binning_is_idempotent() {
        let events = vec![
            event("x", day(2024, 5, 10)),
            event("y", day(2024, 5, 11)),
            event("z", day(2024, 5, 10)),
        ];
        let dates = generate_range(day(2024, 5, 10), ViewMode::Month);
        assert_eq!(bin_events(&events, &dates), bin_events(&events, &dates));
    }

    #[test]
    fn events_on_keeps_order() {
        let events = vec![
            event("first", day(2024, 5, 10)),
            event("other", day(2024, 5, 9)),
            event("second", day(2024, 5, 10)),
        ];
        let titles: Vec<_> = events_on(&events, day(2024, 5, 10))
            .into_iter()
            .map(|e| e.title.as_str())
            .collect();
        assert_eq!(titles, vec!["first", "second"]);
    }
}
