use std::cell::{Cell, RefCell};

use anyhow::anyhow;
use chrono::{NaiveDate, Utc};
use hrcal_core::bulk::BulkRow;
use hrcal_core::controller::{NoticeLevel, ViewController};
use hrcal_core::error::CalendarError;
use hrcal_core::event::{Event, EventType, NewEvent};
use hrcal_core::holiday::HolidayTable;
use hrcal_core::range::{Direction, ViewMode};
use hrcal_core::store::EventStore;
use uuid::Uuid;

#[derive(Default)]
struct MockStore {
    events: RefCell<Vec<Event>>,
    fail_writes: Cell<bool>,
    fail_lists: Cell<bool>,
    writes: Cell<usize>,
    lists: Cell<usize>,
}

impl EventStore for &MockStore {
    async fn list_events(&self) -> anyhow::Result<Vec<Event>> {
        self.lists.set(self.lists.get() + 1);
        if self.fail_lists.get() {
            return Err(anyhow!("connection reset"));
        }
        Ok(self.events.borrow().clone())
    }

    async fn create_event(&self, new: NewEvent) -> anyhow::Result<Event> {
        self.writes.set(self.writes.get() + 1);
        if self.fail_writes.get() {
            return Err(anyhow!("insert rejected by backend"));
        }
        let event = Event::from_new(new, Utc::now());
        self.events.borrow_mut().push(event.clone());
        Ok(event)
    }

    async fn create_events(&self, batch: Vec<NewEvent>) -> anyhow::Result<Vec<Event>> {
        if self.fail_writes.get() {
            self.writes.set(self.writes.get() + 1);
            return Err(anyhow!("insert rejected by backend"));
        }
        self.writes.set(self.writes.get() + batch.len());
        let now = Utc::now();
        let created: Vec<Event> = batch.into_iter().map(|new| Event::from_new(new, now)).collect();
        self.events.borrow_mut().extend(created.iter().cloned());
        Ok(created)
    }

    async fn delete_event(&self, id: Uuid) -> anyhow::Result<()> {
        self.writes.set(self.writes.get() + 1);
        let mut events = self.events.borrow_mut();
        let before = events.len();
        events.retain(|event| event.id != id);
        if events.len() == before {
            return Err(anyhow!("event not found: {id}"));
        }
        Ok(())
    }
}

/// Saves rows one at a time and gives up on the second, leaving the
/// first behind.
#[derive(Default)]
struct PartialBatchStore {
    events: RefCell<Vec<Event>>,
}

impl EventStore for &PartialBatchStore {
    async fn list_events(&self) -> anyhow::Result<Vec<Event>> {
        Ok(self.events.borrow().clone())
    }

    async fn create_event(&self, new: NewEvent) -> anyhow::Result<Event> {
        let event = Event::from_new(new, Utc::now());
        self.events.borrow_mut().push(event.clone());
        Ok(event)
    }

    async fn create_events(&self, batch: Vec<NewEvent>) -> anyhow::Result<Vec<Event>> {
        let mut created = Vec::new();
        for (idx, new) in batch.into_iter().enumerate() {
            if idx == 1 {
                return Err(anyhow!("connection dropped mid-batch"));
            }
            created.push(self.create_event(new).await?);
        }
        Ok(created)
    }

    async fn delete_event(&self, _id: Uuid) -> anyhow::Result<()> {
        Ok(())
    }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn controller(store: &MockStore) -> ViewController<&MockStore> {
    let holidays = HolidayTable::builtin().expect("builtin table");
    ViewController::new(store, holidays, day(2024, 5, 10))
}

fn event(title: &str, date: NaiveDate) -> Event {
    Event::from_new(NewEvent::new(title, date, EventType::Payroll), Utc::now())
}

#[tokio::test]
async fn two_events_on_the_same_day_share_one_cell() {
    let store = MockStore::default();
    let mut ctl = controller(&store);

    ctl.create_event(NewEvent::new("Payroll", day(2024, 5, 10), EventType::Payroll))
        .await
        .expect("first create");
    ctl.create_event(NewEvent::new("Kim joins", day(2024, 5, 10), EventType::Onboarding))
        .await
        .expect("second create");

    let cell = ctl
        .cells()
        .iter()
        .find(|cell| cell.date == day(2024, 5, 10))
        .expect("cell for May 10");
    let titles: Vec<&str> = cell.events.iter().map(|event| event.title.as_str()).collect();
    assert_eq!(titles, vec!["Payroll", "Kim joins"]);
    assert!(cell.is_today);
    assert!(cell.in_current_period);
    assert!(!cell.red_day);
    assert_eq!(ctl.todays_events().len(), 2);
    assert_eq!(ctl.todays_notice().expect("notice").events.len(), 2);
}

#[tokio::test]
async fn failed_create_keeps_state_and_sets_notice() {
    let store = MockStore::default();
    store.events.borrow_mut().push(event("Payroll", day(2024, 5, 10)));

    let mut ctl = controller(&store);
    ctl.refresh().await.expect("initial fetch");
    let cells_before = ctl.cells().to_vec();
    let events_before = ctl.events().to_vec();

    store.fail_writes.set(true);
    let err = ctl
        .create_event(NewEvent::new("Audit", day(2024, 5, 20), EventType::Notice))
        .await
        .expect_err("backend refuses");

    assert!(matches!(err, CalendarError::Backend(_)));
    assert_eq!(ctl.events(), events_before.as_slice());
    assert_eq!(ctl.cells(), cells_before.as_slice());
    let notice = ctl.notice().expect("notice shown");
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.message.contains("insert rejected by backend"));

    ctl.dismiss_notice();
    assert!(ctl.notice().is_none());
}

#[tokio::test]
async fn blank_title_never_reaches_the_store() {
    let store = MockStore::default();
    let mut ctl = controller(&store);

    let err = ctl
        .create_event(NewEvent::new("   ", day(2024, 5, 10), EventType::Other))
        .await
        .expect_err("validation");

    assert!(err.is_validation());
    assert_eq!(store.writes.get(), 0);
    assert_eq!(store.lists.get(), 0);
    assert_eq!(ctl.notice().expect("notice").level, NoticeLevel::Warning);
}

#[tokio::test]
async fn import_skips_untitled_rows_and_refetches() {
    let store = MockStore::default();
    let mut ctl = controller(&store);

    let rows = vec![
        BulkRow::new("Payroll", day(2024, 5, 10), EventType::Payroll),
        BulkRow::new("", day(2024, 5, 11), EventType::Other),
        BulkRow::new("Workshop", day(2024, 5, 14), EventType::Education),
    ];
    let created = ctl.import_events(rows).await.expect("import");

    assert_eq!(created.len(), 2);
    assert_eq!(store.writes.get(), 2);
    assert_eq!(ctl.events().len(), 2);

    let err = ctl
        .import_events(vec![BulkRow::new(" ", day(2024, 5, 12), EventType::Other)])
        .await
        .expect_err("nothing to save");
    assert!(err.is_validation());
    assert_eq!(store.writes.get(), 2);
}

#[tokio::test]
async fn rejected_import_saves_nothing() {
    let store = MockStore::default();
    store.fail_writes.set(true);
    let mut ctl = controller(&store);

    let rows = vec![
        BulkRow::new("A", day(2024, 5, 10), EventType::Payroll),
        BulkRow::new("B", day(2024, 5, 13), EventType::Notice),
        BulkRow::new("C", day(2024, 5, 14), EventType::Education),
    ];
    let err = ctl.import_events(rows).await.expect_err("backend refuses");

    assert!(matches!(err, CalendarError::Backend(_)));
    assert!(store.events.borrow().is_empty());
    assert!(ctl.events().is_empty());
    let notice = ctl.notice().expect("notice shown");
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.message.contains("failed to save 3 events"));
}

#[tokio::test]
async fn import_failing_mid_batch_shows_what_the_store_kept() {
    let store = PartialBatchStore::default();
    let holidays = HolidayTable::builtin().expect("builtin table");
    let mut ctl = ViewController::new(&store, holidays, day(2024, 5, 10));

    let rows = vec![
        BulkRow::new("A", day(2024, 5, 10), EventType::Payroll),
        BulkRow::new("B", day(2024, 5, 13), EventType::Notice),
        BulkRow::new("C", day(2024, 5, 14), EventType::Education),
    ];
    let err = ctl.import_events(rows).await.expect_err("second row fails");

    assert!(matches!(err, CalendarError::Backend(_)));
    assert_eq!(store.events.borrow().len(), 1);
    assert_eq!(ctl.events(), store.events.borrow().as_slice());
    let notice = ctl.notice().expect("notice survives the reload");
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.message.contains("connection dropped mid-batch"));
}

#[tokio::test]
async fn delete_refetches_and_missing_id_is_a_backend_error() {
    let store = MockStore::default();
    let keep = event("Payroll", day(2024, 5, 10));
    let drop = event("Audit", day(2024, 5, 10));
    store.events.borrow_mut().extend([keep.clone(), drop.clone()]);

    let mut ctl = controller(&store);
    ctl.refresh().await.expect("initial fetch");
    assert_eq!(ctl.events().len(), 2);

    ctl.delete_event(drop.id).await.expect("delete");
    assert_eq!(ctl.events(), std::slice::from_ref(&keep));

    let err = ctl.delete_event(drop.id).await.expect_err("already gone");
    assert!(matches!(err, CalendarError::Backend(_)));
    assert_eq!(ctl.events().len(), 1);
}

#[tokio::test]
async fn failed_fetch_leaves_prior_events_visible() {
    let store = MockStore::default();
    store.events.borrow_mut().push(event("Payroll", day(2024, 5, 10)));

    let mut ctl = controller(&store);
    ctl.refresh().await.expect("initial fetch");

    store.fail_lists.set(true);
    assert!(ctl.refresh().await.is_err());
    assert_eq!(ctl.events().len(), 1);
    assert!(ctl.notice().is_some());

    store.fail_lists.set(false);
    ctl.refresh().await.expect("recovered");
    assert!(ctl.notice().is_none());
}

#[test]
fn only_the_latest_fetch_is_applied() {
    let store = MockStore::default();
    let mut ctl = controller(&store);

    let first = ctl.begin_fetch();
    let second = ctl.begin_fetch();

    let fresh = vec![event("Fresh", day(2024, 5, 10))];
    assert!(ctl.complete_fetch(second, Ok(fresh.clone())).expect("apply"));

    let stale = vec![event("Stale", day(2024, 5, 11))];
    assert!(!ctl.complete_fetch(first, Ok(stale)).expect("dropped"));
    assert_eq!(ctl.events(), fresh.as_slice());

    // A stale failure is dropped too, without a notice.
    let third = ctl.begin_fetch();
    let fourth = ctl.begin_fetch();
    assert!(!ctl.complete_fetch(third, Err(anyhow!("timeout"))).expect("dropped"));
    assert!(ctl.notice().is_none());
    assert!(ctl.complete_fetch(fourth, Ok(fresh.clone())).expect("apply"));
}

#[test]
fn navigation_supersedes_a_fetch_in_flight() {
    let store = MockStore::default();
    let mut ctl = controller(&store);

    let ticket = ctl.begin_fetch();
    ctl.navigate(Direction::Next);
    assert_eq!(ctl.state().reference, day(2024, 6, 1));

    let late = vec![event("Late", day(2024, 5, 10))];
    assert!(!ctl.complete_fetch(ticket, Ok(late)).expect("dropped"));
    assert!(ctl.events().is_empty());
}

#[test]
fn view_changes_rebuild_the_grid() {
    let store = MockStore::default();
    let mut ctl = controller(&store);
    assert_eq!(ctl.cells().len(), 35);

    ctl.set_mode(ViewMode::Week);
    assert_eq!(ctl.cells().len(), 7);
    assert_eq!(ctl.cells()[0].date, day(2024, 5, 5));
    assert_eq!(ctl.cells()[0].holiday.as_deref(), Some("어린이날"));

    ctl.set_mode(ViewMode::Day);
    ctl.navigate(Direction::Prev);
    assert_eq!(ctl.cells().len(), 1);
    assert_eq!(ctl.cells()[0].date, day(2024, 5, 9));

    ctl.go_to(day(2024, 2, 29));
    ctl.set_mode(ViewMode::Month);
    ctl.go_today();
    assert_eq!(ctl.state().reference, day(2024, 5, 10));
    assert_eq!(ctl.title(), "2024년 5월");
}
