//! Composition root for one calendar screen.
//!
//! [`ViewController`] owns the view state and the last fetched event list.
//! Every mutation goes through [`ViewController::rebuild`], which derives the
//! cell grid from scratch. Store calls are the only suspension points; a
//! failed call leaves events and cells as they were and records a
//! [`Notice`] for the user. A failed batch import reloads first, so the
//! grid shows whatever the store kept.
//!
//! Fetches are sequence-stamped. Only the response to the most recently
//! issued [`FetchTicket`] is applied, and navigation invalidates any fetch
//! already in flight.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::binning::events_on;
use crate::bulk::{BulkRow, prepare_batch};
use crate::error::{CalendarError, CalendarResult};
use crate::event::{Event, NewEvent};
use crate::grid::{CalendarCell, build_cells};
use crate::holiday::HolidayTable;
use crate::notify::{DayNotice, collect_day_notice};
use crate::range::{Direction, ViewMode, navigate, period_title};
use crate::store::EventStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub reference: NaiveDate,
    pub mode: ViewMode,
}

impl ViewState {
    pub fn new(reference: NaiveDate, mode: ViewMode) -> Self {
        Self { reference, mode }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// A visible, non-fatal message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

pub struct ViewController<S> {
    store: S,
    holidays: HolidayTable,
    state: ViewState,
    today: NaiveDate,
    events: Vec<Event>,
    cells: Vec<CalendarCell>,
    notice: Option<Notice>,
    latest_fetch: u64,
}

impl<S: EventStore> ViewController<S> {
    pub fn new(store: S, holidays: HolidayTable, today: NaiveDate) -> Self {
        let mut controller = Self {
            store,
            holidays,
            state: ViewState::new(today, ViewMode::Month),
            today,
            events: Vec::new(),
            cells: Vec::new(),
            notice: None,
            latest_fetch: 0,
        };
        controller.rebuild();
        controller
    }

    pub fn with_state(mut self, state: ViewState) -> Self {
        self.state = state;
        self.rebuild();
        self
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn cells(&self) -> &[CalendarCell] {
        &self.cells
    }

    pub fn holidays(&self) -> &HolidayTable {
        &self.holidays
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn title(&self) -> String {
        period_title(self.state.reference, self.state.mode)
    }

    pub fn todays_events(&self) -> Vec<&Event> {
        events_on(&self.events, self.today)
    }

    pub fn todays_notice(&self) -> Option<DayNotice> {
        collect_day_notice(&self.events, self.today)
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.change_state(ViewState::new(self.state.reference, mode));
    }

    pub fn navigate(&mut self, direction: Direction) {
        let reference = navigate(self.state.reference, self.state.mode, direction);
        self.change_state(ViewState::new(reference, self.state.mode));
    }

    pub fn go_today(&mut self) {
        self.change_state(ViewState::new(self.today, self.state.mode));
    }

    pub fn go_to(&mut self, reference: NaiveDate) {
        self.change_state(ViewState::new(reference, self.state.mode));
    }

    /// Updates the current date, e.g. after midnight passes.
    pub fn set_today(&mut self, today: NaiveDate) {
        self.today = today;
        self.rebuild();
    }

    fn change_state(&mut self, state: ViewState) {
        debug!(
            from = %self.state.reference,
            to = %state.reference,
            mode = %state.mode,
            "view state changed"
        );
        self.state = state;
        self.latest_fetch += 1;
        self.rebuild();
    }

    pub fn rebuild(&mut self) {
        self.cells = build_cells(
            self.state.reference,
            self.state.mode,
            self.today,
            &self.events,
            &self.holidays,
        );
    }

    /// Starts a fetch. Any ticket issued earlier becomes stale.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.latest_fetch += 1;
        FetchTicket(self.latest_fetch)
    }

    /// Applies a fetch response. Returns `Ok(false)` when the ticket was
    /// superseded and the response was dropped.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: anyhow::Result<Vec<Event>>,
    ) -> CalendarResult<bool> {
        if ticket.0 != self.latest_fetch {
            debug!(
                ticket = ticket.0,
                latest = self.latest_fetch,
                "dropping stale fetch response"
            );
            return Ok(false);
        }

        match result {
            Ok(events) => {
                debug!(count = events.len(), "fetch applied");
                self.events = events;
                self.notice = None;
                self.rebuild();
                Ok(true)
            }
            Err(err) => Err(self.fail("failed to load events", &err)),
        }
    }

    pub async fn refresh(&mut self) -> CalendarResult<()> {
        let ticket = self.begin_fetch();
        let result = self.store.list_events().await;
        self.complete_fetch(ticket, result).map(|_| ())
    }

    #[tracing::instrument(skip(self, new), fields(date = %new.date, kind = %new.kind))]
    pub async fn create_event(&mut self, new: NewEvent) -> CalendarResult<Event> {
        let new = new.normalized();
        if let Err(err) = new.validate() {
            return Err(self.reject(err));
        }

        let created = match self.store.create_event(new).await {
            Ok(event) => event,
            Err(err) => return Err(self.fail("failed to save event", &err)),
        };
        info!(id = %created.id, title = %created.title, "event created");

        self.refetch_after_write().await;
        Ok(created)
    }

    #[tracing::instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn import_events(&mut self, rows: Vec<BulkRow>) -> CalendarResult<Vec<Event>> {
        let batch = match prepare_batch(rows) {
            Ok(batch) => batch,
            Err(err) => return Err(self.reject(err)),
        };

        let total = batch.len();
        let created = match self.store.create_events(batch).await {
            Ok(created) => created,
            Err(err) => {
                // Show what the store actually holds before reporting.
                self.refetch_after_write().await;
                let action = format!("failed to save {total} events");
                return Err(self.fail(&action, &err));
            }
        };
        info!(count = created.len(), "events imported");

        self.refetch_after_write().await;
        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub async fn delete_event(&mut self, id: Uuid) -> CalendarResult<()> {
        if let Err(err) = self.store.delete_event(id).await {
            return Err(self.fail("failed to delete event", &err));
        }
        info!("event deleted");

        self.refetch_after_write().await;
        Ok(())
    }

    async fn refetch_after_write(&mut self) {
        // A failed reload only leaves a notice; the write result stands.
        if let Err(err) = self.refresh().await {
            warn!(error = %err, "reload after write failed");
        }
    }

    fn reject(&mut self, err: CalendarError) -> CalendarError {
        warn!(error = %err, "request rejected before reaching the store");
        self.notice = Some(Notice {
            level: NoticeLevel::Warning,
            message: err.to_string(),
        });
        err
    }

    fn fail(&mut self, action: &str, err: &anyhow::Error) -> CalendarError {
        let error = CalendarError::backend(err);
        error!(action, error = %error, "store request failed");
        self.notice = Some(Notice {
            level: NoticeLevel::Error,
            message: format!("{action}: {error}"),
        });
        error
    }
}
