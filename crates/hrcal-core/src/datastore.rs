use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::controller::ViewState;
use crate::event::{Event, NewEvent};
use crate::store::EventStore;

/// JSON-lines event table on the local filesystem.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub events_path: PathBuf,
    pub view_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let events_path = data_dir.join("events.data");
        let view_path = data_dir.join("view.data");

        if !events_path.exists() {
            fs::write(&events_path, "")?;
        }
        if !view_path.exists() {
            fs::write(&view_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            events = %events_path.display(),
            view = %view_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            events_path,
            view_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_events(&self) -> anyhow::Result<Vec<Event>> {
        load_jsonl(&self.events_path).context("failed to load events.data")
    }

    #[tracing::instrument(skip(self, events))]
    pub fn save_events(&self, events: &[Event]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.events_path, events).context("failed to save events.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_view_state(&self) -> anyhow::Result<Option<ViewState>> {
        let raw = fs::read_to_string(&self.view_path)
            .with_context(|| format!("failed reading {}", self.view_path.display()))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let state = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {}", self.view_path.display()))?;
        Ok(Some(state))
    }

    #[tracing::instrument(skip(self))]
    pub fn save_view_state(&self, state: &ViewState) -> anyhow::Result<()> {
        let payload = serde_json::to_string(state)?;
        fs::write(&self.view_path, payload)
            .with_context(|| format!("failed writing {}", self.view_path.display()))?;
        Ok(())
    }
}

impl EventStore for DataStore {
    async fn list_events(&self) -> anyhow::Result<Vec<Event>> {
        self.load_events()
    }

    #[tracing::instrument(skip(self, new), fields(date = %new.date, kind = %new.kind))]
    async fn create_event(&self, new: NewEvent) -> anyhow::Result<Event> {
        let mut events = self.load_events()?;
        let event = Event::from_new(new, Utc::now());
        events.push(event.clone());
        self.save_events(&events)?;
        debug!(id = %event.id, total = events.len(), "event created");
        Ok(event)
    }

    #[tracing::instrument(skip(self, batch), fields(rows = batch.len()))]
    async fn create_events(&self, batch: Vec<NewEvent>) -> anyhow::Result<Vec<Event>> {
        let mut events = self.load_events()?;
        let now = Utc::now();
        let created: Vec<Event> = batch
            .into_iter()
            .map(|new| Event::from_new(new, now))
            .collect();
        events.extend(created.iter().cloned());
        self.save_events(&events)?;
        debug!(created = created.len(), total = events.len(), "events created");
        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    async fn delete_event(&self, id: Uuid) -> anyhow::Result<()> {
        let mut events = self.load_events()?;
        let idx = events
            .iter()
            .position(|event| event.id == id)
            .ok_or_else(|| anyhow!("event not found: {id}"))?;
        let removed = events.remove(idx);
        self.save_events(&events)?;
        debug!(title = %removed.title, remaining = events.len(), "event deleted");
        Ok(())
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Event>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let event: Event = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(event);
    }

    debug!(count = out.len(), "loaded events from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, events))]
fn save_jsonl_atomic(path: &Path, events: &[Event]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = events.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for event in events {
        let serialized = serde_json::to_string(event)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
