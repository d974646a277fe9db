use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::error::{CalendarError, CalendarResult};
use crate::event::{EventType, NewEvent};

/// One row of a bulk import. Rows with a blank title are skipped rather
/// than rejected.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BulkRow {
    #[serde(default)]
    pub title: String,
    #[serde(alias = "event_date")]
    pub date: NaiveDate,
    #[serde(rename = "type", default)]
    pub kind: EventType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
}

impl BulkRow {
    pub fn new(title: impl Into<String>, date: NaiveDate, kind: EventType) -> Self {
        Self {
            title: title.into(),
            date,
            kind,
            description: None,
            memo: None,
        }
    }

    fn into_new_event(self) -> NewEvent {
        NewEvent {
            title: self.title,
            description: self.description,
            memo: self.memo,
            date: self.date,
            kind: self.kind,
        }
        .normalized()
    }
}

/// Accepts a JSON array, a single JSON object, or one JSON object per line.
pub fn parse_bulk_rows(raw: &str) -> anyhow::Result<Vec<BulkRow>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("import: empty input"));
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("failed parsing JSON array");
    }

    if trimmed.starts_with('{')
        && let Ok(row) = serde_json::from_str::<BulkRow>(trimmed)
    {
        return Ok(vec![row]);
    }

    let mut out = Vec::new();
    for (idx, line) in trimmed.lines().enumerate() {
        let token = line.trim();
        if token.is_empty() {
            continue;
        }
        let row: BulkRow = serde_json::from_str(token)
            .with_context(|| format!("failed parsing import line {}", idx + 1))?;
        out.push(row);
    }

    if out.is_empty() {
        return Err(anyhow!("import: empty input"));
    }

    Ok(out)
}

/// Drops untitled rows and fails when nothing is left to save.
pub fn prepare_batch(rows: Vec<BulkRow>) -> CalendarResult<Vec<NewEvent>> {
    let total = rows.len();
    let batch: Vec<NewEvent> = rows
        .into_iter()
        .filter(|row| !row.title.trim().is_empty())
        .map(BulkRow::into_new_event)
        .collect();

    debug!(total, kept = batch.len(), "prepared bulk batch");

    if batch.is_empty() {
        return Err(CalendarError::Validation(
            "no events to save; every row is missing a title".to_string(),
        ));
    }
    Ok(batch)
}
