use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CalendarError, CalendarResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Payroll,
    Settlement,
    Onboarding,
    Resignation,
    Vacation,
    Education,
    Notice,
    #[default]
    Other,
}

impl EventType {
    pub fn all() -> [Self; 8] {
        [
            Self::Payroll,
            Self::Settlement,
            Self::Onboarding,
            Self::Resignation,
            Self::Vacation,
            Self::Education,
            Self::Notice,
            Self::Other,
        ]
    }

    pub fn as_key(self) -> &'static str {
        match self {
            Self::Payroll => "payroll",
            Self::Settlement => "settlement",
            Self::Onboarding => "onboarding",
            Self::Resignation => "resignation",
            Self::Vacation => "vacation",
            Self::Education => "education",
            Self::Notice => "notice",
            Self::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Payroll => "급여지급",
            Self::Settlement => "정산마감",
            Self::Onboarding => "입사",
            Self::Resignation => "퇴사",
            Self::Vacation => "단체연차",
            Self::Education => "교육",
            Self::Notice => "공지",
            Self::Other => "기타",
        }
    }

    /// ANSI SGR code used when the renderer paints this type.
    pub fn color_code(self) -> &'static str {
        match self {
            Self::Payroll => "32",
            Self::Settlement => "38;5;208",
            Self::Onboarding => "34",
            Self::Resignation => "90",
            Self::Vacation => "35",
            Self::Education => "33",
            Self::Notice => "95",
            Self::Other => "37",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase();
        Self::all().into_iter().find(|kind| kind.as_key() == key)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

impl FromStr for EventType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| {
            let known = Self::all().map(Self::as_key).join(", ");
            anyhow!("unknown event type: {s} (expected one of {known})")
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: Uuid,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub memo: Option<String>,

    #[serde(rename = "event_date")]
    pub date: NaiveDate,

    #[serde(rename = "type", default)]
    pub kind: EventType,

    pub created: DateTime<Utc>,
}

impl Event {
    pub fn from_new(new: NewEvent, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: new.title.trim().to_string(),
            description: new.description,
            memo: new.memo,
            date: new.date,
            kind: new.kind,
            created: now,
        }
    }

    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return true;
        }
        let lower = query.to_lowercase();
        self.title.to_lowercase().contains(&lower)
            || self.kind.as_key().contains(&lower)
            || self.kind.label().contains(query)
    }
}

/// Fields of a create request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(rename = "event_date")]
    pub date: NaiveDate,
    #[serde(rename = "type", default)]
    pub kind: EventType,
}

impl NewEvent {
    pub fn new(title: impl Into<String>, date: NaiveDate, kind: EventType) -> Self {
        Self {
            title: title.into(),
            description: None,
            memo: None,
            date,
            kind,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = non_blank(description.into());
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = non_blank(memo.into());
        self
    }

    pub fn validate(&self) -> CalendarResult<()> {
        if self.title.trim().is_empty() {
            return Err(CalendarError::Validation("event title is required".to_string()));
        }
        Ok(())
    }

    /// Trims the title and drops blank optional fields.
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            description: self.description.and_then(non_blank),
            memo: self.memo.and_then(non_blank),
            date: self.date,
            kind: self.kind,
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Data-view listing: newest date first, filtered by title or type.
pub fn search_events<'a>(events: &'a [Event], query: &str) -> Vec<&'a Event> {
    let mut out: Vec<&Event> = events.iter().filter(|event| event.matches_query(query)).collect();
    out.sort_by(|a, b| b.date.cmp(&a.date));
    out
}
