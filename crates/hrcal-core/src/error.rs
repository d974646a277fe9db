//! Errors surfaced by the view controller.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    /// The persistence collaborator failed to list, create or delete.
    #[error("backend request failed: {0}")]
    Backend(String),

    /// Input rejected locally, before any store call.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid holiday table: {0}")]
    HolidayTable(String),
}

impl CalendarError {
    pub fn backend(err: &anyhow::Error) -> Self {
        Self::Backend(format!("{err:#}"))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type CalendarResult<T> = Result<T, CalendarError>;
