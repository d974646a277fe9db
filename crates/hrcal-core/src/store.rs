//! The persistence collaborator the view controller talks to.

use uuid::Uuid;

use crate::event::{Event, NewEvent};

/// Row store holding events. Every call is a round trip that may fail;
/// callers treat failures as recoverable.
#[allow(async_fn_in_trait)]
pub trait EventStore {
    async fn list_events(&self) -> anyhow::Result<Vec<Event>>;

    async fn create_event(&self, new: NewEvent) -> anyhow::Result<Event>;

    /// Inserts a batch in one request. On error no row of the batch may
    /// remain in the store.
    async fn create_events(&self, batch: Vec<NewEvent>) -> anyhow::Result<Vec<Event>>;

    async fn delete_event(&self, id: Uuid) -> anyhow::Result<()>;
}
