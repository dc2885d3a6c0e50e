pub mod memory;
pub mod postgres;

pub use memory::InMemoryEventStore;
pub use postgres::PgEventStore;

use crate::core::{Event, EventId, NewEvent, StoreResult, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Storage contract shared by every event backend.
///
/// Backends agree on window boundaries (see [`crate::core::window`]) and on
/// the error kinds they report, so callers can hold an `Arc<dyn EventStore>`
/// without knowing which backend sits behind it. Result ordering is not part
/// of the contract.
///
/// Every method is cancellable by dropping the returned future; wrap calls in
/// `tokio::time::timeout` to bound them. The store-wide archival mutation
/// lives on the [`EventArchiver`] supertrait.
#[async_trait]
pub trait EventStore: EventArchiver {
    /// Persist a new event and return the id assigned to it.
    async fn create(&self, event: NewEvent) -> StoreResult<EventId>;

    /// Replace every mutable field of the stored event with the same id.
    async fn update(&self, event: &Event) -> StoreResult<()>;

    async fn delete(&self, event_id: EventId) -> StoreResult<()>;

    async fn events_for_day(&self, user_id: UserId, date: DateTime<Utc>)
    -> StoreResult<Vec<Event>>;

    async fn events_for_week(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>>;

    async fn events_for_month(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>>;
}

/// The single capability the archival worker needs from a store.
#[async_trait]
pub trait EventArchiver: Send + Sync {
    /// Mark every event of every user whose date lies before the moment of
    /// the call, and which is not archived yet, as archived.
    async fn archive_old_events(&self) -> StoreResult<()>;
}
