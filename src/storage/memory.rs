use super::{EventArchiver, EventStore};
use crate::core::{
    Event, EventId, NewEvent, StoreError, StoreResult, UserId, Window, to_storage_precision,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Event store kept entirely in process memory.
///
/// One reader/writer lock guards the whole table: mutations and the archival
/// pass take it exclusively, window queries share it. Queries are linear scans
/// with no secondary index, and the archival pass scans the full table while
/// holding the write lock, so every reader and writer waits for it to finish.
/// That pause is the price of this backend; use [`super::PgEventStore`] when
/// the table grows large.
///
/// Dates and query anchors are cut to microseconds on the way in, the
/// precision PostgreSQL stores, so both backends draw identical windows.
#[derive(Debug)]
pub struct InMemoryEventStore {
    table: RwLock<EventTable>,
}

#[derive(Debug)]
struct EventTable {
    events: HashMap<EventId, Event>,
    /// Next id to hand out; only ever increments, so ids of deleted events
    /// are never issued again.
    next_id: EventId,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::with_capacity(128)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: RwLock::new(EventTable {
                events: HashMap::with_capacity(capacity),
                next_id: 1,
            }),
        }
    }

    /// Number of events currently stored.
    pub async fn len(&self) -> usize {
        self.table.read().await.events.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.read().await.events.is_empty()
    }

    /// Archive every stale event as observed at `now` and return how many
    /// events changed.
    pub async fn archive_events_before(&self, now: DateTime<Utc>) -> usize {
        let mut table = self.table.write().await;
        let mut archived = 0;
        for event in table.events.values_mut() {
            if event.is_stale(now) {
                event.is_archived = true;
                archived += 1;
            }
        }
        archived
    }

    async fn scan(&self, user_id: UserId, window: Window) -> Vec<Event> {
        let table = self.table.read().await;
        let events: Vec<Event> = table
            .events
            .values()
            .filter(|event| event.user_id == user_id && window.contains(event.date))
            .cloned()
            .collect();
        debug!(
            user_id,
            window = window.name(),
            matched = events.len(),
            scanned = table.events.len(),
            "scanned in-memory events"
        );
        events
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn create(&self, event: NewEvent) -> StoreResult<EventId> {
        let mut table = self.table.write().await;
        let event_id = table.next_id;
        table.next_id = event_id
            .checked_add(1)
            .ok_or_else(|| StoreError::internal("event id space exhausted"))?;
        let mut stored = event.with_id(event_id);
        stored.date = to_storage_precision(stored.date);
        table.events.insert(event_id, stored);
        debug!(event_id, "created in-memory event");
        Ok(event_id)
    }

    async fn update(&self, event: &Event) -> StoreResult<()> {
        let mut table = self.table.write().await;
        let Some(stored) = table.events.get_mut(&event.event_id) else {
            return Err(StoreError::NotFound(event.event_id));
        };
        *stored = Event {
            date: to_storage_precision(event.date),
            ..event.clone()
        };
        debug!(event_id = event.event_id, "updated in-memory event");
        Ok(())
    }

    async fn delete(&self, event_id: EventId) -> StoreResult<()> {
        let mut table = self.table.write().await;
        if table.events.remove(&event_id).is_none() {
            return Err(StoreError::NotFound(event_id));
        }
        debug!(event_id, "deleted in-memory event");
        Ok(())
    }

    async fn events_for_day(
        &self,
        user_id: UserId,
        date: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>> {
        Ok(self.scan(user_id, Window::Day(to_storage_precision(date))).await)
    }

    async fn events_for_week(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>> {
        Ok(self.scan(user_id, Window::Week(to_storage_precision(start))).await)
    }

    async fn events_for_month(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>> {
        Ok(self.scan(user_id, Window::Month(to_storage_precision(start))).await)
    }
}

#[async_trait]
impl EventArchiver for InMemoryEventStore {
    async fn archive_old_events(&self) -> StoreResult<()> {
        let archived = self.archive_events_before(Utc::now()).await;
        debug!(archived, "archived stale in-memory events");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn jan(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_ids_start_at_one_and_increase() {
        let store = InMemoryEventStore::new();

        let first = store.create(NewEvent::new(1, jan(15, 9), "a")).await.unwrap();
        let second = store.create(NewEvent::new(1, jan(15, 10), "b")).await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_delete() {
        let store = InMemoryEventStore::new();

        let first = store.create(NewEvent::new(1, jan(15, 9), "a")).await.unwrap();
        store.delete(first).await.unwrap();
        let second = store.create(NewEvent::new(1, jan(15, 9), "b")).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn test_separate_instances_count_independently() {
        let left = InMemoryEventStore::new();
        let right = InMemoryEventStore::new();

        left.create(NewEvent::new(1, jan(1, 0), "x")).await.unwrap();
        left.create(NewEvent::new(1, jan(1, 0), "y")).await.unwrap();

        let id = right.create(NewEvent::new(1, jan(1, 0), "z")).await.unwrap();
        assert_eq!(id, 1);
    }

    #[tokio::test]
    async fn test_archive_events_before_counts_changes() {
        let store = InMemoryEventStore::new();
        store.create(NewEvent::new(1, jan(10, 0), "old")).await.unwrap();
        store.create(NewEvent::new(2, jan(11, 0), "old")).await.unwrap();
        store
            .create(NewEvent::new(1, jan(12, 0), "done").archived(true))
            .await
            .unwrap();
        store.create(NewEvent::new(1, jan(20, 0), "later")).await.unwrap();

        assert_eq!(store.archive_events_before(jan(15, 0)).await, 2);
        assert_eq!(store.archive_events_before(jan(15, 0)).await, 0);

        let later = store.events_for_day(1, jan(20, 0)).await.unwrap();
        assert!(!later[0].is_archived);
    }
}
