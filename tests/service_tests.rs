//! Event service tests
//!
//! Validation happens before the store is touched; store errors pass
//! through with their kind preserved.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use calendar_store::{
    ErrorKind, Event, EventArchiver, EventId, EventService, EventStore, InMemoryEventStore,
    NewEvent, StoreError, StoreResult, UserId,
};
use chrono::{DateTime, TimeZone, Utc};
use tokio_test::{assert_err, assert_ok};

fn jan_15() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
}

/// Store that only counts calls and always reports an outage.
#[derive(Default)]
struct UnavailableStore {
    calls: AtomicUsize,
}

impl UnavailableStore {
    fn touch<T>(&self) -> StoreResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::unavailable("connection refused"))
    }
}

#[async_trait]
impl EventStore for UnavailableStore {
    async fn create(&self, _event: NewEvent) -> StoreResult<EventId> {
        self.touch()
    }

    async fn update(&self, _event: &Event) -> StoreResult<()> {
        self.touch()
    }

    async fn delete(&self, _event_id: EventId) -> StoreResult<()> {
        self.touch()
    }

    async fn events_for_day(&self, _user_id: UserId, _date: DateTime<Utc>) -> StoreResult<Vec<Event>> {
        self.touch()
    }

    async fn events_for_week(&self, _user_id: UserId, _start: DateTime<Utc>) -> StoreResult<Vec<Event>> {
        self.touch()
    }

    async fn events_for_month(&self, _user_id: UserId, _start: DateTime<Utc>) -> StoreResult<Vec<Event>> {
        self.touch()
    }
}

#[async_trait]
impl EventArchiver for UnavailableStore {
    async fn archive_old_events(&self) -> StoreResult<()> {
        self.touch()
    }
}

#[tokio::test]
async fn test_service_crud_scenario() {
    let service = EventService::new(Arc::new(InMemoryEventStore::new()));

    let created = assert_ok!(service.create_event(NewEvent::new(1, jan_15(), "Meeting")).await);
    assert!(created.event_id > 0);
    assert!(!created.is_archived);

    let found = assert_ok!(service.events_for_day(1, jan_15()).await);
    assert_eq!(found, vec![created.clone()]);

    let mut updated = created.clone();
    updated.description = "Rescheduled".to_string();
    assert_ok!(service.update_event(updated).await);

    let found = assert_ok!(service.events_for_day(1, jan_15()).await);
    assert_eq!(found[0].event_id, created.event_id);
    assert_eq!(found[0].description, "Rescheduled");

    assert_ok!(service.delete_event(created.event_id).await);
    assert!(assert_ok!(service.events_for_day(1, jan_15()).await).is_empty());

    let err = assert_err!(service.delete_event(created.event_id).await);
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_invalid_input_never_reaches_store() {
    let store = Arc::new(UnavailableStore::default());
    let service = EventService::new(store.clone());

    let rejected = [
        service.create_event(NewEvent::new(0, jan_15(), "Meeting")).await.unwrap_err(),
        service.create_event(NewEvent::new(-3, jan_15(), "Meeting")).await.unwrap_err(),
        service.create_event(NewEvent::new(1, jan_15(), "")).await.unwrap_err(),
        service
            .update_event(NewEvent::new(1, jan_15(), "x").with_id(0))
            .await
            .unwrap_err(),
        service
            .update_event(NewEvent::new(0, jan_15(), "x").with_id(4))
            .await
            .unwrap_err(),
        service.delete_event(0).await.unwrap_err(),
        service.events_for_day(0, jan_15()).await.unwrap_err(),
        service.events_for_week(-1, jan_15()).await.unwrap_err(),
        service.events_for_month(0, jan_15()).await.unwrap_err(),
    ];

    for err in rejected {
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "unexpected error: {}", err);
    }
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_store_errors_keep_their_kind() {
    let store = Arc::new(UnavailableStore::default());
    let service = EventService::new(store.clone());

    let err = service
        .create_event(NewEvent::new(1, jan_15(), "Meeting"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);

    let err = service.events_for_week(1, jan_15()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);

    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_update_missing_event_is_not_found() {
    let service = EventService::new(Arc::new(InMemoryEventStore::new()));

    let err = service
        .update_event(NewEvent::new(1, jan_15(), "ghost").with_id(99))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(service.events_for_day(1, jan_15()).await.unwrap().is_empty());
}
