//! Input validation in front of an [`EventStore`].
//!
//! Invalid requests are rejected with [`StoreError::InvalidInput`] before
//! they reach the store; every store error passes through with its kind
//! unchanged.

use crate::core::{
    Event, EventId, NewEvent, StoreError, StoreResult, UserId, to_storage_precision,
};
use crate::storage::EventStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn EventStore>,
}

impl EventService {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Validate and persist a new event, returning it as stored: with its
    /// assigned id and its date at storage precision.
    pub async fn create_event(&self, event: NewEvent) -> StoreResult<Event> {
        validate_user_id(event.user_id)?;
        if event.description.is_empty() {
            return Err(StoreError::invalid_input("event description is required"));
        }
        let event = NewEvent {
            date: to_storage_precision(event.date),
            ..event
        };

        let event_id = self.store.create(event.clone()).await?;
        info!(event_id, user_id = event.user_id, "event created");
        Ok(event.with_id(event_id))
    }

    pub async fn update_event(&self, event: Event) -> StoreResult<()> {
        if event.event_id <= 0 || event.user_id <= 0 {
            return Err(StoreError::invalid_input("invalid event or user id"));
        }

        self.store.update(&event).await?;
        info!(event_id = event.event_id, "event updated");
        Ok(())
    }

    pub async fn delete_event(&self, event_id: EventId) -> StoreResult<()> {
        if event_id <= 0 {
            return Err(StoreError::invalid_input("invalid event id"));
        }

        self.store.delete(event_id).await?;
        info!(event_id, "event deleted");
        Ok(())
    }

    pub async fn events_for_day(
        &self,
        user_id: UserId,
        date: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>> {
        validate_user_id(user_id)?;
        debug!(user_id, %date, "events for day");
        self.store.events_for_day(user_id, date).await
    }

    pub async fn events_for_week(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>> {
        validate_user_id(user_id)?;
        debug!(user_id, %start, "events for week");
        self.store.events_for_week(user_id, start).await
    }

    pub async fn events_for_month(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>> {
        validate_user_id(user_id)?;
        debug!(user_id, %start, "events for month");
        self.store.events_for_month(user_id, start).await
    }
}

fn validate_user_id(user_id: UserId) -> StoreResult<()> {
    if user_id <= 0 {
        return Err(StoreError::invalid_input("invalid user id"));
    }
    Ok(())
}
