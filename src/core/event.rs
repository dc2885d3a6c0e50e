use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Store-assigned event identifier.
pub type EventId = i64;

/// Owner of an event; every window query is scoped by it.
pub type UserId = i64;

/// A stored calendar event.
///
/// Only a store produces values of this type, so an `Event` always carries
/// the id the store assigned at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub event_id: EventId,
    pub user_id: UserId,
    pub date: DateTime<Utc>,
    pub is_archived: bool,
    pub description: String,
}

impl Event {
    /// True when the archival pass observing `now` should flip this event.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        !self.is_archived && self.date < now
    }
}

/// An event that has not been stored yet and therefore has no id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub user_id: UserId,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub is_archived: bool,
    pub description: String,
}

impl NewEvent {
    pub fn new(user_id: UserId, date: DateTime<Utc>, description: impl Into<String>) -> Self {
        Self {
            user_id,
            date,
            is_archived: false,
            description: description.into(),
        }
    }

    pub fn archived(mut self, is_archived: bool) -> Self {
        self.is_archived = is_archived;
        self
    }

    /// Attach the id a store assigned to this event.
    pub fn with_id(self, event_id: EventId) -> Event {
        Event {
            event_id,
            user_id: self.user_id,
            date: self.date,
            is_archived: self.is_archived,
            description: self.description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_event_defaults_to_unarchived() {
        let date = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        let event = NewEvent::new(1, date, "Meeting");

        assert!(!event.is_archived);
        assert_eq!(event.description, "Meeting");

        let stored = event.with_id(3);
        assert_eq!(stored.event_id, 3);
        assert_eq!(stored.user_id, 1);
        assert_eq!(stored.date, date);
    }

    #[test]
    fn test_is_stale() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let past = NewEvent::new(1, now - chrono::Duration::seconds(1), "past").with_id(1);
        let exact = NewEvent::new(1, now, "now").with_id(2);
        let archived = NewEvent::new(1, now - chrono::Duration::days(1), "old")
            .archived(true)
            .with_id(3);

        assert!(past.is_stale(now));
        assert!(!exact.is_stale(now));
        assert!(!archived.is_stale(now));
    }

    #[test]
    fn test_json_field_names() {
        let date = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let event = NewEvent::new(1, date, "Meeting").with_id(5);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_id"], 5);
        assert_eq!(json["user_id"], 1);
        assert_eq!(json["is_archived"], false);
        assert_eq!(json["description"], "Meeting");

        let parsed: NewEvent = serde_json::from_str(
            r#"{"user_id": 2, "date": "2024-01-15T00:00:00Z", "description": "Lunch"}"#,
        )
        .unwrap();
        assert_eq!(parsed.user_id, 2);
        assert!(!parsed.is_archived);
    }
}
