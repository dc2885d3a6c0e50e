use super::{EventArchiver, EventStore};
use crate::connection::{self, PgStoreConfig};
use crate::core::{Event, EventId, NewEvent, StoreError, StoreResult, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

// Interval arithmetic runs on `timestamp` values converted to UTC so the
// result does not depend on the session time zone and month addition clamps
// exactly like `chrono::DateTime::checked_add_months`.

const INSERT_EVENT_SQL: &str = r#"
INSERT INTO events (user_id, date, is_archived, description)
VALUES ($1, $2, $3, $4)
RETURNING event_id
"#;

const UPDATE_EVENT_SQL: &str = r#"
UPDATE events
SET user_id = $1, date = $2, is_archived = $3, description = $4, updated_at = NOW()
WHERE event_id = $5
"#;

const DELETE_EVENT_SQL: &str = "DELETE FROM events WHERE event_id = $1";

const EVENTS_FOR_DAY_SQL: &str = r#"
SELECT event_id, user_id, date, is_archived, description
FROM events
WHERE user_id = $1
  AND date >= date_trunc('day', $2::timestamptz AT TIME ZONE 'UTC') AT TIME ZONE 'UTC'
  AND date < (date_trunc('day', $2::timestamptz AT TIME ZONE 'UTC') + INTERVAL '1 day') AT TIME ZONE 'UTC'
ORDER BY date
"#;

const EVENTS_FOR_WEEK_SQL: &str = r#"
SELECT event_id, user_id, date, is_archived, description
FROM events
WHERE user_id = $1
  AND date >= $2::timestamptz
  AND date < (($2::timestamptz AT TIME ZONE 'UTC') + INTERVAL '7 days') AT TIME ZONE 'UTC'
ORDER BY date
"#;

const EVENTS_FOR_MONTH_SQL: &str = r#"
SELECT event_id, user_id, date, is_archived, description
FROM events
WHERE user_id = $1
  AND date >= $2::timestamptz
  AND date < (($2::timestamptz AT TIME ZONE 'UTC') + INTERVAL '1 month') AT TIME ZONE 'UTC'
ORDER BY date
"#;

const ARCHIVE_OLD_EVENTS_SQL: &str = r#"
UPDATE events
SET is_archived = true
WHERE date < NOW() AND is_archived = false
"#;

/// Extra time the client waits past the server-side statement timeout
/// before giving up on a call that never answered.
const STATEMENT_TIMEOUT_GRACE: Duration = Duration::from_secs(2);

/// Event store backed by PostgreSQL.
///
/// Every operation is a single statement, so it either commits or leaves no
/// trace. A configured statement timeout is enforced by the server, which
/// aborts the statement and reports SQLSTATE 57014 (`Unavailable`). The
/// client-side deadline only covers a connection that stops answering, in
/// which case the outcome of the statement is unknown.
/// The archival pass runs server-side as one `UPDATE` and relies on
/// PostgreSQL row locking instead of a table-wide lock.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
    statement_timeout: Option<Duration>,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout: None,
        }
    }

    /// Open a pool from `config`, run the startup health check and return a
    /// ready store.
    pub async fn connect(config: &PgStoreConfig) -> StoreResult<Self> {
        let pool = connection::connect(config).await?;
        Ok(Self {
            pool,
            statement_timeout: config.statement_timeout,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("event schema migrations applied");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn bounded<T, F>(&self, operation: &'static str, statement: F) -> StoreResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        let Some(limit) = self.statement_timeout else {
            return Ok(statement.await?);
        };

        let deadline = limit + STATEMENT_TIMEOUT_GRACE;
        match tokio::time::timeout(deadline, statement).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::unavailable(format!(
                "{} got no answer within {:?}",
                operation, deadline
            ))),
        }
    }

    async fn fetch_window(
        &self,
        operation: &'static str,
        sql: &'static str,
        user_id: UserId,
        anchor: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>> {
        let events = self
            .bounded(
                operation,
                sqlx::query_as::<_, Event>(sql)
                    .bind(user_id)
                    .bind(anchor)
                    .fetch_all(&self.pool),
            )
            .await?;
        debug!(user_id, operation, matched = events.len(), "queried events");
        Ok(events)
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn create(&self, event: NewEvent) -> StoreResult<EventId> {
        let event_id = self
            .bounded(
                "create event",
                sqlx::query_scalar::<_, EventId>(INSERT_EVENT_SQL)
                    .bind(event.user_id)
                    .bind(event.date)
                    .bind(event.is_archived)
                    .bind(&event.description)
                    .fetch_one(&self.pool),
            )
            .await?;
        debug!(event_id, "created event");
        Ok(event_id)
    }

    async fn update(&self, event: &Event) -> StoreResult<()> {
        let result = self
            .bounded(
                "update event",
                sqlx::query(UPDATE_EVENT_SQL)
                    .bind(event.user_id)
                    .bind(event.date)
                    .bind(event.is_archived)
                    .bind(&event.description)
                    .bind(event.event_id)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(event.event_id));
        }
        debug!(event_id = event.event_id, "updated event");
        Ok(())
    }

    async fn delete(&self, event_id: EventId) -> StoreResult<()> {
        let result = self
            .bounded(
                "delete event",
                sqlx::query(DELETE_EVENT_SQL)
                    .bind(event_id)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(event_id));
        }
        debug!(event_id, "deleted event");
        Ok(())
    }

    async fn events_for_day(
        &self,
        user_id: UserId,
        date: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>> {
        self.fetch_window("events for day", EVENTS_FOR_DAY_SQL, user_id, date)
            .await
    }

    async fn events_for_week(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>> {
        self.fetch_window("events for week", EVENTS_FOR_WEEK_SQL, user_id, start)
            .await
    }

    async fn events_for_month(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>> {
        self.fetch_window("events for month", EVENTS_FOR_MONTH_SQL, user_id, start)
            .await
    }
}

#[async_trait]
impl EventArchiver for PgEventStore {
    async fn archive_old_events(&self) -> StoreResult<()> {
        let result = self
            .bounded(
                "archive old events",
                sqlx::query(ARCHIVE_OLD_EVENTS_SQL).execute(&self.pool),
            )
            .await?;
        debug!(archived = result.rows_affected(), "archived stale events");
        Ok(())
    }
}
