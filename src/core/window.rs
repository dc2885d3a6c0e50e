//! Time windows used by the range queries.
//!
//! Both backends must agree on these boundaries exactly: the in-memory store
//! evaluates [`Window::contains`] directly, and the PostgreSQL store expresses
//! the same arithmetic in SQL (in UTC).

use chrono::{DateTime, Duration, Months, TimeDelta, Utc};

/// Number of days covered by a week window.
pub const WEEK_DAYS: i64 = 7;

/// 2000-01-01T00:00:00Z, the zero point of PostgreSQL timestamps.
const STORAGE_EPOCH_SECS: i64 = 946_684_800;

/// Round an instant to what a durable backend can hold: whole microseconds
/// counted from the PostgreSQL epoch, truncated toward that epoch exactly as
/// the wire encoding does. Stores apply this to stored dates and window
/// anchors alike so every backend sees the same boundaries.
pub fn to_storage_precision(instant: DateTime<Utc>) -> DateTime<Utc> {
    let Some(epoch) = DateTime::<Utc>::from_timestamp(STORAGE_EPOCH_SECS, 0) else {
        return instant;
    };
    (instant - epoch)
        .num_microseconds()
        .and_then(|micros| epoch.checked_add_signed(TimeDelta::microseconds(micros)))
        .unwrap_or(instant)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// The UTC calendar day containing the instant.
    Day(DateTime<Utc>),
    /// `[start, start + 7 days)`
    Week(DateTime<Utc>),
    /// `[start, start + 1 calendar month)`
    Month(DateTime<Utc>),
}

impl Window {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        match *self {
            Window::Day(day) => day.date_naive() == instant.date_naive(),
            Window::Week(start) => start <= instant && instant < week_end(start),
            Window::Month(start) => start <= instant && instant < month_end(start),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Window::Day(_) => "day",
            Window::Week(_) => "week",
            Window::Month(_) => "month",
        }
    }
}

/// Exclusive upper bound of the week starting at `start`.
pub fn week_end(start: DateTime<Utc>) -> DateTime<Utc> {
    start
        .checked_add_signed(Duration::days(WEEK_DAYS))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Exclusive upper bound of the month starting at `start`.
///
/// Calendar addition: the day of month is clamped to the length of the next
/// month, so Jan 31 maps to the last day of February.
pub fn month_end(start: DateTime<Utc>) -> DateTime<Utc> {
    start
        .checked_add_months(Months::new(1))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
