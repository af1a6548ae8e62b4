//! Calendar sources and the event model they produce.
//
// A source only has to answer one question: which events overlap a given
// window. Sources must return events ordered by start time.

use async_trait::async_trait;
use chrono::{DateTime, DurationRound, FixedOffset, NaiveDate, TimeDelta, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

mod google;
mod ics;

pub use google::GoogleCalendarSource;
pub use ics::IcsCalendarSource;

/// Custom error type for calendar operations
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("Calendar request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Calendar API returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to decode calendar response: {0}")]
    Decode(String),
    #[error("Failed to read calendar file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid iCalendar data: {0}")]
    Parse(String),
    #[error("Calendar source did not answer within {0:?}")]
    Timeout(Duration),
}

/// How an event starts. Google and iCalendar both express all-day events
/// with a bare date and regular events with a full timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStart {
    Timed(DateTime<FixedOffset>),
    AllDay(NaiveDate),
    /// Neither or both start forms were present.
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub summary: String,
    pub start: EventStart,
}

impl CalendarEvent {
    pub fn timed(summary: impl Into<String>, at: DateTime<FixedOffset>) -> Self {
        Self { summary: summary.into(), start: EventStart::Timed(at) }
    }

    pub fn all_day(summary: impl Into<String>, date: NaiveDate) -> Self {
        Self { summary: summary.into(), start: EventStart::AllDay(date) }
    }

    /// Builds an event from the two optional start fields a calendar API
    /// reports. Anything but exactly one of them yields a malformed event.
    pub fn from_parts(
        summary: impl Into<String>,
        date_time: Option<DateTime<FixedOffset>>,
        date: Option<NaiveDate>,
    ) -> Self {
        let start = match (date_time, date) {
            (Some(at), None) => EventStart::Timed(at),
            (None, Some(day)) => EventStart::AllDay(day),
            _ => EventStart::Malformed,
        };
        Self { summary: summary.into(), start }
    }

    pub fn has_timed_start(&self) -> bool {
        matches!(self.start, EventStart::Timed(_))
    }

    pub fn has_date_only_start(&self) -> bool {
        matches!(self.start, EventStart::AllDay(_))
    }
}

impl fmt::Display for CalendarEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.start {
            EventStart::Timed(at) => write!(f, "{} - start: {}", self.summary, at.to_rfc3339()),
            EventStart::AllDay(day) => write!(f, "{} - all day: {}", self.summary, day),
            EventStart::Malformed => write!(f, "{} - start: <malformed>", self.summary),
        }
    }
}

/// Half-open `[start, end)` window in the configured timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl TimeWindow {
    /// The window a watch cycle looks at: `now` truncated to the minute,
    /// expressed in `tz`, extended by `length`.
    pub fn starting_at(now: DateTime<Utc>, tz: Tz, length: TimeDelta) -> Self {
        // Truncating in UTC keeps working through the repeated hour of a
        // DST fall-back, where local wall-clock times are ambiguous.
        let start = now
            .duration_trunc(TimeDelta::minutes(1))
            .unwrap_or(now)
            .with_timezone(&tz);
        Self { start, end: start + length }
    }

    pub fn timezone(&self) -> Tz {
        self.start.timezone()
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Whether `[start, end)` intersects the window. A zero-length range
    /// counts when its instant lies inside the window.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        if end <= start {
            return self.contains(start);
        }
        start < self.end && end > self.start
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Anything that can list the events of a time window.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Events overlapping `window`, ordered by start time.
    async fn list_events(&self, window: &TimeWindow) -> Result<Vec<CalendarEvent>, CalendarError>;

    /// Short human readable description used in logs.
    fn describe(&self) -> String;
}
