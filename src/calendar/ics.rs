//! Local iCalendar (.ics) file source.
//
// The file is re-read on every call so that edits are picked up without a
// restart. Recurring events are not expanded: only the first occurrence
// described by DTSTART/DTEND is considered.

use super::{CalendarError, CalendarEvent, CalendarSource, TimeWindow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use ical::parser::ical::component::IcalEvent;
use ical::property::Property;
use log::debug;
use std::path::PathBuf;

pub struct IcsCalendarSource {
    path: PathBuf,
}

#[derive(Debug, Clone, Copy)]
enum IcsTime {
    Date(NaiveDate),
    Instant(DateTime<Utc>),
}

impl IcsCalendarSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CalendarSource for IcsCalendarSource {
    async fn list_events(&self, window: &TimeWindow) -> Result<Vec<CalendarEvent>, CalendarError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| CalendarError::Io { path: self.path.clone(), source })?;
        parse_events(&content, window)
    }

    fn describe(&self) -> String {
        format!("ics file {}", self.path.display())
    }
}

/// Parses iCalendar text and returns the events overlapping `window`,
/// ordered by start.
pub(crate) fn parse_events(
    content: &str,
    window: &TimeWindow,
) -> Result<Vec<CalendarEvent>, CalendarError> {
    let tz = window.timezone();
    let mut found: Vec<(DateTime<Utc>, CalendarEvent)> = Vec::new();

    for calendar in ical::IcalParser::new(content.as_bytes()) {
        let calendar = calendar.map_err(|e| CalendarError::Parse(e.to_string()))?;
        for event in &calendar.events {
            let summary = property(event, "SUMMARY")
                .and_then(|p| p.value.clone())
                .unwrap_or_default();

            let Some(start) = property(event, "DTSTART").and_then(|p| parse_time(p, tz)) else {
                debug!("Skipping event '{}' without a usable DTSTART", summary);
                continue;
            };
            let end = property(event, "DTEND").and_then(|p| parse_time(p, tz));

            let Some((start_at, end_at)) = span(start, end, tz) else {
                debug!("Skipping event '{}' starting at a nonexistent local time", summary);
                continue;
            };
            if !window.overlaps(start_at, end_at) {
                continue;
            }

            let event = match start {
                IcsTime::Date(day) => CalendarEvent::all_day(summary, day),
                IcsTime::Instant(at) => {
                    CalendarEvent::timed(summary, at.with_timezone(&tz).fixed_offset())
                }
            };
            found.push((start_at, event));
        }
    }

    found.sort_by_key(|(start_at, _)| *start_at);
    Ok(found.into_iter().map(|(_, event)| event).collect())
}

fn property<'a>(event: &'a IcalEvent, name: &str) -> Option<&'a Property> {
    event.properties.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

fn param<'a>(prop: &'a Property, key: &str) -> Option<&'a str> {
    prop.params
        .as_ref()?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

fn parse_time(prop: &Property, tz: Tz) -> Option<IcsTime> {
    let value = prop.value.as_deref()?.trim();

    let is_date = param(prop, "VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"));
    if is_date || value.len() == 8 {
        return NaiveDate::parse_from_str(value, "%Y%m%d").ok().map(IcsTime::Date);
    }

    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").ok()?;
        return Some(IcsTime::Instant(naive.and_utc()));
    }

    // Floating times are read in the configured timezone.
    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?;
    let zone = param(prop, "TZID").and_then(|name| name.parse::<Tz>().ok()).unwrap_or(tz);
    zone.from_local_datetime(&naive)
        .earliest()
        .map(|local| IcsTime::Instant(local.with_timezone(&Utc)))
}

fn local_midnight(day: NaiveDate, tz: Tz) -> Option<DateTime<Utc>> {
    let midnight = day.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&midnight).earliest().map(|t| t.with_timezone(&Utc))
}

fn span(start: IcsTime, end: Option<IcsTime>, tz: Tz) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let to_instant = |t: IcsTime| match t {
        IcsTime::Date(day) => local_midnight(day, tz),
        IcsTime::Instant(at) => Some(at),
    };

    let start_at = to_instant(start)?;
    let end_at = match (start, end) {
        (_, Some(end)) => to_instant(end)?,
        (IcsTime::Date(day), None) => local_midnight(day.succ_opt()?, tz)?,
        (IcsTime::Instant(at), None) => at,
    };
    Some((start_at, end_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const ONCALL_ICS: &str = "BEGIN:VCALENDAR
VERSION:2.0
PRODID:-//oncall//test//EN
BEGIN:VEVENT
UID:1
SUMMARY:Alice
DTSTART;TZID=Europe/Paris:20240221T090000
DTEND;TZID=Europe/Paris:20240221T180000
END:VEVENT
BEGIN:VEVENT
UID:2
SUMMARY:Bob
DTSTART;VALUE=DATE:20240221
DTEND;VALUE=DATE:20240222
END:VEVENT
BEGIN:VEVENT
UID:3
SUMMARY:Carol
DTSTART:20240222T080000Z
DTEND:20240222T170000Z
END:VEVENT
BEGIN:VEVENT
UID:4
SUMMARY:No start
END:VEVENT
END:VCALENDAR
";

    fn window_at(hour: u32) -> TimeWindow {
        let now = Utc.with_ymd_and_hms(2024, 2, 21, hour, 0, 0).unwrap();
        TimeWindow::starting_at(now, chrono_tz::Europe::Paris, TimeDelta::minutes(1))
    }

    #[test]
    fn test_keeps_overlapping_events_sorted_by_start() {
        let events = parse_events(ONCALL_ICS, &window_at(10)).unwrap();
        let summaries: Vec<&str> = events.iter().map(|e| e.summary.as_str()).collect();

        // Bob's all-day event starts at local midnight, before Alice's shift.
        assert_eq!(summaries, vec!["Bob", "Alice"]);
        assert!(events[0].has_date_only_start());
        assert!(events[1].has_timed_start());
    }

    #[test]
    fn test_outside_any_shift_only_all_day_remains() {
        // 20:00 UTC is 21:00 in Paris, after Alice's shift ended.
        let events = parse_events(ONCALL_ICS, &window_at(20)).unwrap();
        let summaries: Vec<&str> = events.iter().map(|e| e.summary.as_str()).collect();
        assert_eq!(summaries, vec!["Bob"]);
    }

    #[test]
    fn test_calendar_without_events_is_empty() {
        let ics = "BEGIN:VCALENDAR\nVERSION:2.0\nPRODID:-//oncall//test//EN\nEND:VCALENDAR\n";
        assert!(parse_events(ics, &window_at(10)).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reads_file_each_time() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ONCALL_ICS.as_bytes()).unwrap();

        let source = IcsCalendarSource::new(file.path());
        let events = source.list_events(&window_at(10)).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(source.describe().starts_with("ics file "));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = IcsCalendarSource::new(dir.path().join("missing.ics"));
        let result = source.list_events(&window_at(10)).await;
        assert!(matches!(result, Err(CalendarError::Io { .. })));
    }
}
