//! Picks the on-call identity out of the events of a watch window.
//!
//! A regular (timed) entry is preferred over an all-day placeholder: the
//! first timed event with a non-empty summary wins outright, otherwise the
//! last all-day event seen is used.
//!
//! Events must be ordered by start time. Misordered input is scanned as
//! given, so the result then depends on the order the source returned.

use crate::calendar::{CalendarEvent, EventStart, TimeWindow};
use log::debug;

pub fn select(window: &TimeWindow, events: &[CalendarEvent]) -> Option<String> {
    if events.is_empty() {
        debug!("No events in window {}", window);
        return None;
    }

    let mut fallback: Option<&CalendarEvent> = None;
    for event in events {
        debug!("entry: {}", event);
        match event.start {
            EventStart::AllDay(_) => fallback = Some(event),
            // An empty timed entry is skipped but does not stop the scan.
            EventStart::Timed(_) if !event.summary.is_empty() => {
                return Some(event.summary.to_lowercase());
            }
            EventStart::Timed(_) | EventStart::Malformed => {}
        }
    }

    fallback.map(|event| event.summary.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
    use test_case::test_case;

    fn window() -> TimeWindow {
        let now = Utc.with_ymd_and_hms(2024, 2, 21, 9, 0, 0).unwrap();
        TimeWindow::starting_at(now, chrono_tz::UTC, TimeDelta::minutes(1))
    }

    fn timed(summary: &str) -> CalendarEvent {
        let at = DateTime::parse_from_rfc3339("2024-02-21T09:00:00+00:00").unwrap();
        CalendarEvent::timed(summary, at)
    }

    fn all_day(summary: &str) -> CalendarEvent {
        CalendarEvent::all_day(summary, NaiveDate::from_ymd_opt(2024, 2, 21).unwrap())
    }

    fn malformed(summary: &str) -> CalendarEvent {
        CalendarEvent::from_parts(summary, None, None)
    }

    #[test]
    fn test_empty_list_selects_nobody() {
        assert_eq!(select(&window(), &[]), None);
    }

    #[test_case(vec![timed("Alice")], "alice"; "single timed event")]
    #[test_case(vec![all_day("Bob")], "bob"; "single all-day event")]
    #[test_case(vec![all_day("Bob"), all_day("Carol")], "carol"; "last all-day event wins")]
    #[test_case(vec![all_day("Bob"), timed("Alice")], "alice"; "timed beats earlier all-day")]
    #[test_case(vec![timed("Alice"), all_day("Bob")], "alice"; "timed short-circuits the scan")]
    #[test_case(vec![timed("Alice"), timed("Dave")], "alice"; "first timed event wins")]
    #[test_case(vec![malformed("Eve"), timed("Alice")], "alice"; "malformed event is skipped")]
    #[test_case(vec![timed(""), timed("Dave")], "dave"; "empty timed summary keeps scanning")]
    #[test_case(vec![all_day("Bob"), timed(""), malformed("Eve")], "bob"; "empty timed summary keeps fallback")]
    #[test_case(vec![timed("ALICE Smith")], "alice smith"; "summary is lowercased")]
    fn test_select(events: Vec<CalendarEvent>, expected: &str) {
        assert_eq!(select(&window(), &events).as_deref(), Some(expected));
    }

    #[test_case(vec![malformed("Eve")]; "only malformed")]
    #[test_case(vec![timed("")]; "only an empty timed event")]
    fn test_select_nobody(events: Vec<CalendarEvent>) {
        assert_eq!(select(&window(), &events), None);
    }
}
