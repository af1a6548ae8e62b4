use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use oncall_buddy_finder::buddy::Buddy;
use oncall_buddy_finder::calendar::{CalendarError, CalendarEvent, CalendarSource, TimeWindow};
use oncall_buddy_finder::directory::Directory;
use oncall_buddy_finder::dispatch::{DispatchSettings, Dispatcher, NotifyOutcome};
use oncall_buddy_finder::notifier::{DeliveryErrors, Notifier};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Calendar whose content the test rewrites between cycles.
#[derive(Default)]
struct ScriptedCalendar {
    events: Mutex<Vec<CalendarEvent>>,
    windows: Mutex<Vec<TimeWindow>>,
}

impl ScriptedCalendar {
    fn set(&self, events: Vec<CalendarEvent>) {
        *self.events.lock().unwrap() = events;
    }
}

#[async_trait]
impl CalendarSource for ScriptedCalendar {
    async fn list_events(&self, window: &TimeWindow) -> Result<Vec<CalendarEvent>, CalendarError> {
        self.windows.lock().unwrap().push(window.clone());
        Ok(self.events.lock().unwrap().clone())
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str, channel: &str) -> Result<(), DeliveryErrors> {
        self.sent.lock().unwrap().push((message.to_string(), channel.to_string()));
        Ok(())
    }
}

struct Harness {
    calendar: Arc<ScriptedCalendar>,
    notifier: Arc<RecordingNotifier>,
    dispatcher: Dispatcher,
}

fn harness(directory: Directory) -> Harness {
    let calendar = Arc::new(ScriptedCalendar::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let settings = DispatchSettings {
        timezone: chrono_tz::Europe::Paris,
        watch_interval: Duration::from_secs(60),
        call_timeout: Duration::from_secs(5),
        channel: "#oncall".to_string(),
    };
    let dispatcher = Dispatcher::new(calendar.clone(), directory, settings)
        .with_notifier(notifier.clone());
    Harness { calendar, notifier, dispatcher }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 21, 8, 0, 17).unwrap()
}

fn alice_at_nine() -> CalendarEvent {
    CalendarEvent::timed("Alice", DateTime::parse_from_rfc3339("2024-02-21T09:00:00+01:00").unwrap())
}

fn bob_all_day() -> CalendarEvent {
    CalendarEvent::all_day("Bob", NaiveDate::from_ymd_opt(2024, 2, 21).unwrap())
}

#[tokio::test]
async fn first_cycle_resolves_and_notifies() {
    let mut h = harness(Directory::new([("alice", "+1-555-0100")]));
    h.calendar.set(vec![alice_at_nine()]);
    let reader = h.dispatcher.reader();

    let outcome = h.dispatcher.run_watch_cycle(now()).await;

    assert_eq!(outcome.buddy, Buddy::new("alice", "+1-555-0100"));
    assert!(outcome.changed);
    assert_eq!(outcome.lookup_misses, 0);
    assert_eq!(outcome.notified, Some(NotifyOutcome::Sent));
    assert_eq!(reader.snapshot(), Buddy::new("alice", "+1-555-0100"));
    assert_eq!(
        h.notifier.sent.lock().unwrap().clone(),
        vec![(
            "<!channel>: Just for your information *alice* (+1-555-0100) is on call".to_string(),
            "#oncall".to_string()
        )]
    );

    // The window starts at the current minute in the configured timezone.
    let windows = h.calendar.windows.lock().unwrap().clone();
    assert_eq!(windows[0].start.to_rfc3339(), "2024-02-21T09:00:00+01:00");
    assert_eq!(windows[0].end.to_rfc3339(), "2024-02-21T09:01:00+01:00");
}

#[tokio::test]
async fn identical_cycles_notify_only_once() {
    let mut h = harness(Directory::new([("alice", "+1-555-0100")]));
    h.calendar.set(vec![alice_at_nine()]);

    let first = h.dispatcher.run_watch_cycle(now()).await;
    let second = h.dispatcher.run_watch_cycle(now()).await;

    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(second.notified, None);
    assert_eq!(h.notifier.messages().len(), 1);

    // The cadence driven notify cycle still announces the current buddy.
    assert_eq!(h.dispatcher.run_notify_cycle().await, NotifyOutcome::Sent);
    assert_eq!(h.notifier.messages().len(), 2);
    assert!(h.notifier.messages()[1].contains("*alice*"));
}

#[tokio::test]
async fn empty_calendar_after_buddy_warns_the_team() {
    let mut h = harness(Directory::new([("alice", "+1-555-0100")]));
    h.calendar.set(vec![alice_at_nine()]);
    h.dispatcher.run_watch_cycle(now()).await;

    h.calendar.set(vec![]);
    let outcome = h.dispatcher.run_watch_cycle(now()).await;

    assert_eq!(outcome.buddy, Buddy::empty());
    assert!(outcome.buddy.is_empty());
    assert!(outcome.changed);
    assert!(!outcome.source_failed);
    assert!(h.dispatcher.current().is_empty());

    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].starts_with("<!channel>: :warning:"));
    assert!(messages[1].contains("no buddy on call"));
}

#[tokio::test]
async fn unknown_all_day_buddy_is_published_without_contact() {
    let mut h = harness(Directory::new([("alice", "+1-555-0100")]));
    h.calendar.set(vec![bob_all_day()]);

    let outcome = h.dispatcher.run_watch_cycle(now()).await;

    assert_eq!(outcome.buddy, Buddy::new("bob", ""));
    assert_eq!(outcome.lookup_misses, 1);
    assert!(outcome.changed);
    assert_eq!(h.notifier.messages(), vec!["<!channel>: Just for your information *bob* () is on call"]);

    // The miss does not make the next identical cycle look like a change.
    let outcome = h.dispatcher.run_watch_cycle(now()).await;
    assert_eq!(outcome.lookup_misses, 1);
    assert!(!outcome.changed);
}

#[tokio::test]
async fn timed_entry_takes_over_from_all_day_placeholder() {
    let mut h = harness(Directory::new([("alice", "+1-555-0100"), ("bob", "+1-555-0101")]));
    h.calendar.set(vec![bob_all_day()]);
    assert_eq!(h.dispatcher.run_watch_cycle(now()).await.buddy.name, "bob");

    h.calendar.set(vec![bob_all_day(), alice_at_nine()]);
    let outcome = h.dispatcher.run_watch_cycle(now()).await;

    assert_eq!(outcome.buddy, Buddy::new("alice", "+1-555-0100"));
    assert!(outcome.changed);
    assert_eq!(h.notifier.messages().len(), 2);
}

#[tokio::test]
async fn contact_change_alone_is_a_transition() {
    let calendar = Arc::new(ScriptedCalendar::default());
    calendar.set(vec![alice_at_nine()]);
    let settings = DispatchSettings {
        timezone: chrono_tz::UTC,
        watch_interval: Duration::from_secs(60),
        call_timeout: Duration::from_secs(5),
        channel: "#oncall".to_string(),
    };

    let mut before = Dispatcher::new(calendar.clone(), Directory::new([("alice", "+1-555-0100")]), settings.clone());
    let mut after = Dispatcher::new(calendar, Directory::new([("alice", "+1-555-0199")]), settings);
    let old = before.run_watch_cycle(now()).await.buddy;
    let new = after.run_watch_cycle(now()).await.buddy;

    assert!(oncall_buddy_finder::buddy::has_changed(&old, &new));
    assert!(!oncall_buddy_finder::buddy::has_changed(&new, &new.clone()));
}
