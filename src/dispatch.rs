//! Watch and notify cycles.
//!
//! A watch cycle resolves the current buddy from the calendar, publishes it,
//! and notifies the team when it differs from the previous cycle's buddy. A
//! notify cycle announces whatever buddy is currently published.

use crate::buddy::{has_changed, Buddy};
use crate::calendar::{CalendarError, CalendarSource, TimeWindow};
use crate::directory::Directory;
use crate::notifier::{notification_message, Notifier};
use crate::render::{Renderer, TemplateRef};
use crate::selector;
use crate::state::{BuddyCell, BuddyReader};
use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub timezone: Tz,
    /// Length of the calendar window inspected by each watch cycle.
    pub watch_interval: Duration,
    /// Upper bound for any single calendar or notifier call.
    pub call_timeout: Duration,
    pub channel: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    /// No notifier is configured.
    Skipped,
    /// Number of delivery errors reported.
    Failed(usize),
}

/// What a watch cycle did, mostly for logs and tests.
#[derive(Debug, Clone)]
pub struct WatchOutcome {
    pub window: TimeWindow,
    pub buddy: Buddy,
    pub changed: bool,
    /// Lookup misses reported by this cycle, at most one.
    pub lookup_misses: usize,
    pub source_failed: bool,
    /// Set when the change triggered a notify cycle.
    pub notified: Option<NotifyOutcome>,
}

pub struct Dispatcher {
    source: Arc<dyn CalendarSource>,
    directory: Directory,
    notifier: Option<Arc<dyn Notifier>>,
    renderer: Option<(Arc<dyn Renderer>, TemplateRef)>,
    settings: DispatchSettings,
    published: BuddyCell,
    previous: Buddy,
}

impl Dispatcher {
    pub fn new(
        source: Arc<dyn CalendarSource>,
        directory: Directory,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            source,
            directory,
            notifier: None,
            renderer: None,
            settings,
            published: BuddyCell::new(),
            previous: Buddy::empty(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>, template: TemplateRef) -> Self {
        self.renderer = Some((renderer, template));
        self
    }

    /// Handle for concurrent readers of the published buddy.
    pub fn reader(&self) -> BuddyReader {
        self.published.reader()
    }

    pub fn current(&self) -> Buddy {
        self.published.snapshot()
    }

    fn window_length(&self) -> TimeDelta {
        // Intervals are bounded when the configuration is validated.
        TimeDelta::from_std(self.settings.watch_interval).unwrap_or_else(|_| TimeDelta::days(1))
    }

    async fn fetch_identity(&self, cycle_id: Uuid, window: &TimeWindow) -> Result<Option<String>, CalendarError> {
        let call_timeout = self.settings.call_timeout;
        let events = timeout(call_timeout, self.source.list_events(window))
            .await
            .unwrap_or(Err(CalendarError::Timeout(call_timeout)))?;
        debug!("WatchCycle[{}]: {} event(s) in {}", cycle_id, events.len(), window);
        Ok(selector::select(window, &events))
    }

    pub async fn run_watch_cycle(&mut self, now: DateTime<Utc>) -> WatchOutcome {
        let cycle_id = Uuid::new_v4();
        let window = TimeWindow::starting_at(now, self.settings.timezone, self.window_length());
        info!("WatchCycle[{}]: running buddy watcher on {} for {}", cycle_id, self.source.describe(), window);

        let mut source_failed = false;
        let identity = match self.fetch_identity(cycle_id, &window).await {
            Ok(identity) => identity,
            Err(e) => {
                error!("WatchCycle[{}]: unable to fetch events from calendar: {}", cycle_id, e);
                source_failed = true;
                None
            }
        };

        let mut lookup_misses = 0;
        let current = match identity {
            None => {
                warn!("WatchCycle[{}]: no buddy resolved, is the calendar filled in?", cycle_id);
                Buddy::empty()
            }
            Some(name) => match self.directory.resolve(&name) {
                Ok(contact) => Buddy::new(name, contact),
                Err(miss) => {
                    warn!("WatchCycle[{}]: {}", cycle_id, miss);
                    lookup_misses += 1;
                    Buddy::new(name, "")
                }
            },
        };

        self.published.publish(current.clone());
        info!("WatchCycle[{}]: current buddy is {}", cycle_id, current);

        let changed = has_changed(&self.previous, &current);
        let notified = if changed {
            info!("WatchCycle[{}]: changed buddy from {} to {}", cycle_id, self.previous, current);
            Some(self.run_notify_cycle().await)
        } else {
            None
        };
        self.previous = current.clone();

        if let Some((renderer, template)) = &self.renderer {
            if let Err(e) = renderer.render(&current, template) {
                error!("WatchCycle[{}]: artifact not rendered: {}", cycle_id, e);
            }
        }

        WatchOutcome { window, buddy: current, changed, lookup_misses, source_failed, notified }
    }

    pub async fn run_notify_cycle(&self) -> NotifyOutcome {
        let Some(notifier) = &self.notifier else {
            info!("No notifier configured, skipping notification");
            return NotifyOutcome::Skipped;
        };

        let buddy = self.published.snapshot();
        let message = notification_message(&buddy);
        let call_timeout = self.settings.call_timeout;

        match timeout(call_timeout, notifier.send(&message, &self.settings.channel)).await {
            Ok(Ok(())) => {
                info!("Notified {} that {} is on call", self.settings.channel, buddy);
                NotifyOutcome::Sent
            }
            Ok(Err(errors)) => {
                for e in &errors.0 {
                    warn!("Notification hasn't been sent: {}", e);
                }
                NotifyOutcome::Failed(errors.len())
            }
            Err(_) => {
                warn!("Notification hasn't been sent within {:?}", call_timeout);
                NotifyOutcome::Failed(1)
            }
        }
    }
}
