//! Drives the watch and notify cadences.
//!
//! Both timers are multiplexed on a single task, so at most one cycle runs at
//! a time. Ticks that come due while a cycle is still running are dropped
//! rather than queued up.

use crate::dispatch::Dispatcher;
use chrono::Utc;
use log::{debug, info};
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub watch_interval: Duration,
    pub notify_interval: Duration,
    pub run_at_startup: bool,
}

/// Start and end of the last cycle that ran.
#[derive(Debug, Clone, Copy)]
struct Busy {
    started: Instant,
    finished: Instant,
}

impl Busy {
    /// A tick scheduled strictly inside the last cycle arrived while it was
    /// running. Ticks due at the very moment a cycle starts are kept, so
    /// coinciding watch and notify deadlines both run.
    fn overran(&self, due: Instant) -> bool {
        self.started < due && due < self.finished
    }
}

pub struct Scheduler {
    dispatcher: Dispatcher,
    settings: SchedulerSettings,
    last_cycle: Option<Busy>,
}

impl Scheduler {
    pub fn new(dispatcher: Dispatcher, settings: SchedulerSettings) -> Self {
        Self { dispatcher, settings, last_cycle: None }
    }

    fn is_stale(&self, kind: &str, due: Instant) -> bool {
        let stale = self.last_cycle.is_some_and(|busy| busy.overran(due));
        if stale {
            debug!("Dropping {} tick that came due while a cycle was running", kind);
        }
        stale
    }

    async fn watch_cycle(&mut self) {
        let started = Instant::now();
        self.dispatcher.run_watch_cycle(Utc::now()).await;
        self.last_cycle = Some(Busy { started, finished: Instant::now() });
    }

    async fn notify_cycle(&mut self) {
        let started = Instant::now();
        self.dispatcher.run_notify_cycle().await;
        self.last_cycle = Some(Busy { started, finished: Instant::now() });
    }

    /// Runs until `shutdown` resolves. Shutdown is only observed between
    /// cycles; a cycle in flight always completes. Hands the dispatcher back
    /// so its final state can be inspected.
    pub async fn run_until<F>(mut self, shutdown: F) -> Dispatcher
    where
        F: Future<Output = ()>,
    {
        let SchedulerSettings { watch_interval, notify_interval, run_at_startup } = self.settings;
        info!(
            "Scheduling buddy watcher every {:?} and notifications every {:?}",
            watch_interval, notify_interval
        );

        if run_at_startup {
            self.watch_cycle().await;
        }

        // Skip makes a late timer deliver a single overdue tick and realign
        // on its grid; that overdue tick is then dropped by `is_stale`.
        let start = Instant::now();
        let mut watch = interval_at(start + watch_interval, watch_interval);
        watch.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut notify = interval_at(start + notify_interval, notify_interval);
        notify.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Scheduler stopping");
                    break;
                }
                due = watch.tick() => {
                    if !self.is_stale("watch", due) {
                        self.watch_cycle().await;
                    }
                }
                due = notify.tick() => {
                    if !self.is_stale("notify", due) {
                        self.notify_cycle().await;
                    }
                }
            }
        }

        self.dispatcher
    }
}
