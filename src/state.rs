//! The published on-call buddy.
//!
//! The dispatcher is the only writer; the status endpoint and anyone else
//! holding a [`BuddyReader`] get whole snapshots without waiting on a cycle.

use crate::buddy::Buddy;
use tokio::sync::watch;

/// Single-writer cell holding the latest resolved buddy.
pub struct BuddyCell {
    tx: watch::Sender<Buddy>,
}

/// Read-only handle on a [`BuddyCell`]. Cheap to clone.
#[derive(Clone)]
pub struct BuddyReader {
    rx: watch::Receiver<Buddy>,
}

impl BuddyCell {
    /// Starts out holding the empty buddy.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Buddy::empty());
        Self { tx }
    }

    /// Replaces the published value in one step and returns the one it
    /// replaced.
    pub fn publish(&self, buddy: Buddy) -> Buddy {
        self.tx.send_replace(buddy)
    }

    pub fn snapshot(&self) -> Buddy {
        self.tx.borrow().clone()
    }

    pub fn reader(&self) -> BuddyReader {
        BuddyReader { rx: self.tx.subscribe() }
    }
}

impl Default for BuddyCell {
    fn default() -> Self {
        Self::new()
    }
}

impl BuddyReader {
    pub fn snapshot(&self) -> Buddy {
        self.rx.borrow().clone()
    }
}
