//! # Worker liveness tracker with sequence-based ordering.
//!
//! Maintains authoritative state of which workers are currently alive,
//! using event sequence numbers to handle out-of-order delivery.
//!
//! ## Architecture
//! ```text
//! Supervisor ──► Bus ──► subscriber_listener() ──► AliveTracker::update()
//!                                                         │
//!                                                         ▼
//!                                              HashMap<String, WorkerState>
//!                                                  (name → {seq, alive})
//! ```
//!
//! ## Rules
//! - Only `WorkerStarting` / `WorkerStopped` / `WorkerFailed` change alive state
//! - Read operations (`snapshot`, `is_alive`) are **eventually consistent**
//! - Events with `seq <= last_seq` are **rejected** (stale)

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{watch, RwLock};

use crate::events::{Event, EventKind};

#[derive(Debug, Clone)]
struct WorkerState {
    last_seq: u64,
    alive: bool,
}

/// Thread-safe tracker of alive workers.
///
/// Used at `Finalizing` to report workers that never stopped.
pub struct AliveTracker {
    state: RwLock<HashMap<String, WorkerState>>,
    seen: watch::Sender<u64>,
}

impl AliveTracker {
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HashMap::new()),
            seen: watch::Sender::new(0),
        }
    }

    /// Feeds one bus event: updates worker state and advances the seen mark.
    pub async fn observe(&self, ev: &Event) {
        self.update(ev).await;
        self.seen.send_if_modified(|seen| {
            if ev.seq > *seen {
                *seen = ev.seq;
                true
            } else {
                false
            }
        });
    }

    /// Waits until an event with sequence `seq` or later was observed, at most `bound`.
    ///
    /// Returns `false` if the bound elapsed first.
    pub async fn caught_up(&self, seq: u64, bound: Duration) -> bool {
        let mut rx = self.seen.subscribe();
        let res = tokio::time::timeout(bound, rx.wait_for(|seen| *seen >= seq)).await;
        matches!(res, Ok(Ok(_)))
    }

    /// Updates worker state if event is newer than last seen.
    ///
    /// ```text
    /// update(WorkerStopped, seq=100)  → alive=false, last_seq=100
    /// update(WorkerStarting, seq=99)  → rejected (stale)
    /// ```
    pub async fn update(&self, ev: &Event) -> bool {
        let name = match ev.worker.as_deref() {
            Some(n) => n,
            None => return false,
        };
        let alive = match ev.kind {
            EventKind::WorkerStarting => true,
            EventKind::WorkerStopped | EventKind::WorkerFailed => false,
            _ => return false,
        };

        let mut state = self.state.write().await;
        let entry = state.entry(name.to_string()).or_insert(WorkerState {
            last_seq: 0,
            alive: false,
        });
        if ev.seq <= entry.last_seq {
            return false;
        }
        entry.last_seq = ev.seq;
        entry.alive = alive;
        true
    }

    /// Returns sorted list of currently alive worker names.
    pub async fn snapshot(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut alive: Vec<String> = state
            .iter()
            .filter(|(_, ws)| ws.alive)
            .map(|(name, _)| name.clone())
            .collect();
        alive.sort_unstable();
        alive
    }

    /// Returns true if the worker is currently alive.
    pub async fn is_alive(&self, name: &str) -> bool {
        self.state
            .read()
            .await
            .get(name)
            .map(|ws| ws.alive)
            .unwrap_or(false)
    }
}

impl Default for AliveTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stale_events_are_rejected() {
        let tracker = AliveTracker::new();
        let starting = Event::new(EventKind::WorkerStarting).with_worker("console");
        let stopped = Event::new(EventKind::WorkerStopped).with_worker("console");

        assert!(tracker.update(&stopped).await);
        assert!(!tracker.update(&starting).await);
        assert!(!tracker.is_alive("console").await);
    }

    #[tokio::test]
    async fn snapshot_is_sorted() {
        let tracker = AliveTracker::new();
        for name in ["world", "console", "freeze-detector"] {
            tracker
                .update(&Event::new(EventKind::WorkerStarting).with_worker(name))
                .await;
        }
        tracker
            .update(&Event::new(EventKind::WorkerFailed).with_worker("world"))
            .await;

        assert_eq!(tracker.snapshot().await, vec!["console", "freeze-detector"]);
    }

    #[tokio::test]
    async fn caught_up_follows_observed_sequence() {
        let tracker = AliveTracker::new();
        let ev = Event::new(EventKind::WorkerStarting).with_worker("world");
        assert!(!tracker.caught_up(ev.seq, Duration::from_millis(10)).await);

        tracker.observe(&ev).await;
        assert!(tracker.caught_up(ev.seq, Duration::from_millis(10)).await);
        assert!(tracker.is_alive("world").await);
    }
}
