//! # Worker set - named handles owned by the supervisor.
//!
//! The set spawns workers through [`run_worker`](super::runner::run_worker), keeps one
//! [`WorkerHandle`] per name and performs bounded joins in whatever order the supervisor
//! asks for.
//!
//! ## Architecture
//! ```text
//! WorkerSet::spawn(worker)
//!     ├─► unblocker = worker.unblocker()
//!     ├─► ctx = termination.token().child_token()
//!     └─► tokio::spawn(run_worker(worker, ctx)) ──► WorkerHandle { ctx, join, running }
//!
//! WorkerSet::join(name, bound)
//!     ├─► Joined    → publish WorkerJoined
//!     ├─► Panicked  → publish WorkerFailed(worker_panic) + WorkerJoined
//!     └─► TimedOut  → abort the async side, publish JoinTimedOut
//! ```
//!
//! ## Rules
//! - Every worker token is a child of the termination token: a termination request
//!   stops every worker, `stop(name)` stops one.
//! - A join never waits longer than its bound.
//! - Names are unique; spawning a duplicate name is refused.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::{runner::run_worker, Termination};
use crate::error::WorkerError;
use crate::events::{Bus, Event, EventKind};
use crate::workers::{Unblocker, Worker};

/// How a bounded join ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Worker finished (cleanly or with an error already reported).
    Joined,
    /// Worker task panicked.
    Panicked,
    /// Bound exceeded; the worker was abandoned.
    TimedOut,
}

/// Handle to one running worker.
pub struct WorkerHandle {
    cancel: CancellationToken,
    join: JoinHandle<Result<(), WorkerError>>,
    unblock: Option<Unblocker>,
    running: Arc<AtomicBool>,
}

impl WorkerHandle {
    /// True until the worker future returned.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Requests a cooperative stop.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Fires the worker's unblock hook, if it has one. Returns whether a hook ran.
    pub fn force_unblock(&self) -> bool {
        match &self.unblock {
            Some(unblock) => {
                unblock();
                true
            }
            None => false,
        }
    }

    /// Waits for the worker to exit, at most `bound`.
    pub async fn join(mut self, bound: Duration) -> JoinOutcome {
        match tokio::time::timeout(bound, &mut self.join).await {
            Ok(Ok(_)) => JoinOutcome::Joined,
            Ok(Err(_panic)) => JoinOutcome::Panicked,
            Err(_elapsed) => {
                self.join.abort();
                JoinOutcome::TimedOut
            }
        }
    }
}

/// Named set of running workers.
pub struct WorkerSet {
    handles: HashMap<String, WorkerHandle>,
    bus: Bus,
    termination: Termination,
}

impl WorkerSet {
    /// Creates an empty set.
    pub fn new(bus: Bus, termination: Termination) -> Self {
        Self {
            handles: HashMap::new(),
            bus,
            termination,
        }
    }

    /// Spawns `worker`; returns `false` if a worker with the same name is already present.
    pub fn spawn(&mut self, worker: Box<dyn Worker>) -> bool {
        let name = worker.name().to_string();
        if self.handles.contains_key(&name) {
            self.bus.publish(
                Event::new(EventKind::WorkerFailed)
                    .with_worker(name.as_str())
                    .with_reason("worker_already_exists"),
            );
            return false;
        }

        let unblock = worker.unblocker();
        let cancel = self.termination.token().child_token();
        let running = Arc::new(AtomicBool::new(true));

        let fut = run_worker(
            worker,
            cancel.clone(),
            self.bus.clone(),
            self.termination.clone(),
        );
        let flag = running.clone();
        let join = tokio::spawn(async move {
            let res = fut.await;
            flag.store(false, Ordering::Release);
            res
        });

        let handle = WorkerHandle {
            cancel,
            join,
            unblock,
            running,
        };
        self.handles.insert(name, handle);
        true
    }

    /// Requests a cooperative stop of one worker. Returns `false` if unknown.
    pub fn stop(&self, name: &str) -> bool {
        match self.handles.get(name) {
            Some(h) => {
                h.stop();
                true
            }
            None => false,
        }
    }

    /// Fires the unblock hook of one worker. Returns whether a hook ran.
    pub fn force_unblock(&self, name: &str) -> bool {
        self.handles
            .get(name)
            .map(WorkerHandle::force_unblock)
            .unwrap_or(false)
    }

    /// Removes the worker and waits for it, at most `bound`. `None` if unknown.
    pub async fn join(&mut self, name: &str, bound: Duration) -> Option<JoinOutcome> {
        let handle = self.handles.remove(name)?;
        let outcome = handle.join(bound).await;
        self.report(name, outcome, bound);
        Some(outcome)
    }

    /// `stop` followed by `join`.
    pub async fn stop_and_join(&mut self, name: &str, bound: Duration) -> Option<JoinOutcome> {
        self.stop(name);
        self.join(name, bound).await
    }

    /// True if the worker is present and its future has not returned.
    pub fn is_running(&self, name: &str) -> bool {
        self.handles
            .get(name)
            .map(WorkerHandle::is_running)
            .unwrap_or(false)
    }

    /// True if the worker is present.
    pub fn contains(&self, name: &str) -> bool {
        self.handles.contains_key(name)
    }

    /// Returns sorted list of present worker names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handles.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// True if no worker is present.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    fn report(&self, name: &str, outcome: JoinOutcome, bound: Duration) {
        match outcome {
            JoinOutcome::Joined => {
                self.bus
                    .publish(Event::new(EventKind::WorkerJoined).with_worker(name));
            }
            JoinOutcome::Panicked => {
                self.bus.publish(
                    Event::new(EventKind::WorkerFailed)
                        .with_worker(name)
                        .with_reason("worker_panic"),
                );
                self.bus
                    .publish(Event::new(EventKind::WorkerJoined).with_worker(name));
            }
            JoinOutcome::TimedOut => {
                self.bus.publish(
                    Event::new(EventKind::JoinTimedOut)
                        .with_worker(name)
                        .with_reason(format!("{bound:?}")),
                );
            }
        }
    }
}
