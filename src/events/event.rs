//! # Runtime events emitted by the supervisor and its workers.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Lifecycle events**: supervisor phase transitions and shutdown requests
//! - **Worker events**: worker execution flow (starting, stopped, failed, joined)
//! - **Subscriber events**: fan-out health (overflow, panic)
//!
//! The [`Event`] struct carries additional metadata such as timestamps, worker name,
//! reasons, and the phase or shutdown reason involved.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use worldvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::WorkerFailed)
//!     .with_worker("remote-admin")
//!     .with_reason("address in use");
//!
//! assert_eq!(ev.kind, EventKind::WorkerFailed);
//! assert_eq!(ev.worker.as_deref(), Some("remote-admin"));
//! assert_eq!(ev.reason.as_deref(), Some("address in use"));
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::core::{Phase, ShutdownReason};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Lifecycle events ===
    /// Supervisor entered a new phase.
    ///
    /// Sets:
    /// - `phase`: the phase just entered
    PhaseChanged,

    /// First termination request was recorded.
    ///
    /// Sets:
    /// - `shutdown`: the winning reason
    ShutdownRequested,

    /// World listener bound its socket.
    ///
    /// Sets:
    /// - `addr`: local address
    ListenerBound,

    /// Freeze detector saw a stalled progress counter.
    ///
    /// Sets:
    /// - `worker`: name of the stalled worker
    /// - `reason`: stall duration
    FreezeDetected,

    // === Worker events ===
    /// Worker is about to run.
    ///
    /// Sets:
    /// - `worker`: worker name
    WorkerStarting,

    /// Worker finished (cleanly **or** by observing cancellation).
    ///
    /// Sets:
    /// - `worker`: worker name
    WorkerStopped,

    /// Worker returned an error.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `reason`: failure message
    WorkerFailed,

    /// Supervisor joined the worker (it is gone for good).
    ///
    /// Sets:
    /// - `worker`: worker name
    WorkerJoined,

    /// Join bound exceeded; the worker was abandoned.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `reason`: bound that was exceeded
    JoinTimedOut,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the worker, if applicable.
    pub worker: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Phase entered (only for `PhaseChanged`).
    pub phase: Option<Phase>,
    /// Termination reason (only for `ShutdownRequested`).
    pub shutdown: Option<ShutdownReason>,
    /// Bound address (only for `ListenerBound`).
    pub addr: Option<SocketAddr>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            reason: None,
            phase: None,
            shutdown: None,
            addr: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a worker name.
    #[inline]
    pub fn with_worker(mut self, worker: impl Into<Arc<str>>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Attaches the phase just entered.
    #[inline]
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Attaches the recorded termination reason.
    #[inline]
    pub fn with_shutdown(mut self, reason: ShutdownReason) -> Self {
        self.shutdown = Some(reason);
        self
    }

    /// Attaches a socket address.
    #[inline]
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    /// Creates a `PhaseChanged` event.
    #[inline]
    pub fn phase(phase: Phase) -> Self {
        Event::new(EventKind::PhaseChanged).with_phase(phase)
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_worker(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_worker(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}
