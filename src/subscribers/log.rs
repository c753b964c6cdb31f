//! # LogWriter: renders runtime events through `tracing`
//!
//! A subscriber that turns every [`Event`] into one structured log line.
//!
//! ## Example output
//! ```text
//! INFO  worldvisor::events: phase phase=Ready
//! INFO  worldvisor::events: worker starting worker="world"
//! WARN  worldvisor::events: worker failed worker="remote-admin" reason="address in use"
//! INFO  worldvisor::events: shutdown requested reason=Restart
//! WARN  worldvisor::events: join timed out worker="console" reason="500ms"
//! ```

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "worldvisor::events";

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let worker = e.worker.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::PhaseChanged => {
                info!(target: TARGET, phase = ?e.phase, "phase");
            }
            EventKind::ShutdownRequested => {
                info!(target: TARGET, reason = ?e.shutdown, "shutdown requested");
            }
            EventKind::ListenerBound => {
                info!(target: TARGET, addr = ?e.addr, "listener bound");
            }
            EventKind::FreezeDetected => {
                error!(target: TARGET, worker, reason, "freeze detected");
            }
            EventKind::WorkerStarting => {
                info!(target: TARGET, worker, "worker starting");
            }
            EventKind::WorkerStopped => {
                info!(target: TARGET, worker, "worker stopped");
            }
            EventKind::WorkerFailed => {
                warn!(target: TARGET, worker, reason, "worker failed");
            }
            EventKind::WorkerJoined => {
                info!(target: TARGET, worker, "worker joined");
            }
            EventKind::JoinTimedOut => {
                warn!(target: TARGET, worker, reason, "join timed out");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: TARGET, subscriber = worker, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(target: TARGET, subscriber = worker, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
