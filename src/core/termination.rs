//! # Single-assignment termination cell.
//!
//! [`Termination`] records the first [`ShutdownReason`] ever requested and broadcasts
//! the stop to every holder through a [`CancellationToken`].
//!
//! ```text
//! signal hook ─┐
//! console EOF ─┼──► request(reason) ──► OnceLock (first wins) ──► token.cancel()
//! server exit ─┤                                                     │
//! listener    ─┘                               workers poll is_stopped() / await cancelled()
//! ```
//!
//! ## Rules
//! - The reason is written before the token is cancelled, so any reader that
//!   observes the stop also observes the reason.
//! - Later requests are ignored and return `false`.
//! - The cell is never cleared.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::core::ShutdownReason;
use crate::events::{Bus, Event, EventKind};

struct Inner {
    reason: OnceLock<ShutdownReason>,
    token: CancellationToken,
    bus: Option<Bus>,
}

/// Cloneable handle to the process-wide termination cell.
#[derive(Clone)]
pub struct Termination {
    inner: Arc<Inner>,
}

impl Termination {
    /// Creates a standalone cell (no events published).
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates a cell that publishes `ShutdownRequested` on the first request.
    pub fn with_bus(bus: Bus) -> Self {
        Self::build(Some(bus))
    }

    fn build(bus: Option<Bus>) -> Self {
        Self {
            inner: Arc::new(Inner {
                reason: OnceLock::new(),
                token: CancellationToken::new(),
                bus,
            }),
        }
    }

    /// Requests termination. Returns `true` if this call set the reason.
    pub fn request(&self, reason: ShutdownReason) -> bool {
        if self.inner.reason.set(reason).is_err() {
            return false;
        }
        if let Some(bus) = &self.inner.bus {
            bus.publish(Event::new(EventKind::ShutdownRequested).with_shutdown(reason));
        }
        self.inner.token.cancel();
        true
    }

    /// The winning reason, if any request was made.
    #[inline]
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.inner.reason.get().copied()
    }

    /// True once any request was made.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Completes when termination is requested.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.token.cancelled()
    }

    /// Token cancelled on termination; derive per-worker children from it.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }
}

impl Default for Termination {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    #[test]
    fn first_request_wins() {
        let t = Termination::new();
        assert!(t.reason().is_none());
        assert!(!t.is_stopped());

        assert!(t.request(ShutdownReason::Restart));
        assert!(!t.request(ShutdownReason::Shutdown));

        assert_eq!(t.reason(), Some(ShutdownReason::Restart));
        assert!(t.is_stopped());
    }

    #[test]
    fn concurrent_writers_leave_exactly_one_reason() {
        for _ in 0..50 {
            let t = Termination::new();
            let barrier = Arc::new(Barrier::new(2));
            let writers: Vec<_> = [ShutdownReason::Restart, ShutdownReason::Shutdown]
                .into_iter()
                .map(|reason| {
                    let t = t.clone();
                    let barrier = barrier.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        (reason, t.request(reason))
                    })
                })
                .collect();

            let results: Vec<(ShutdownReason, bool)> =
                writers.into_iter().map(|h| h.join().unwrap()).collect();
            let winners: Vec<_> = results.iter().filter(|(_, won)| *won).collect();
            assert_eq!(winners.len(), 1);

            let winner = winners[0].0;
            for _ in 0..3 {
                assert_eq!(t.clone().reason(), Some(winner));
            }
        }
    }

    #[tokio::test]
    async fn publishes_once_and_wakes_waiters() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let t = Termination::with_bus(bus);

        let waiter = {
            let t = t.clone();
            tokio::spawn(async move {
                t.cancelled().await;
                t.reason()
            })
        };

        t.request(ShutdownReason::Shutdown);
        t.request(ShutdownReason::ErrorShutdown);

        assert_eq!(waiter.await.unwrap(), Some(ShutdownReason::Shutdown));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ShutdownRequested);
        assert_eq!(ev.shutdown, Some(ShutdownReason::Shutdown));
        assert!(rx.try_recv().is_err());
    }
}
