//! # Freeze detector (watchdog).
//!
//! Polls the world [`ProgressCounter`] and kills the process when it stops moving.
//!
//! ```text
//! Idle ──run()──► Running ──counter unchanged for > threshold──► Triggered ──► freeze action
//!   ▲                │
//!   └── threshold 0  └── stop requested ──► Idle
//! ```
//!
//! ## Rules
//! - The counter is compared once per poll interval; any change resets the stall clock.
//! - A stall strictly longer than the threshold triggers, at most one poll late.
//! - Threshold `0` means disabled: `run` returns at once and the state stays `Idle`.
//! - The default freeze action aborts the process without unwinding. Teardown is skipped
//!   on purpose: a frozen world cannot be stopped cleanly.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::events::{Bus, Event, EventKind};
use crate::workers::{BoxWorkerFuture, ProgressCounter, Worker, FREEZE_DETECTOR, WORLD};

/// Detector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    /// Not watching.
    Idle,
    /// Watching the counter.
    Running,
    /// Stall detected, freeze action fired.
    Triggered,
}

/// Observable detector state.
#[derive(Clone, Debug)]
pub struct WatchdogStatus(Arc<AtomicU8>);

impl WatchdogStatus {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(0)))
    }

    fn set(&self, state: WatchdogState) {
        let raw = match state {
            WatchdogState::Idle => 0,
            WatchdogState::Running => 1,
            WatchdogState::Triggered => 2,
        };
        self.0.store(raw, Ordering::Release);
    }

    /// Current state.
    pub fn get(&self) -> WatchdogState {
        match self.0.load(Ordering::Acquire) {
            1 => WatchdogState::Running,
            2 => WatchdogState::Triggered,
            _ => WatchdogState::Idle,
        }
    }
}

/// What the detector saw when it fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezeReport {
    /// Counter value that stopped moving.
    pub counter: u64,
    /// How long it has not moved.
    pub stalled_for: Duration,
}

/// Called once on trigger.
pub type FreezeAction = Arc<dyn Fn(FreezeReport) + Send + Sync>;

/// Logs and aborts the process.
pub fn abort_process() -> FreezeAction {
    Arc::new(|report: FreezeReport| {
        error!(
            counter = report.counter,
            stalled_for = ?report.stalled_for,
            "world thread hangs, kicking out server!"
        );
        std::process::abort();
    })
}

/// The watchdog worker.
pub struct FreezeDetector {
    counter: ProgressCounter,
    threshold: Duration,
    poll: Duration,
    action: FreezeAction,
    bus: Bus,
    status: WatchdogStatus,
}

impl FreezeDetector {
    /// Watches `counter`; the stall `threshold` of zero disables detection.
    pub fn new(counter: ProgressCounter, threshold: Duration, poll: Duration, bus: Bus) -> Self {
        Self {
            counter,
            threshold,
            poll: poll.max(Duration::from_millis(1)),
            action: abort_process(),
            bus,
            status: WatchdogStatus::new(),
        }
    }

    /// Replaces the freeze action.
    pub fn with_action(mut self, action: FreezeAction) -> Self {
        self.action = action;
        self
    }

    /// Handle to the state, usable after the detector moved into the worker set.
    pub fn status(&self) -> WatchdogStatus {
        self.status.clone()
    }

    async fn watch(self, ctx: CancellationToken) {
        if self.threshold.is_zero() {
            debug!("freeze detector disabled");
            return;
        }

        let mut last_counter = self.counter.read();
        let mut last_change = Instant::now();
        self.status.set(WatchdogState::Running);
        debug!(threshold = ?self.threshold, "freeze detector running");

        loop {
            tokio::select! {
                _ = ctx.cancelled() => break,
                _ = tokio::time::sleep(self.poll) => {}
            }

            let now = Instant::now();
            let current = self.counter.read();
            if current != last_counter {
                last_counter = current;
                last_change = now;
                continue;
            }

            let stalled_for = now.duration_since(last_change);
            if stalled_for > self.threshold {
                self.status.set(WatchdogState::Triggered);
                self.bus.publish(
                    Event::new(EventKind::FreezeDetected)
                        .with_worker(WORLD)
                        .with_reason(format!("{stalled_for:?}")),
                );
                (self.action)(FreezeReport {
                    counter: current,
                    stalled_for,
                });
                return;
            }
        }
        self.status.set(WatchdogState::Idle);
    }
}

impl Worker for FreezeDetector {
    fn name(&self) -> &str {
        FREEZE_DETECTOR
    }

    fn run(self: Box<Self>, ctx: CancellationToken) -> BoxWorkerFuture {
        Box::pin(async move {
            self.watch(ctx).await;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording() -> (FreezeAction, Arc<Mutex<Vec<FreezeReport>>>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        let action: FreezeAction = Arc::new(move |r: FreezeReport| sink.lock().unwrap().push(r));
        (action, fired)
    }

    fn detector(counter: &ProgressCounter, threshold_secs: u64) -> FreezeDetector {
        FreezeDetector::new(
            counter.clone(),
            Duration::from_secs(threshold_secs),
            Duration::from_secs(1),
            Bus::new(16),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_counter_triggers_within_one_poll() {
        let counter = ProgressCounter::new();
        counter.tick();
        let (action, fired) = recording();
        let det = detector(&counter, 3).with_action(action);
        let status = det.status();

        let start = Instant::now();
        Box::new(det).run(CancellationToken::new()).await.unwrap();
        let waited = start.elapsed();

        assert!(waited > Duration::from_secs(3));
        assert!(waited <= Duration::from_secs(4));
        assert_eq!(status.get(), WatchdogState::Triggered);
        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].counter, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn moving_counter_never_triggers() {
        let counter = ProgressCounter::new();
        let (action, fired) = recording();
        let det = detector(&counter, 2).with_action(action);
        let status = det.status();
        let ctx = CancellationToken::new();
        let run = tokio::spawn(Box::new(det).run(ctx.clone()));

        for _ in 0..20 {
            counter.tick();
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        assert_eq!(status.get(), WatchdogState::Running);

        ctx.cancel();
        run.await.unwrap().unwrap();
        assert!(fired.lock().unwrap().is_empty());
        assert_eq!(status.get(), WatchdogState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_threshold_stays_idle() {
        let counter = ProgressCounter::new();
        let (action, fired) = recording();
        let det = detector(&counter, 0).with_action(action);
        let status = det.status();

        Box::new(det).run(CancellationToken::new()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(status.get(), WatchdogState::Idle);
        assert!(fired.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_is_published() {
        let counter = ProgressCounter::new();
        let bus = Bus::new(4);
        let mut rx = bus.subscribe();
        let (action, _fired) = recording();
        let det = FreezeDetector::new(counter, Duration::from_secs(1), Duration::from_secs(1), bus)
            .with_action(action);

        Box::new(det).run(CancellationToken::new()).await.unwrap();

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::FreezeDetected);
        assert_eq!(ev.worker.as_deref(), Some(WORLD));
    }
}
