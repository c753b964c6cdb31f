//! # Primary worker: the world tick loop.
//!
//! ```text
//! loop (until stop requested):
//!     counter.tick()
//!     queue.try_dequeue_all(processor)
//!     world.update(diff)
//!     sleep(rest of the tick)
//! ```
//!
//! The loop runs on its own thread (`world`), at raised scheduling priority where the
//! host allows it. It is the only writer of the [`ProgressCounter`] the freeze detector reads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::commands::{CommandProcessor, CommandQueue};
use crate::error::WorkerError;
use crate::workers::{on_thread, BoxWorkerFuture, Worker, WORLD};

/// Monotonic tick counter, written by the world loop only.
#[derive(Clone, Debug, Default)]
pub struct ProgressCounter(Arc<AtomicU64>);

impl ProgressCounter {
    /// Counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one iteration.
    pub fn tick(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Current value; may be slightly stale.
    pub fn read(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-tick world simulation, called after the command drain.
pub trait WorldUpdate: Send + 'static {
    /// Advances the world by `diff`.
    fn update(&mut self, diff: Duration);
}

impl<F> WorldUpdate for F
where
    F: FnMut(Duration) + Send + 'static,
{
    fn update(&mut self, diff: Duration) {
        self(diff)
    }
}

/// World with nothing to simulate.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleWorld;

impl WorldUpdate for IdleWorld {
    fn update(&mut self, _diff: Duration) {}
}

/// The primary worker.
pub struct WorldWorker {
    queue: CommandQueue,
    processor: Arc<dyn CommandProcessor>,
    world: Box<dyn WorldUpdate>,
    counter: ProgressCounter,
    tick: Duration,
}

impl WorldWorker {
    /// Creates the worker; `tick` is the target iteration length.
    pub fn new(
        queue: CommandQueue,
        processor: Arc<dyn CommandProcessor>,
        world: Box<dyn WorldUpdate>,
        counter: ProgressCounter,
        tick: Duration,
    ) -> Self {
        Self {
            queue,
            processor,
            world,
            counter,
            tick,
        }
    }

    fn run_blocking(mut self, ctx: CancellationToken) {
        raise_priority();
        info!(tick = ?self.tick, "world loop started");

        let mut last = Instant::now();
        while !ctx.is_cancelled() {
            let started = Instant::now();
            self.counter.tick();

            let processor = &self.processor;
            let drained = self
                .queue
                .try_dequeue_all(|req| processor.process(req.text(), req.session()));
            if drained > 0 {
                debug!(drained, "commands processed");
            }

            self.world.update(started.duration_since(last));
            last = started;

            if let Some(rest) = self.tick.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        info!(ticks = self.counter.read(), "world loop stopped");
    }
}

impl Worker for WorldWorker {
    fn name(&self) -> &str {
        WORLD
    }

    /// Any failure of the world loop is fatal: nothing drains the queue without it.
    fn run(self: Box<Self>, ctx: CancellationToken) -> BoxWorkerFuture {
        let this = *self;
        let body = on_thread(WORLD, move || {
            this.run_blocking(ctx);
            Ok(())
        });
        Box::pin(async move {
            body.await.map_err(|e| match e {
                WorkerError::Fail { error } => WorkerError::Fatal { error },
                other => other,
            })
        })
    }
}

#[cfg(target_os = "linux")]
fn raise_priority() {
    // Thread-scoped on Linux: `who = 0` is the calling thread.
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, -5) };
    if rc != 0 {
        tracing::warn!(
            error = %std::io::Error::last_os_error(),
            "cannot raise world thread priority"
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn raise_priority() {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CommandOutcome, CommandRequest, SessionId};
    use std::sync::Mutex;

    fn pong(text: &str, _s: Option<&SessionId>) -> CommandOutcome {
        if text == "ping" {
            CommandOutcome::ok("pong")
        } else {
            CommandOutcome::failed("There is no such command.")
        }
    }

    #[tokio::test]
    async fn ticks_drain_commands_until_stopped() {
        let queue = CommandQueue::new();
        let counter = ProgressCounter::new();
        let updates = Arc::new(AtomicU64::new(0));
        let seen = updates.clone();

        let worker = Box::new(WorldWorker::new(
            queue.clone(),
            Arc::new(pong),
            Box::new(move |_diff: Duration| {
                seen.fetch_add(1, Ordering::Relaxed);
            }),
            counter.clone(),
            Duration::from_millis(5),
        ));
        let ctx = CancellationToken::new();
        let run = tokio::spawn(worker.run(ctx.clone()));

        let log = Arc::new(Mutex::new(Vec::new()));
        let (out, done) = (log.clone(), log.clone());
        let (tx, rx) = tokio::sync::oneshot::channel();
        queue.enqueue(CommandRequest::console(
            "ping",
            Box::new(move |text: &str| out.lock().unwrap().push(text.to_string())),
            Box::new(move |ok: bool| {
                done.lock().unwrap().push(format!("done:{ok}"));
                let _ = tx.send(());
            }),
        ));
        rx.await.unwrap();

        ctx.cancel();
        run.await.unwrap().unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["pong", "done:true"]);
        assert!(counter.read() > 0);
        assert_eq!(updates.load(Ordering::Relaxed), counter.read());
    }

    #[tokio::test]
    async fn panicking_update_is_fatal() {
        let worker = Box::new(WorldWorker::new(
            CommandQueue::new(),
            Arc::new(pong),
            Box::new(|_diff: Duration| panic!("world update exploded")),
            ProgressCounter::new(),
            Duration::from_millis(5),
        ));
        let err = worker.run(CancellationToken::new()).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("world update exploded"));
    }

    #[test]
    fn counter_is_monotonic() {
        let c = ProgressCounter::new();
        let mut last = c.read();
        for _ in 0..100 {
            c.tick();
            assert!(c.read() > last);
            last = c.read();
        }
    }
}
