//! # Thread-safe FIFO of command requests.
//!
//! [`CommandQueue`] is multiple-producer / single-consumer: producers [`enqueue`](CommandQueue::enqueue)
//! from any thread, the primary worker drains once per tick with
//! [`try_dequeue_all`](CommandQueue::try_dequeue_all).
//!
//! ```text
//! console ──┐
//! remote  ──┼──► enqueue ──► [ VecDeque ] ──► try_dequeue_all(handler)   (world tick)
//! ...     ──┘                     │                 └─► per request: handler → complete()
//!                               close()  ──► pending + late requests → failed: shutting down
//! ```
//!
//! ## Rules
//! - `enqueue` never waits on the consumer.
//! - A drain takes the whole pending batch under the lock, then processes it outside the lock;
//!   requests enqueued meanwhile wait for the next tick.
//! - No request is dropped: after `close()` every pending or late request completes with `false`.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::commands::{CommandOutcome, CommandRequest};
use crate::subscribers::panic_message;

#[derive(Default)]
struct State {
    pending: VecDeque<CommandRequest>,
    closed: bool,
}

/// Cloneable handle to the shared queue.
#[derive(Clone, Default)]
pub struct CommandQueue {
    state: Arc<Mutex<State>>,
}

impl CommandQueue {
    /// Creates an empty, open queue.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a request; rejects it at once if the queue is closed.
    pub fn enqueue(&self, req: CommandRequest) {
        let rejected = {
            let mut state = self.lock();
            if state.closed {
                Some(req)
            } else {
                state.pending.push_back(req);
                None
            }
        };
        if let Some(req) = rejected {
            req.reject_shutting_down();
        }
    }

    /// Drains every currently queued request, in enqueue order, through `handler`.
    ///
    /// Each request's sinks fire right after its handler call. A panicking handler
    /// fails only its own request. Returns how many requests were processed.
    pub fn try_dequeue_all<F>(&self, mut handler: F) -> usize
    where
        F: FnMut(&CommandRequest) -> CommandOutcome,
    {
        let batch = std::mem::take(&mut self.lock().pending);
        let count = batch.len();

        for req in batch {
            let outcome = match catch_unwind(AssertUnwindSafe(|| handler(&req))) {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let info = panic_message(&*panic);
                    warn!(command = req.text(), panic = %info, "command handler panicked");
                    CommandOutcome::failed(format!("Command failed: {info}"))
                }
            };
            req.complete(outcome);
        }
        count
    }

    /// Closes the queue and fails every pending request. Returns how many were failed.
    pub fn close(&self) -> usize {
        let pending = {
            let mut state = self.lock();
            state.closed = true;
            std::mem::take(&mut state.pending)
        };
        let count = pending.len();
        for req in pending {
            req.reject_shutting_down();
        }
        count
    }

    /// True once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// True if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::SHUTTING_DOWN;

    type Log = Arc<Mutex<Vec<String>>>;

    fn request(text: &str, log: &Log) -> CommandRequest {
        let (out, done) = (log.clone(), log.clone());
        let tag = text.to_string();
        let tag2 = text.to_string();
        CommandRequest::console(
            text,
            Box::new(move |s: &str| out.lock().unwrap().push(format!("{tag} out:{s}"))),
            Box::new(move |ok: bool| done.lock().unwrap().push(format!("{tag2} done:{ok}"))),
        )
    }

    #[test]
    fn drain_processes_in_enqueue_order_once_each() {
        let log: Log = Arc::default();
        let queue = CommandQueue::new();
        for i in 0..5 {
            queue.enqueue(request(&format!("c{i}"), &log));
        }

        let mut seen = Vec::new();
        let n = queue.try_dequeue_all(|req| {
            seen.push(req.text().to_string());
            CommandOutcome::ok("")
        });

        assert_eq!(n, 5);
        assert_eq!(seen, vec!["c0", "c1", "c2", "c3", "c4"]);
        let done: Vec<String> = log.lock().unwrap().clone();
        assert_eq!(
            done,
            vec!["c0 done:true", "c1 done:true", "c2 done:true", "c3 done:true", "c4 done:true"]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn empty_drain_is_a_no_op() {
        let queue = CommandQueue::new();
        let mut called = false;
        assert_eq!(
            queue.try_dequeue_all(|_| {
                called = true;
                CommandOutcome::ok("")
            }),
            0
        );
        assert!(!called);
    }

    #[test]
    fn requests_enqueued_during_a_drain_wait_for_the_next_one() {
        let log: Log = Arc::default();
        let queue = CommandQueue::new();
        queue.enqueue(request("first", &log));

        let producer = queue.clone();
        let late_log = log.clone();
        let n = queue.try_dequeue_all(|_| {
            producer.enqueue(request("late", &late_log));
            CommandOutcome::ok("")
        });
        assert_eq!(n, 1);
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.try_dequeue_all(|_| CommandOutcome::ok("")), 1);
    }

    #[test]
    fn ping_pong_end_to_end() {
        let log: Log = Arc::default();
        let queue = CommandQueue::new();
        queue.enqueue(request("ping", &log));

        queue.try_dequeue_all(|req| {
            if req.text() == "ping" {
                CommandOutcome::ok("pong")
            } else {
                CommandOutcome::failed("?")
            }
        });

        assert_eq!(*log.lock().unwrap(), vec!["ping out:pong", "ping done:true"]);
    }

    #[test]
    fn close_fails_pending_and_late_requests() {
        let log: Log = Arc::default();
        let queue = CommandQueue::new();
        queue.enqueue(request("pending", &log));

        assert_eq!(queue.close(), 1);
        queue.enqueue(request("late", &log));

        let mut reached = false;
        queue.try_dequeue_all(|_| {
            reached = true;
            CommandOutcome::ok("")
        });
        assert!(!reached);
        assert!(queue.is_closed());
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                format!("pending out:{SHUTTING_DOWN}"),
                "pending done:false".to_string(),
                format!("late out:{SHUTTING_DOWN}"),
                "late done:false".to_string(),
            ]
        );
    }

    #[test]
    fn panicking_handler_fails_only_its_request() {
        let log: Log = Arc::default();
        let queue = CommandQueue::new();
        queue.enqueue(request("bad", &log));
        queue.enqueue(request("good", &log));

        queue.try_dequeue_all(|req| {
            if req.text() == "bad" {
                panic!("handler exploded");
            }
            CommandOutcome::ok("fine")
        });

        let log = log.lock().unwrap();
        assert!(log.contains(&"bad done:false".to_string()));
        assert!(log.contains(&"good out:fine".to_string()));
        assert!(log.contains(&"good done:true".to_string()));
    }

    #[test]
    fn producers_on_many_threads() {
        let queue = CommandQueue::new();
        let log: Log = Arc::default();
        let producers: Vec<_> = (0..4)
            .map(|t| {
                let queue = queue.clone();
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        queue.enqueue(request(&format!("t{t}-{i}"), &log));
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        let mut per_thread: Vec<Vec<usize>> = vec![Vec::new(); 4];
        queue.try_dequeue_all(|req| {
            let (t, i) = req.text()[1..].split_once('-').unwrap();
            per_thread[t.parse::<usize>().unwrap()].push(i.parse().unwrap());
            CommandOutcome::ok("")
        });
        for seq in per_thread {
            assert_eq!(seq, (0..25).collect::<Vec<_>>());
        }
    }
}
