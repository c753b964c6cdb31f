//! Dedicated OS threads for workers whose body blocks.
//!
//! The body runs on a named `std::thread`; the async side awaits a oneshot. If the
//! supervisor gives up on the join, the async side is aborted and the thread is left
//! detached: it can never hold the process open.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::sync::oneshot;

use crate::error::WorkerError;
use crate::subscribers::panic_message;
use crate::workers::BoxWorkerFuture;

/// Runs `body` on a new thread called `name` and resolves with its result.
///
/// A panic in `body` resolves as [`WorkerError::Fail`].
pub fn on_thread<F>(name: &str, body: F) -> BoxWorkerFuture
where
    F: FnOnce() -> Result<(), WorkerError> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let spawned = std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let res = catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|panic| {
                Err(WorkerError::Fail {
                    error: format!("panicked: {}", panic_message(&*panic)),
                })
            });
            let _ = tx.send(res);
        });

    let name = name.to_string();
    Box::pin(async move {
        if let Err(e) = spawned {
            return Err(WorkerError::Fatal {
                error: format!("cannot start {name} thread: {e}"),
            });
        }
        rx.await.unwrap_or_else(|_| {
            Err(WorkerError::Fail {
                error: format!("{name} thread vanished"),
            })
        })
    })
}
