//! # Run a worker to completion.
//!
//! Executes one [`Worker`] with its cancellation token and publishes lifecycle events to [`Bus`].
//!
//! ## Event flow
//!
//! ```text
//! Success:
//!   worker.run() → Ok(()) → publish WorkerStopped
//!
//! Cancellation:
//!   worker.run() → Err(Canceled) → publish WorkerStopped (graceful exit)
//!
//! Failure:
//!   worker.run() → Err(Fail)  → publish WorkerFailed
//!   worker.run() → Err(Fatal) → publish WorkerFailed → termination.request(ErrorShutdown)
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event: `WorkerStopped` or `WorkerFailed`
//! - `Canceled` is treated as graceful exit → `WorkerStopped` (not `WorkerFailed`)
//! - A fatal failure after `Ready` forces the supervisor into `Draining`

use crate::{
    core::{ShutdownReason, Termination},
    error::WorkerError,
    events::{Bus, Event, EventKind},
    workers::Worker,
};
use tokio_util::sync::CancellationToken;

/// Runs `worker` until it returns, publishing lifecycle events to `bus`.
pub async fn run_worker(
    worker: Box<dyn Worker>,
    ctx: CancellationToken,
    bus: Bus,
    termination: Termination,
) -> Result<(), WorkerError> {
    let name = worker.name().to_string();
    bus.publish(Event::new(EventKind::WorkerStarting).with_worker(name.as_str()));

    match worker.run(ctx).await {
        Ok(()) | Err(WorkerError::Canceled) => {
            bus.publish(Event::new(EventKind::WorkerStopped).with_worker(name.as_str()));
            Ok(())
        }
        Err(e) => {
            bus.publish(
                Event::new(EventKind::WorkerFailed)
                    .with_worker(name.as_str())
                    .with_reason(e.to_string()),
            );
            if e.is_fatal() {
                termination.request(ShutdownReason::ErrorShutdown);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::WorkerFn;

    #[tokio::test]
    async fn cancellation_is_a_clean_stop() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let w = WorkerFn::boxed("quiet", |_ctx| async { Err(WorkerError::Canceled) });

        run_worker(w, CancellationToken::new(), bus, Termination::new())
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::WorkerStarting);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::WorkerStopped);
    }

    #[tokio::test]
    async fn fatal_failure_requests_error_shutdown() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let termination = Termination::new();
        let w = WorkerFn::boxed("broken", |_ctx| async {
            Err(WorkerError::Fatal {
                error: "cannot bind".into(),
            })
        });

        let res = run_worker(w, CancellationToken::new(), bus, termination.clone()).await;
        assert!(matches!(res, Err(WorkerError::Fatal { .. })));
        assert_eq!(termination.reason(), Some(ShutdownReason::ErrorShutdown));

        rx.recv().await.unwrap();
        let failed = rx.recv().await.unwrap();
        assert_eq!(failed.kind, EventKind::WorkerFailed);
        assert_eq!(failed.reason.as_deref(), Some("fatal error: cannot bind"));
    }

    #[tokio::test]
    async fn plain_failure_keeps_service_running() {
        let termination = Termination::new();
        let w = WorkerFn::boxed("flaky", |_ctx| async {
            Err(WorkerError::Fail { error: "x".into() })
        });
        let _ = run_worker(w, CancellationToken::new(), Bus::new(4), termination.clone()).await;
        assert!(!termination.is_stopped());
    }
}
