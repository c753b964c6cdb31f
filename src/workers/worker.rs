//! # Worker abstraction and function-backed worker implementation.
//!
//! This module defines the [`Worker`] trait (async, cancelable, runs once) and a
//! convenient function-backed implementation [`WorkerFn`].
//!
//! A worker receives a [`CancellationToken`] and should check it at safe points
//! (tick boundaries, read-loop iterations) to stop cooperatively during shutdown.
//! Workers whose body blocks in a call without a cancellation primitive expose an
//! [`Unblocker`], a best-effort hook the supervisor fires right before joining them.

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;

/// Boxed future returned by [`Worker::run`].
pub type BoxWorkerFuture = Pin<Box<dyn Future<Output = Result<(), WorkerError>> + Send + 'static>>;

/// Best-effort hook that wakes a worker blocked in an uncancellable call.
pub type Unblocker = Arc<dyn Fn() + Send + Sync>;

/// # Asynchronous, cancelable, run-once unit.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use worldvisor::{BoxWorkerFuture, Worker};
///
/// struct Heartbeat;
///
/// impl Worker for Heartbeat {
///     fn name(&self) -> &str { "heartbeat" }
///
///     fn run(self: Box<Self>, ctx: CancellationToken) -> BoxWorkerFuture {
///         Box::pin(async move {
///             ctx.cancelled().await;
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Worker: Send + 'static {
    /// Returns a stable, human-readable worker name.
    fn name(&self) -> &str;

    /// Hook that forces a blocked worker to observe its stop request.
    ///
    /// Called before [`run`](Worker::run) so the supervisor keeps it after the worker moved.
    fn unblocker(&self) -> Option<Unblocker> {
        None
    }

    /// Consumes the worker and runs it until completion or cancellation.
    fn run(self: Box<Self>, ctx: CancellationToken) -> BoxWorkerFuture;
}

/// # Function-backed worker implementation.
///
/// Wraps a closure that *creates* the worker future once.
///
/// # Example
/// ```rust
/// use tokio_util::sync::CancellationToken;
/// use worldvisor::{Worker, WorkerFn, WorkerError};
///
/// let w = WorkerFn::boxed("hello", |ctx: CancellationToken| async move {
///     ctx.cancelled().await;
///     Ok::<_, WorkerError>(())
/// });
/// assert_eq!(w.name(), "hello");
/// ```
pub struct WorkerFn<F> {
    name: Cow<'static, str>,
    f: F,
    unblock: Option<Unblocker>,
}

impl<F> WorkerFn<F> {
    /// Creates a new function-backed worker.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            unblock: None,
        }
    }

    /// Attaches an unblock hook.
    pub fn with_unblocker(mut self, unblock: Unblocker) -> Self {
        self.unblock = Some(unblock);
        self
    }
}

impl<F, Fut> WorkerFn<F>
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), WorkerError>> + Send + 'static,
{
    /// Creates the worker and returns it boxed for the supervisor.
    pub fn boxed(name: impl Into<Cow<'static, str>>, f: F) -> Box<dyn Worker> {
        Box::new(Self::new(name, f))
    }
}

impl<F, Fut> Worker for WorkerFn<F>
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), WorkerError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn unblocker(&self) -> Option<Unblocker> {
        self.unblock.clone()
    }

    fn run(self: Box<Self>, ctx: CancellationToken) -> BoxWorkerFuture {
        Box::pin((self.f)(ctx))
    }
}
