//! Runtime core: lifecycle, termination and worker supervision.
//!
//! The public entry points are [`SupervisorBuilder`] and [`Supervisor`], which
//! sequence startup, run the `Ready` accept loop, and tear everything down in order.
//!
//! Internal modules:
//! - [`lifecycle`]: phases, shutdown reasons, exit codes;
//! - [`termination`]: first-write-wins termination cell;
//! - [`shutdown`]: cross-platform signal interception;
//! - [`runner`]: runs one worker and publishes its lifecycle events;
//! - [`registry`]: named worker handles with bounded joins;
//! - [`alive`]: sequence-ordered liveness tracking;
//! - [`supervisor`], [`builder`]: orchestration.

mod alive;
mod builder;
mod lifecycle;
mod registry;
mod runner;
mod shutdown;
mod supervisor;
mod termination;

pub use alive::AliveTracker;
pub use builder::SupervisorBuilder;
pub use lifecycle::{ExitCode, Phase, ShutdownReason};
pub use registry::{JoinOutcome, WorkerSet};
pub use shutdown::SignalHook;
pub use supervisor::Supervisor;
pub use termination::Termination;
