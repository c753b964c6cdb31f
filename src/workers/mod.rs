//! Workers supervised by the runtime.
//!
//! ## Contents
//! - [`Worker`], [`WorkerFn`] the run-once, cancelable unit
//! - [`WorldWorker`], [`ProgressCounter`], [`WorldUpdate`] the primary tick loop
//! - [`ConsoleWorker`] and its [`LineSource`]s
//! - [`FreezeDetector`] the watchdog
//! - [`RemoteAdmin`] the administrative TCP console
//!
//! Blocking bodies (world, console) run on their own threads via [`on_thread`].

mod console;
mod freeze;
mod remote;
mod source;
mod thread;
mod worker;
mod world;

pub use console::{ConsoleOutput, ConsoleSettings, ConsoleWorker};
pub use freeze::{
    abort_process, FreezeAction, FreezeDetector, FreezeReport, WatchdogState, WatchdogStatus,
};
pub use remote::RemoteAdmin;
pub use source::{
    LineSource, ReadOutcome, ReadlineSource, ScriptFeed, ScriptedSource, SourceFactory,
    StdinSource,
};
pub use thread::on_thread;
pub use worker::{BoxWorkerFuture, Unblocker, Worker, WorkerFn};
pub use world::{IdleWorld, ProgressCounter, WorldUpdate, WorldWorker};

/// Primary worker name.
pub const WORLD: &str = "world";
/// Console loop name.
pub const CONSOLE: &str = "console";
/// Watchdog name.
pub const FREEZE_DETECTOR: &str = "freeze-detector";
/// Remote administration listener name.
pub const REMOTE_ADMIN: &str = "remote-admin";
