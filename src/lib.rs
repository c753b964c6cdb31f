//! # worldvisor
//!
//! **Worldvisor** is the process supervisor of a long-running world server.
//!
//! It sequences startup of the shared resources, launches a fixed set of workers,
//! watches the primary worker for freezes, and tears everything down in a fixed
//! order when a signal, a fatal error or an operator command asks it to stop.
//! What a command *does* is not its business: commands are queued and handed to a
//! [`CommandProcessor`] collaborator on the world tick.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   console ──┐                                 ┌──► WorldUpdate::update(diff)
//!   remote  ──┼──► CommandQueue ──► WorldWorker ┤
//!   admin   ──┘    (MPSC FIFO)      (tick loop) └──► ProgressCounter ◄── FreezeDetector
//!                                                                       (abort on stall)
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (lifecycle orchestrator)                              │
//! │  - Termination (first-write-wins ShutdownReason + cancellation)   │
//! │  - WorkerSet (named handles, bounded joins)                       │
//! │  - Databases / RealmDirectory (world, character, login)           │
//! │  - Listener (world port accept loop while Ready)                  │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!     world             console          freeze-detector       │ remote-admin
//!        │ Publishes        │ Publishes        │ Publishes     │
//!        │ - WorkerStarting │ - WorkerStopped  │ - FreezeDet.  │
//!        ▼                  ▼                  ▼               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       └───┬────────────────┬───┘
//!                           ▼                ▼
//!                    AliveTracker     SubscriberSet ──► LogWriter, custom subscribers
//! ```
//!
//! ### Lifecycle
//! ```text
//! Initializing → StartingResources → StartingWorkers → Ready
//!      → Draining → StoppingWorkers → Finalizing → Exited
//!
//! stop triggers (first wins):
//!   SIGINT / Ctrl-C / console interrupt   → Restart        (exit 2)
//!   SIGTERM / Ctrl-Break / console EOF    → Shutdown       (exit 0)
//!   `server exit` / `server restart`      → Shutdown / Restart
//!   fatal worker error, listener bind     → ErrorShutdown  (exit 1)
//!
//! teardown order:
//!   close queue → freeze detector → remote admin (stop) → realm offline
//!   → remote admin (join) → world → online markers, background writers → console (last)
//! ```
//!
//! ## Features
//! | Area             | Description                                         | Key types / traits                         |
//! |------------------|-----------------------------------------------------|--------------------------------------------|
//! | **Supervision**  | Ordered startup and teardown of the worker set.     | [`Supervisor`], [`SupervisorBuilder`]      |
//! | **Commands**     | Queue, processing seam, console completion.         | [`CommandQueue`], [`CommandProcessor`]     |
//! | **Workers**      | World tick, console, watchdog, remote admin.        | [`Worker`], [`WorldWorker`], [`FreezeDetector`] |
//! | **Storage**      | Connection seam and realm directory state.          | [`Connector`], [`RealmDirectory`]          |
//! | **Events**       | Lifecycle events, subscriber fan-out.               | [`Event`], [`Subscribe`], [`LogWriter`]    |
//! | **Errors**       | Typed errors for startup and workers.               | [`RuntimeError`], [`WorkerError`]          |
//! | **Configuration**| TOML server configuration.                          | [`ServerConfig`]                           |
//!
//! ## Example
//! ```rust,no_run
//! use worldvisor::{CommandOutcome, ServerConfig, SessionId, SupervisorBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cfg = ServerConfig::load("worldserver.toml")?;
//!
//!     let sup = SupervisorBuilder::new(cfg)
//!         .with_processor(|text: &str, _s: Option<&SessionId>| match text {
//!             "ping" => CommandOutcome::ok("pong"),
//!             _ => CommandOutcome::failed("There is no such command."),
//!         })
//!         .build();
//!
//!     let code = sup.run().await?;
//!     std::process::exit(code.code());
//! }
//! ```
mod commands;
mod config;
mod core;
mod error;
mod events;
mod net;
mod pidfile;
mod storage;
mod subscribers;
mod workers;

// ---- Public re-exports ----

pub use commands::{
    complete_command, CommandInfo, CommandLine, CommandOutcome, CommandProcessor, CommandQueue,
    CommandRequest, CompletionSink, OutputSink, ServerCommands, SessionId, UnknownCommand,
    DEFAULT_COMMANDS, SHUTTING_DOWN,
};
pub use config::{
    ConfigError, ConsoleConfig, DatabaseConfig, FreezeDetectorConfig, LogConfig, NetworkConfig,
    RemoteAdminConfig, ServerConfig, ShutdownConfig, WorldConfig, CONFIG_VERSION,
    DEFAULT_CONFIG_PATH,
};
pub use core::{
    AliveTracker, ExitCode, JoinOutcome, Phase, ShutdownReason, SignalHook, Supervisor,
    SupervisorBuilder, Termination, WorkerSet,
};
pub use error::{RuntimeError, WorkerError};
pub use events::{Bus, Event, EventKind};
pub use net::{CloseSessions, Listener, SessionAcceptor};
pub use pidfile::PidFile;
pub use storage::{
    ConnectionInfo, Connector, Database, DatabaseRole, Databases, MemoryConnector, MemoryDatabase,
    RealmDirectory, Row, StorageError, Value, REALM_FLAG_INVALID, REALM_FLAG_OFFLINE,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use workers::{
    abort_process, BoxWorkerFuture, ConsoleOutput, ConsoleSettings, ConsoleWorker, FreezeAction,
    FreezeDetector, FreezeReport, IdleWorld, LineSource, ProgressCounter, ReadOutcome,
    ReadlineSource, RemoteAdmin, ScriptFeed, ScriptedSource, SourceFactory, StdinSource,
    Unblocker, WatchdogState, WatchdogStatus, Worker, WorkerFn, WorldUpdate, WorldWorker,
};
