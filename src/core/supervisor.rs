//! # Supervisor: ordered startup, the `Ready` accept loop, and ordered teardown.
//!
//! The [`Supervisor`] owns the event bus, the termination cell, the command queue and
//! the worker set. [`Supervisor::run`] walks the phases once and returns the
//! [`ExitCode`] the host uses for its restart loop.
//!
//! ## Phases
//! ```text
//! Initializing       validate config, pid file
//! StartingResources  connect world/character/login (any failure is fatal), clear stale markers
//! StartingWorkers    install signal hook, realm offline+invalid, versions,
//!                    spawn world (raised priority)
//!                    spawn console?, remote admin?, freeze detector?
//!                    bind world listener (failure → ErrorShutdown, skip Ready)
//! Ready              realm online; accept loop until the termination token fires
//! Draining           close queue, stop+join freeze detector, stop remote admin, realm offline
//! StoppingWorkers    join remote admin, stop+join world
//! Finalizing         clear online markers, halt background writers,
//!                    unblock+join console (last), unhook signals, report stragglers, pid file
//! Exited             ExitCode::from(reason)
//! ```
//!
//! ## Rules
//! - Startup failures return `Err` before any worker exists; nothing is partially started.
//! - The first termination request wins; every later trigger is ignored.
//! - Every join is bounded (`shutdown.grace_secs`, console `console.join_timeout_ms`);
//!   an exceeded bound is logged and teardown continues.
//! - The freeze detector's trigger does not pass through here at all.
//!
//! ## Example
//! ```no_run
//! use worldvisor::{ServerConfig, SupervisorBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cfg = ServerConfig::load("worldserver.toml")?;
//!     let sup = SupervisorBuilder::new(cfg).build();
//!     let code = sup.run().await?;
//!     std::process::exit(code.code());
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast::error::RecvError, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::commands::{CommandProcessor, CommandQueue, ServerCommands};
use crate::config::ServerConfig;
use crate::core::registry::{JoinOutcome, WorkerSet};
use crate::core::shutdown::SignalHook;
use crate::core::{AliveTracker, ExitCode, Phase, ShutdownReason, Termination};
use crate::error::RuntimeError;
use crate::events::{Bus, Event};
use crate::net::{Listener, SessionAcceptor};
use crate::pidfile::PidFile;
use crate::storage::{Connector, Databases, RealmDirectory};
use crate::subscribers::SubscriberSet;
use crate::workers::{
    ConsoleOutput, ConsoleSettings, ConsoleWorker, FreezeAction, FreezeDetector, IdleWorld,
    ProgressCounter, RemoteAdmin, SourceFactory, WorldUpdate, WorldWorker, CONSOLE,
    FREEZE_DETECTOR, REMOTE_ADMIN, WORLD,
};

const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");
const CORE_REVISION: &str = match option_env!("WORLDVISOR_REVISION") {
    Some(rev) => rev,
    None => "unknown",
};

/// Collaborators and settings handed over by the builder.
pub(crate) struct Parts {
    pub cfg: ServerConfig,
    pub bus: Bus,
    pub subs: Arc<SubscriberSet>,
    pub alive: Arc<AliveTracker>,
    pub termination: Termination,
    pub connector: Arc<dyn Connector>,
    pub processor: Arc<dyn CommandProcessor>,
    pub world: Box<dyn WorldUpdate>,
    pub console_source: SourceFactory,
    pub console_output: Option<ConsoleOutput>,
    pub acceptor: Arc<dyn SessionAcceptor>,
    pub freeze_action: Option<FreezeAction>,
    pub handle_signals: bool,
}

/// Runs one server lifetime. Build it with [`SupervisorBuilder`](crate::SupervisorBuilder).
pub struct Supervisor {
    cfg: ServerConfig,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    alive: Arc<AliveTracker>,
    termination: Termination,
    queue: CommandQueue,
    counter: ProgressCounter,
    phase: watch::Sender<Phase>,
    connector: Arc<dyn Connector>,
    processor: Arc<dyn CommandProcessor>,
    world: Mutex<Option<Box<dyn WorldUpdate>>>,
    console_source: Mutex<Option<SourceFactory>>,
    console_output: Option<ConsoleOutput>,
    acceptor: Arc<dyn SessionAcceptor>,
    freeze_action: Option<FreezeAction>,
    handle_signals: bool,
}

/// Resources that exist once `StartingResources` succeeded.
struct Running {
    realm: RealmDirectory,
    dbs: Databases,
    pid: Option<PidFile>,
    hook: Option<SignalHook>,
    workers: WorkerSet,
}

impl Supervisor {
    pub(crate) fn from_parts(p: Parts) -> Self {
        let processor: Arc<dyn CommandProcessor> =
            Arc::new(ServerCommands::shared(p.processor, p.termination.clone()));
        let (phase, _) = watch::channel(Phase::Initializing);
        Self {
            cfg: p.cfg,
            bus: p.bus,
            subs: p.subs,
            alive: p.alive,
            termination: p.termination,
            queue: CommandQueue::new(),
            counter: ProgressCounter::new(),
            phase,
            connector: p.connector,
            processor,
            world: Mutex::new(Some(p.world)),
            console_source: Mutex::new(Some(p.console_source)),
            console_output: p.console_output,
            acceptor: p.acceptor,
            freeze_action: p.freeze_action,
            handle_signals: p.handle_signals,
        }
    }

    /// Event bus shared with every worker.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Termination cell; `request` on it stops the server.
    pub fn termination(&self) -> Termination {
        self.termination.clone()
    }

    /// The command queue drained by the world loop.
    pub fn queue(&self) -> CommandQueue {
        self.queue.clone()
    }

    /// Progress counter written by the world loop.
    pub fn counter(&self) -> ProgressCounter {
        self.counter.clone()
    }

    /// Current phase; changes with every transition.
    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Runs every phase once and returns the exit code.
    ///
    /// `Err` means startup failed before any worker was launched.
    pub async fn run(mut self) -> Result<ExitCode, RuntimeError> {
        let listener = self.subscriber_listener();
        self.enter(Phase::Initializing);

        let running = match self.start().await {
            Ok(running) => running,
            Err(e) => {
                error!(label = e.as_label(), error = %e, "startup failed");
                self.enter(Phase::Exited);
                self.flush_subscribers(listener).await;
                return Err(e);
            }
        };

        let reason = self.termination.reason().unwrap_or(ShutdownReason::ErrorShutdown);
        info!(%reason, "server is going down");
        let code = self.teardown(running, reason).await;
        self.flush_subscribers(listener).await;
        Ok(code)
    }

    async fn start(&mut self) -> Result<Running, RuntimeError> {
        info!(version = CORE_VERSION, revision = CORE_REVISION, "worldvisor starting");
        if self.cfg.is_outdated() {
            warn!(
                found = self.cfg.conf_version,
                expected = crate::config::CONFIG_VERSION,
                "configuration file out of date, missing settings use defaults"
            );
        }
        self.cfg.validate()?;
        info!(realm = self.cfg.realm_id, "realm configured");

        let pid = if self.cfg.pid_file.as_os_str().is_empty() {
            None
        } else {
            Some(PidFile::create(&self.cfg.pid_file)?)
        };

        self.enter(Phase::StartingResources);
        let dbs = match Databases::connect(self.connector.as_ref(), &self.cfg.database) {
            Ok(dbs) => dbs,
            Err(e) => {
                if let Some(pid) = pid {
                    pid.remove();
                }
                return Err(e);
            }
        };
        let realm = RealmDirectory::new(dbs.clone(), self.cfg.realm_id);
        realm.best_effort("clear online markers", RealmDirectory::clear_online_markers);

        self.enter(Phase::StartingWorkers);
        let hook = self
            .handle_signals
            .then(|| SignalHook::install(self.termination.clone()));
        realm.best_effort("mark realm offline", RealmDirectory::mark_offline_invalid);
        realm.best_effort("record core version", |r| {
            r.record_core_version(CORE_VERSION, CORE_REVISION)
        });
        match realm.load_db_version() {
            Ok(version) => info!(%version, "Using World Database"),
            Err(e) => warn!(error = %e, "cannot read world database version"),
        }

        let mut workers = WorkerSet::new(self.bus.clone(), self.termination.clone());
        self.spawn_workers(&mut workers);

        let running = Running {
            realm,
            dbs,
            pid,
            hook,
            workers,
        };

        match Listener::bind(self.cfg.network.addr(), &self.bus).await {
            Ok(listener) => {
                running
                    .realm
                    .best_effort("mark realm online", RealmDirectory::mark_online);
                self.enter(Phase::Ready);
                info!(addr = %listener.local_addr(), "world server ready");
                listener
                    .serve(self.acceptor.clone(), self.termination.token())
                    .await;
            }
            Err(e) => {
                error!(label = e.as_label(), error = %e, "world listener failed");
                self.termination.request(ShutdownReason::ErrorShutdown);
            }
        }
        Ok(running)
    }

    fn spawn_workers(&mut self, workers: &mut WorkerSet) {
        let world = self
            .world
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| Box::new(IdleWorld) as Box<dyn WorldUpdate>);
        workers.spawn(Box::new(WorldWorker::new(
            self.queue.clone(),
            self.processor.clone(),
            world,
            self.counter.clone(),
            self.cfg.world.tick_interval(),
        )));

        if self.cfg.console.enable {
            let settings = ConsoleSettings::from_config(&self.cfg.console);
            let output = self
                .console_output
                .take()
                .unwrap_or_else(|| ConsoleOutput::stdout(settings.encoding));
            let source = self
                .console_source
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            match source {
                Some(source) => {
                    workers.spawn(Box::new(ConsoleWorker::new(
                        settings,
                        self.queue.clone(),
                        self.termination.clone(),
                        output,
                        source,
                    )));
                }
                None => warn!("console source already taken, console not started"),
            }
        }

        if self.cfg.remote_admin.enable {
            workers.spawn(Box::new(RemoteAdmin::new(
                self.cfg.remote_admin.addr(),
                self.cfg.remote_admin.secret.clone(),
                self.queue.clone(),
                self.bus.clone(),
            )));
        }

        if self.cfg.freeze_detector.enabled() {
            let mut detector = FreezeDetector::new(
                self.counter.clone(),
                self.cfg.freeze_detector.threshold(),
                self.cfg.freeze_detector.poll_interval(),
                self.bus.clone(),
            );
            if let Some(action) = self.freeze_action.take() {
                detector = detector.with_action(action);
            }
            workers.spawn(Box::new(detector));
        }
    }

    async fn teardown(&self, mut r: Running, reason: ShutdownReason) -> ExitCode {
        let grace = self.cfg.shutdown.grace();

        self.enter(Phase::Draining);
        let rejected = self.queue.close();
        if rejected > 0 {
            info!(rejected, "pending commands rejected");
        }
        r.workers.stop_and_join(FREEZE_DETECTOR, grace).await;
        r.workers.stop(REMOTE_ADMIN);
        r.realm
            .best_effort("mark realm offline", RealmDirectory::mark_offline);

        self.enter(Phase::StoppingWorkers);
        r.workers.join(REMOTE_ADMIN, grace).await;
        r.workers.stop_and_join(WORLD, grace).await;

        self.enter(Phase::Finalizing);
        r.realm
            .best_effort("clear online markers", RealmDirectory::clear_online_markers);
        r.dbs.halt_background_writers();

        r.workers.stop(CONSOLE);
        r.workers.force_unblock(CONSOLE);
        if let Some(JoinOutcome::TimedOut) =
            r.workers.join(CONSOLE, self.cfg.console.join_timeout()).await
        {
            warn!("console is blocked on input, thread abandoned");
        }

        if let Some(hook) = r.hook.take() {
            hook.unhook().await;
        }
        if let Some(pid) = r.pid.take() {
            pid.remove();
        }

        let seq = self.enter(Phase::Exited);
        self.report_stragglers(seq).await;
        let code = ExitCode::from(reason);
        info!(%reason, code = code.code(), "server stopped");
        code
    }

    async fn report_stragglers(&self, seq: u64) {
        if !self.alive.caught_up(seq, Duration::from_millis(200)).await {
            warn!("event listener lagging, straggler report may be stale");
        }
        let alive = self.alive.snapshot().await;
        if !alive.is_empty() {
            warn!(workers = ?alive, "workers still running at exit");
        }
    }

    /// Waits for the listener to forward `Exited`, then drains every subscriber queue.
    async fn flush_subscribers(self, listener: JoinHandle<()>) {
        let grace = self.cfg.shutdown.grace();
        if timeout(Duration::from_millis(500), listener).await.is_err() {
            warn!("event listener did not reach exit, subscribers not flushed");
            return;
        }
        if let Some(subs) = Arc::into_inner(self.subs) {
            if timeout(grace, subs.shutdown()).await.is_err() {
                warn!("subscribers still busy at exit");
            }
        }
    }

    fn enter(&self, phase: Phase) -> u64 {
        self.phase.send_replace(phase);
        info!(%phase, "phase");
        let ev = Event::phase(phase);
        let seq = ev.seq;
        self.bus.publish(ev);
        seq
    }

    /// Forwards bus events to the alive tracker and the subscriber set.
    ///
    /// Stops after forwarding the `Exited` phase event.
    fn subscriber_listener(&self) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let alive = self.alive.clone();
        let subs = self.subs.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => {
                        alive.observe(&ev).await;
                        subs.emit(&ev);
                        if ev.phase == Some(Phase::Exited) {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
