use std::sync::Arc;

use tracing::warn;

use crate::commands::{CommandInfo, CommandProcessor, UnknownCommand, DEFAULT_COMMANDS};
use crate::config::ServerConfig;
use crate::core::supervisor::{Parts, Supervisor};
use crate::core::{AliveTracker, Termination};
use crate::events::Bus;
use crate::net::{CloseSessions, SessionAcceptor};
use crate::storage::{Connector, MemoryConnector};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::workers::{
    ConsoleOutput, FreezeAction, IdleWorld, LineSource, ReadlineSource, SourceFactory,
    StdinSource, WorldUpdate,
};

const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Builder for a [`Supervisor`] and its collaborators.
///
/// Every collaborator has a default: in-memory storage, a processor that knows no
/// commands, an idle world, a terminal console, and a listener that closes every session.
pub struct SupervisorBuilder {
    cfg: ServerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    connector: Option<Arc<dyn Connector>>,
    processor: Option<Arc<dyn CommandProcessor>>,
    world: Option<Box<dyn WorldUpdate>>,
    console_source: Option<SourceFactory>,
    console_output: Option<ConsoleOutput>,
    acceptor: Option<Arc<dyn SessionAcceptor>>,
    commands: &'static [CommandInfo],
    freeze_action: Option<FreezeAction>,
    handle_signals: bool,
    bus_capacity: usize,
}

impl SupervisorBuilder {
    /// Creates a builder for `cfg`.
    pub fn new(cfg: ServerConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            connector: None,
            processor: None,
            world: None,
            console_source: None,
            console_output: None,
            acceptor: None,
            commands: DEFAULT_COMMANDS,
            freeze_action: None,
            handle_signals: true,
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive runtime events through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Storage engine used to open the three connections.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Command processing collaborator; `server exit` / `server restart` are handled before it.
    pub fn with_processor(mut self, processor: impl CommandProcessor) -> Self {
        self.processor = Some(Arc::new(processor));
        self
    }

    /// Per-tick world simulation.
    pub fn with_world(mut self, world: impl WorldUpdate) -> Self {
        self.world = Some(Box::new(world));
        self
    }

    /// Console input; opened on the console thread.
    pub fn with_console_source(mut self, source: SourceFactory) -> Self {
        self.console_source = Some(source);
        self
    }

    /// Console output writer.
    pub fn with_console_output(mut self, output: ConsoleOutput) -> Self {
        self.console_output = Some(output);
        self
    }

    /// Receiver of accepted world connections.
    pub fn with_session_acceptor(mut self, acceptor: Arc<dyn SessionAcceptor>) -> Self {
        self.acceptor = Some(acceptor);
        self
    }

    /// Command table used for console completion.
    pub fn with_command_table(mut self, commands: &'static [CommandInfo]) -> Self {
        self.commands = commands;
        self
    }

    /// Replaces the freeze detector's process abort.
    pub fn with_freeze_action(mut self, action: FreezeAction) -> Self {
        self.freeze_action = Some(action);
        self
    }

    /// Whether to intercept termination signals (default `true`).
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Event bus capacity (minimum 1).
    pub fn with_bus_capacity(mut self, capacity: usize) -> Self {
        self.bus_capacity = capacity;
        self
    }

    /// Builds the supervisor. Must be called inside a Tokio runtime.
    pub fn build(self) -> Supervisor {
        let bus = Bus::new(self.bus_capacity.max(1));
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let termination = Termination::with_bus(bus.clone());

        let console_source = match self.console_source {
            Some(source) => source,
            None => terminal_source(self.commands, &self.cfg),
        };

        Supervisor::from_parts(Parts {
            cfg: self.cfg,
            bus,
            subs,
            alive: Arc::new(AliveTracker::new()),
            termination,
            connector: self
                .connector
                .unwrap_or_else(|| Arc::new(MemoryConnector::new())),
            processor: self.processor.unwrap_or_else(|| Arc::new(UnknownCommand)),
            world: self.world.unwrap_or_else(|| Box::new(IdleWorld)),
            console_source,
            console_output: self.console_output,
            acceptor: self.acceptor.unwrap_or_else(|| Arc::new(CloseSessions)),
            freeze_action: self.freeze_action,
            handle_signals: self.handle_signals,
        })
    }
}

/// Line editor on the terminal, plain stdin when no editor can be opened.
fn terminal_source(commands: &'static [CommandInfo], cfg: &ServerConfig) -> SourceFactory {
    let history = cfg.console.history_file.clone();
    let history = (!history.as_os_str().is_empty()).then_some(history);
    Box::new(move || {
        let source: Box<dyn LineSource> = match ReadlineSource::open(commands, history) {
            Ok(editor) => Box::new(editor),
            Err(e) => {
                warn!(error = %e, "line editor unavailable, reading plain stdin");
                Box::new(StdinSource)
            }
        };
        Ok(source)
    })
}
