//! Command requests, the command queue and the command-name table.
//!
//! ## Contents
//! - [`CommandRequest`], [`CommandOutcome`], [`SessionId`] one unit of work with its sinks
//! - [`CommandQueue`] MPSC FIFO drained once per world tick
//! - [`CommandLine`] first-word split of a command line
//! - [`CommandInfo`], [`DEFAULT_COMMANDS`], [`complete_command`] console tab completion
//! - [`CommandProcessor`], [`ServerCommands`], [`UnknownCommand`] the processing seam

mod line;
mod processor;
mod queue;
mod request;
mod table;

pub use line::CommandLine;
pub use processor::{CommandProcessor, ServerCommands, UnknownCommand};
pub use queue::CommandQueue;
pub use request::{
    CommandOutcome, CommandRequest, CompletionSink, OutputSink, SessionId, SHUTTING_DOWN,
};
pub use table::{complete_command, CommandInfo, DEFAULT_COMMANDS};
