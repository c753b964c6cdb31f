//! # Command processing seam.
//!
//! The primary worker hands every drained request to a [`CommandProcessor`]. What a
//! command does is up to the collaborator; this crate only ships
//! [`ServerCommands`], which intercepts the operator stop commands, and
//! [`UnknownCommand`], the fallback that rejects everything.

use std::sync::Arc;

use tracing::info;

use crate::commands::{CommandLine, CommandOutcome, SessionId};
use crate::core::{ShutdownReason, Termination};

/// Executes one command on the primary worker.
///
/// Execution time must stay well below the freeze detector threshold.
pub trait CommandProcessor: Send + Sync + 'static {
    /// Runs `text` on behalf of `session` (`None` for the console).
    fn process(&self, text: &str, session: Option<&SessionId>) -> CommandOutcome;
}

impl<F> CommandProcessor for F
where
    F: Fn(&str, Option<&SessionId>) -> CommandOutcome + Send + Sync + 'static,
{
    fn process(&self, text: &str, session: Option<&SessionId>) -> CommandOutcome {
        self(text, session)
    }
}

/// Rejects every command.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnknownCommand;

impl CommandProcessor for UnknownCommand {
    fn process(&self, _text: &str, _session: Option<&SessionId>) -> CommandOutcome {
        CommandOutcome::failed("There is no such command.")
    }
}

/// Handles `server exit` / `server restart`, delegates the rest.
pub struct ServerCommands {
    inner: Arc<dyn CommandProcessor>,
    termination: Termination,
}

impl ServerCommands {
    /// Wraps `inner`; stop commands are recorded in `termination`.
    pub fn new(inner: impl CommandProcessor, termination: Termination) -> Self {
        Self::shared(Arc::new(inner), termination)
    }

    /// Wraps an already shared processor.
    pub fn shared(inner: Arc<dyn CommandProcessor>, termination: Termination) -> Self {
        Self { inner, termination }
    }

    fn stop(&self, reason: ShutdownReason, session: Option<&SessionId>) -> CommandOutcome {
        let issuer = session.map_or_else(|| "console".to_string(), ToString::to_string);
        info!(%reason, %issuer, "operator stop command");
        if self.termination.request(reason) {
            CommandOutcome::ok(format!("Server is going down ({reason})."))
        } else {
            CommandOutcome::ok("Server is already going down.")
        }
    }
}

impl CommandProcessor for ServerCommands {
    fn process(&self, text: &str, session: Option<&SessionId>) -> CommandOutcome {
        if let Some(line) = CommandLine::parse(text) {
            if line.name == "server" {
                match line.subcommand().map(|sub| sub.name) {
                    Some("exit") => return self.stop(ShutdownReason::Shutdown, session),
                    Some("restart") => return self.stop(ShutdownReason::Restart, session),
                    _ => {}
                }
            }
        }
        self.inner.process(text, session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_exit_requests_shutdown() {
        let t = Termination::new();
        let p = ServerCommands::new(UnknownCommand, t.clone());

        let out = p.process("server exit", None);
        assert!(out.success);
        assert_eq!(t.reason(), Some(ShutdownReason::Shutdown));

        let again = p.process(".server restart", None);
        assert_eq!(again.output, "Server is already going down.");
        assert_eq!(t.reason(), Some(ShutdownReason::Shutdown));
    }

    #[test]
    fn other_commands_reach_the_collaborator() {
        let t = Termination::new();
        let p = ServerCommands::new(
            |text: &str, _s: Option<&SessionId>| CommandOutcome::ok(format!("ran {text}")),
            t.clone(),
        );
        assert_eq!(p.process("server info", None).output, "ran server info");
        assert_eq!(p.process("ping", None).output, "ran ping");
        assert!(!t.is_stopped());
    }

    #[test]
    fn unknown_command_fails() {
        assert!(!UnknownCommand.process("ping", None).success);
    }
}
