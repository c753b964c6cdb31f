//! # Command requests and their result sinks.
//!
//! A [`CommandRequest`] is created by a producer (console loop, remote admin session),
//! handed to the [`CommandQueue`](super::CommandQueue) and consumed exactly once by
//! the primary worker. Each sink is an `FnOnce`, so it can fire at most once.
//!
//! ```text
//! producer ──► CommandRequest { text, session, output, completion }
//!                     │
//!              complete(outcome)
//!                     ├─► output(text)        (only if there is output)
//!                     └─► completion(success)
//! ```

use std::fmt;
use std::net::SocketAddr;

/// Receives the text a command produced.
pub type OutputSink = Box<dyn FnOnce(&str) + Send + 'static>;

/// Receives the success flag once the command finished.
pub type CompletionSink = Box<dyn FnOnce(bool) + Send + 'static>;

/// Output delivered to commands rejected because the process is stopping.
pub const SHUTTING_DOWN: &str = "Command rejected: server is shutting down.";

/// Identity of the session that issued a command. Console commands carry none.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionId {
    /// Remote administration connection.
    Remote(SocketAddr),
    /// In-game player session, by account id.
    Account(u32),
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionId::Remote(peer) => write!(f, "remote:{peer}"),
            SessionId::Account(id) => write!(f, "account:{id}"),
        }
    }
}

/// Result of processing one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Whether the command succeeded.
    pub success: bool,
    /// Text to send to the issuer (may be empty).
    pub output: String,
}

impl CommandOutcome {
    /// Successful outcome with output.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    /// Failed outcome with output.
    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// One queued command with its result sinks.
pub struct CommandRequest {
    text: String,
    session: Option<SessionId>,
    output: OutputSink,
    completion: CompletionSink,
}

impl CommandRequest {
    /// Creates a request from its parts.
    pub fn new(
        text: impl Into<String>,
        session: Option<SessionId>,
        output: OutputSink,
        completion: CompletionSink,
    ) -> Self {
        Self {
            text: text.into(),
            session,
            output,
            completion,
        }
    }

    /// Creates a console request (no issuing session).
    pub fn console(
        text: impl Into<String>,
        output: OutputSink,
        completion: CompletionSink,
    ) -> Self {
        Self::new(text, None, output, completion)
    }

    /// Command text, already in canonical (UTF-8) encoding.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Issuing session, `None` for the console.
    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    /// Delivers the outcome: output first (if any), then the completion flag.
    pub fn complete(self, outcome: CommandOutcome) {
        if !outcome.output.is_empty() {
            (self.output)(&outcome.output);
        }
        (self.completion)(outcome.success);
    }

    /// Completes the request as failed because the process is stopping.
    pub fn reject_shutting_down(self) {
        self.complete(CommandOutcome::failed(SHUTTING_DOWN));
    }
}

impl fmt::Debug for CommandRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRequest")
            .field("text", &self.text)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn output_precedes_completion() {
        let log = Arc::new(Mutex::new(Vec::<String>::new()));
        let (out, done) = (log.clone(), log.clone());
        let req = CommandRequest::console(
            "ping",
            Box::new(move |s: &str| out.lock().unwrap().push(format!("out:{s}"))),
            Box::new(move |ok: bool| done.lock().unwrap().push(format!("done:{ok}"))),
        );

        req.complete(CommandOutcome::ok("pong"));
        assert_eq!(*log.lock().unwrap(), vec!["out:pong", "done:true"]);
    }

    #[test]
    fn empty_output_skips_the_output_sink() {
        let log = Arc::new(Mutex::new(Vec::<String>::new()));
        let (out, done) = (log.clone(), log.clone());
        let req = CommandRequest::console(
            "quiet",
            Box::new(move |s: &str| out.lock().unwrap().push(s.to_string())),
            Box::new(move |ok: bool| done.lock().unwrap().push(ok.to_string())),
        );

        req.complete(CommandOutcome::failed(""));
        assert_eq!(*log.lock().unwrap(), vec!["false"]);
    }

    #[test]
    fn session_ids_render() {
        let peer: SocketAddr = "127.0.0.1:3443".parse().unwrap();
        assert_eq!(SessionId::Remote(peer).to_string(), "remote:127.0.0.1:3443");
        assert_eq!(SessionId::Account(7).to_string(), "account:7");
    }
}
