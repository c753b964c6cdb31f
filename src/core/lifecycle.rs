//! # Lifecycle vocabulary shared by the supervisor and its workers.
//!
//! - [`Phase`] the supervisor state machine
//! - [`ShutdownReason`] why the process is terminating
//! - [`ExitCode`] the integer handed back to the hosting environment
//!
//! ```text
//! Initializing → StartingResources → StartingWorkers → Ready
//!      → Draining → StoppingWorkers → Finalizing → Exited
//! ```

use std::fmt;

/// Supervisor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Parsing configuration, writing the pid file.
    Initializing,
    /// Opening every required database connection.
    StartingResources,
    /// Marking the realm offline, loading versioned state, launching workers.
    StartingWorkers,
    /// Listener accepting; steady state.
    Ready,
    /// First stop trigger observed; watchdog and auxiliary listener stopping.
    Draining,
    /// Joining the auxiliary listener and the primary worker.
    StoppingWorkers,
    /// Clearing directory markers, halting background writers, joining the console.
    Finalizing,
    /// Exit code computed.
    Exited,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Initializing => "initializing",
            Phase::StartingResources => "starting-resources",
            Phase::StartingWorkers => "starting-workers",
            Phase::Ready => "ready",
            Phase::Draining => "draining",
            Phase::StoppingWorkers => "stopping-workers",
            Phase::Finalizing => "finalizing",
            Phase::Exited => "exited",
        };
        f.write_str(s)
    }
}

/// Why the process is terminating. Set exactly once per process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownReason {
    /// Stop now, expect the host to start us again (interactive interrupt, `server restart`).
    Restart,
    /// Regular stop (terminate signal, `server exit`, end of console input).
    Shutdown,
    /// Stop caused by a failure (listener bind, fatal worker error).
    ErrorShutdown,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShutdownReason::Restart => "restart",
            ShutdownReason::Shutdown => "shutdown",
            ShutdownReason::ErrorShutdown => "error-shutdown",
        };
        f.write_str(s)
    }
}

/// Process exit code consumed by restart loops around the server.
///
/// The numeric values are stable: `0` normal shutdown, `1` error, `2` restart requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ExitCode {
    /// Normal shutdown.
    Shutdown = 0,
    /// Shutdown at error (including fatal startup errors).
    Error = 1,
    /// Restart requested; a restarter script should start the server again.
    Restart = 2,
}

impl ExitCode {
    /// Integer value for `std::process::exit`.
    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<ShutdownReason> for ExitCode {
    fn from(reason: ShutdownReason) -> Self {
        match reason {
            ShutdownReason::Restart => ExitCode::Restart,
            ShutdownReason::Shutdown => ExitCode::Shutdown,
            ShutdownReason::ErrorShutdown => ExitCode::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(ExitCode::from(ShutdownReason::Shutdown).code(), 0);
        assert_eq!(ExitCode::from(ShutdownReason::ErrorShutdown).code(), 1);
        assert_eq!(ExitCode::from(ShutdownReason::Restart).code(), 2);
    }

    #[test]
    fn phases_are_ordered() {
        assert!(Phase::Initializing < Phase::Ready);
        assert!(Phase::Ready < Phase::Draining);
        assert!(Phase::Finalizing < Phase::Exited);
        assert_eq!(Phase::StoppingWorkers.to_string(), "stopping-workers");
    }
}
