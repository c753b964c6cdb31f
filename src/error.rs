//! Error types used by the worldvisor runtime and its workers.
//!
//! This module defines the main error enums:
//!
//! - [`RuntimeError`]: fatal errors raised by the supervisor itself (startup, listener bind).
//! - [`WorkerError`]: errors raised by individual worker executions.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging.
//! Collaborator errors live next to their traits ([`StorageError`](crate::storage::StorageError),
//! [`ConfigError`](crate::config::ConfigError)) and are wrapped here when they become fatal.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::{DatabaseRole, StorageError};

/// # Fatal errors produced by the supervisor.
///
/// Every variant aborts the startup sequence before the first worker is launched,
/// except [`RuntimeError::Bind`], which is surfaced as a deferred stop after `Ready`
/// was attempted.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A required database could not be reached.
    #[error("cannot connect to {role} database: {source}")]
    Storage {
        /// Which connection failed.
        role: DatabaseRole,
        /// Underlying collaborator error.
        #[source]
        source: StorageError,
    },

    /// The pid file could not be written.
    #[error("cannot create pid file {path}: {source}")]
    PidFile {
        /// Configured pid file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The world listener could not bind its socket.
    #[error("failed to start network on {addr}: {source}")]
    Bind {
        /// Address the listener tried to bind.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use worldvisor::RuntimeError;
    ///
    /// let err = RuntimeError::Bind {
    ///     addr: "0.0.0.0:8085".into(),
    ///     source: std::io::Error::other("in use"),
    /// };
    /// assert_eq!(err.as_label(), "runtime_bind_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Config(_) => "runtime_config_invalid",
            RuntimeError::Storage { .. } => "runtime_storage_unreachable",
            RuntimeError::PidFile { .. } => "runtime_pid_file",
            RuntimeError::Bind { .. } => "runtime_bind_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::Config(e) => format!("configuration: {e}"),
            RuntimeError::Storage { role, source } => format!("{role} database: {source}"),
            RuntimeError::PidFile { path, source } => {
                format!("pid file {}: {source}", path.display())
            }
            RuntimeError::Bind { addr, source } => format!("bind {addr}: {source}"),
        }
    }
}

/// # Errors produced by worker execution.
///
/// A worker either completes cleanly, observes cancellation, or fails.
/// Failures after `Ready` force the supervisor into `Draining` with an error reason.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Non-recoverable error; the whole service has to stop.
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Worker failed but the service can keep running without it.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Worker exited because its cancellation token fired.
    #[error("context cancelled")]
    Canceled,
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use worldvisor::WorkerError;
    ///
    /// let err = WorkerError::Fail { error: "boom".into() };
    /// assert_eq!(err.as_label(), "worker_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Fatal { .. } => "worker_fatal",
            WorkerError::Fail { .. } => "worker_failed",
            WorkerError::Canceled => "worker_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            WorkerError::Fatal { error } => format!("fatal: {error}"),
            WorkerError::Fail { error } => format!("error: {error}"),
            WorkerError::Canceled => "context cancelled".to_string(),
        }
    }

    /// Indicates whether the failure must stop the service.
    ///
    /// # Example
    /// ```
    /// use worldvisor::WorkerError;
    ///
    /// assert!(WorkerError::Fatal { error: "bind".into() }.is_fatal());
    /// assert!(!WorkerError::Canceled.is_fatal());
    /// ```
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkerError::Fatal { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_names_the_role() {
        let err = RuntimeError::Storage {
            role: DatabaseRole::Login,
            source: StorageError::Unreachable {
                target: "127.0.0.1:3306".into(),
                reason: "refused".into(),
            },
        };
        assert_eq!(err.as_label(), "runtime_storage_unreachable");
        assert!(err.to_string().starts_with("cannot connect to login database"));
    }

    #[test]
    fn worker_error_labels_are_stable() {
        assert_eq!(WorkerError::Canceled.as_label(), "worker_canceled");
        assert_eq!(
            WorkerError::Fatal { error: "x".into() }.as_message(),
            "fatal: x"
        );
    }
}
