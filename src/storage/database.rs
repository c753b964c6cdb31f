//! # Persistent-storage seam.
//!
//! The supervisor needs three independent connections (world, character, login),
//! opened once during `StartingResources` and closed only after every worker joined.
//! The engine behind them is a collaborator: anything implementing [`Connector`] and
//! [`Database`] plugs in.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::storage::ConnectionInfo;

/// Which of the three shared connections a handle is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseRole {
    /// World/entity data.
    World,
    /// Character/session data.
    Character,
    /// Account, realm directory and routing data.
    Login,
}

impl fmt::Display for DatabaseRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DatabaseRole::World => "world",
            DatabaseRole::Character => "character",
            DatabaseRole::Login => "login",
        })
    }
}

/// A statement parameter or result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Integer column.
    Int(i64),
    /// Text column.
    Text(String),
    /// SQL NULL.
    Null,
}

impl Value {
    /// Text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// One result row.
pub type Row = Vec<Value>;

/// Errors reported by a storage collaborator.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StorageError {
    /// No connection string configured for a required database.
    #[error("{role} database not specified in configuration")]
    MissingConnectionInfo {
        /// Database lacking a connection string.
        role: DatabaseRole,
    },

    /// Connection string does not have the `host;port;user;password;database` shape.
    #[error("invalid connection string: {reason}")]
    InvalidConnectionInfo {
        /// What is wrong with it.
        reason: String,
    },

    /// Server refused or could not be reached.
    #[error("cannot reach {target}: {reason}")]
    Unreachable {
        /// `host:port/database`.
        target: String,
        /// Collaborator message.
        reason: String,
    },

    /// A statement failed.
    #[error("statement failed: {reason}")]
    Statement {
        /// Collaborator message.
        reason: String,
    },
}

/// An open, shareable connection.
///
/// Calls are synchronous; implementations queue writes for a background writer
/// that [`halt_background_writer`](Database::halt_background_writer) flushes and stops.
pub trait Database: Send + Sync + 'static {
    /// Which connection this is.
    fn role(&self) -> DatabaseRole;

    /// Runs a statement, returns affected rows.
    fn execute(&self, statement: &str, params: &[Value]) -> Result<u64, StorageError>;

    /// Runs a query, returns its rows.
    fn query(&self, statement: &str, params: &[Value]) -> Result<Vec<Row>, StorageError>;

    /// Flushes and stops deferred writes. Called once during `Finalizing`.
    fn halt_background_writer(&self);
}

/// Opens connections.
pub trait Connector: Send + Sync + 'static {
    /// Connects `role` using `info`.
    fn connect(
        &self,
        role: DatabaseRole,
        info: &ConnectionInfo,
    ) -> Result<Arc<dyn Database>, StorageError>;
}
