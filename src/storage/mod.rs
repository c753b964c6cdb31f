//! Persistent-storage collaborator seam, realm directory writes and an in-memory backend.
//!
//! ## Contents
//! - [`Connector`], [`Database`], [`DatabaseRole`], [`Value`], [`StorageError`] the seam
//! - [`ConnectionInfo`] `host;port;user;password;database` strings
//! - [`Databases`], [`RealmDirectory`] shared handles and directory state
//! - [`MemoryConnector`], [`MemoryDatabase`] recording backend

mod connection;
mod database;
mod memory;
mod realm;

pub use connection::ConnectionInfo;
pub use database::{Connector, Database, DatabaseRole, Row, StorageError, Value};
pub use memory::{MemoryConnector, MemoryDatabase};
pub use realm::{Databases, RealmDirectory, REALM_FLAG_INVALID, REALM_FLAG_OFFLINE};
