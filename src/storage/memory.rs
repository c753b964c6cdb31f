//! In-memory storage backend: records statements, answers scripted queries.
//!
//! Used by the development binary and by tests. Nothing is persisted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::storage::{ConnectionInfo, Connector, Database, DatabaseRole, Row, StorageError, Value};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Statement log and scripted query answers for one connection.
pub struct MemoryDatabase {
    role: DatabaseRole,
    statements: Mutex<Vec<(String, Vec<Value>)>>,
    responses: Vec<(String, Vec<Row>)>,
    halted: AtomicBool,
}

impl MemoryDatabase {
    fn new(role: DatabaseRole, responses: Vec<(String, Vec<Row>)>) -> Self {
        Self {
            role,
            statements: Mutex::new(Vec::new()),
            responses,
            halted: AtomicBool::new(false),
        }
    }

    /// Every executed statement with its parameters, in order.
    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        lock(&self.statements).clone()
    }

    /// True once the background writer was halted.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}

impl Database for MemoryDatabase {
    fn role(&self) -> DatabaseRole {
        self.role
    }

    fn execute(&self, statement: &str, params: &[Value]) -> Result<u64, StorageError> {
        if self.is_halted() {
            return Err(StorageError::Statement {
                reason: "background writer halted".into(),
            });
        }
        lock(&self.statements).push((statement.to_string(), params.to_vec()));
        Ok(1)
    }

    fn query(&self, statement: &str, _params: &[Value]) -> Result<Vec<Row>, StorageError> {
        Ok(self
            .responses
            .iter()
            .find(|(prefix, _)| statement.starts_with(prefix.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    fn halt_background_writer(&self) {
        self.halted.store(true, Ordering::Release);
    }
}

/// Connector handing out [`MemoryDatabase`]s; can be told to fail a role.
#[derive(Default)]
pub struct MemoryConnector {
    unreachable: Vec<DatabaseRole>,
    responses: HashMap<DatabaseRole, Vec<(String, Vec<Row>)>>,
    opened: Mutex<HashMap<DatabaseRole, Arc<MemoryDatabase>>>,
}

impl MemoryConnector {
    /// Connector that accepts every role.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes connecting `role` fail as unreachable.
    pub fn unreachable(mut self, role: DatabaseRole) -> Self {
        self.unreachable.push(role);
        self
    }

    /// Answers queries on `role` starting with `prefix` with `rows`.
    pub fn respond(mut self, role: DatabaseRole, prefix: &str, rows: Vec<Row>) -> Self {
        self.responses
            .entry(role)
            .or_default()
            .push((prefix.to_string(), rows));
        self
    }

    /// The connection opened for `role`, if any.
    pub fn database(&self, role: DatabaseRole) -> Option<Arc<MemoryDatabase>> {
        lock(&self.opened).get(&role).cloned()
    }
}

impl Connector for MemoryConnector {
    fn connect(
        &self,
        role: DatabaseRole,
        info: &ConnectionInfo,
    ) -> Result<Arc<dyn Database>, StorageError> {
        if self.unreachable.contains(&role) {
            return Err(StorageError::Unreachable {
                target: info.target(),
                reason: "connection refused".into(),
            });
        }
        let responses = self.responses.get(&role).cloned().unwrap_or_default();
        let db = Arc::new(MemoryDatabase::new(role, responses));
        lock(&self.opened).insert(role, db.clone());
        Ok(db)
    }
}
