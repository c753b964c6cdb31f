//! # Shared connections and realm directory state.
//!
//! [`Databases`] bundles the three shared handles; [`RealmDirectory`] performs the
//! directory/routing writes the supervisor makes around its lifecycle.
//!
//! ```text
//! StartingResources   clear_online_markers()
//! StartingWorkers     mark_offline_invalid(), record_core_version(), load_db_version()
//! Ready               mark_online()
//! Draining            mark_offline()
//! Finalizing          clear_online_markers(), Databases::halt_background_writers()
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::error::RuntimeError;
use crate::storage::{ConnectionInfo, Connector, Database, DatabaseRole, StorageError, Value};

/// Realm is listed but clients cannot connect.
pub const REALM_FLAG_INVALID: u32 = 0x01;
/// Realm is shown offline.
pub const REALM_FLAG_OFFLINE: u32 = 0x02;

/// The three shared connections.
#[derive(Clone)]
pub struct Databases {
    /// World/entity data.
    pub world: Arc<dyn Database>,
    /// Character/session data.
    pub character: Arc<dyn Database>,
    /// Account and realm directory data.
    pub login: Arc<dyn Database>,
}

impl Databases {
    /// Opens world, character and login in that order; the first failure aborts.
    pub fn connect(connector: &dyn Connector, cfg: &DatabaseConfig) -> Result<Self, RuntimeError> {
        let world = open(connector, DatabaseRole::World, &cfg.world)?;
        let character = open(connector, DatabaseRole::Character, &cfg.character)?;
        let login = open(connector, DatabaseRole::Login, &cfg.login)?;
        Ok(Self {
            world,
            character,
            login,
        })
    }

    /// Stops every deferred writer (character, world, login).
    pub fn halt_background_writers(&self) {
        self.character.halt_background_writer();
        self.world.halt_background_writer();
        self.login.halt_background_writer();
    }
}

impl fmt::Debug for Databases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Databases").finish_non_exhaustive()
    }
}

fn open(
    connector: &dyn Connector,
    role: DatabaseRole,
    conn: &str,
) -> Result<Arc<dyn Database>, RuntimeError> {
    let fail = |source| RuntimeError::Storage { role, source };
    if conn.trim().is_empty() {
        return Err(fail(StorageError::MissingConnectionInfo { role }));
    }
    let info = ConnectionInfo::parse(conn).map_err(fail)?;
    let db = connector.connect(role, &info).map_err(fail)?;
    info!(%role, target = %info.target(), "database connected");
    Ok(db)
}

/// Directory writes for one realm.
#[derive(Clone)]
pub struct RealmDirectory {
    dbs: Databases,
    realm_id: u32,
}

impl RealmDirectory {
    /// Binds the directory to `realm_id`.
    pub fn new(dbs: Databases, realm_id: u32) -> Self {
        Self { dbs, realm_id }
    }

    /// Realm id this directory writes for.
    pub fn realm_id(&self) -> u32 {
        self.realm_id
    }

    /// Offline and not connectable; used before the world is loaded.
    pub fn mark_offline_invalid(&self) -> Result<(), StorageError> {
        self.dbs
            .login
            .execute(
                "UPDATE realmlist SET flag = (flag & ~?) | ? WHERE id = ?",
                &[
                    REALM_FLAG_OFFLINE.into(),
                    REALM_FLAG_INVALID.into(),
                    self.realm_id.into(),
                ],
            )
            .map(drop)
    }

    /// Connectable, population reset.
    pub fn mark_online(&self) -> Result<(), StorageError> {
        self.dbs
            .login
            .execute(
                "UPDATE realmlist SET flag = flag & ~?, population = 0 WHERE id = ?",
                &[REALM_FLAG_INVALID.into(), self.realm_id.into()],
            )
            .map(drop)
    }

    /// Shown offline.
    pub fn mark_offline(&self) -> Result<(), StorageError> {
        self.dbs
            .login
            .execute(
                "UPDATE realmlist SET flag = flag | ? WHERE id = ?",
                &[REALM_FLAG_OFFLINE.into(), self.realm_id.into()],
            )
            .map(drop)
    }

    /// Clears account and character online markers left for this realm.
    pub fn clear_online_markers(&self) -> Result<(), StorageError> {
        self.dbs.login.execute(
            "UPDATE account SET online = 0 WHERE online = ?",
            &[self.realm_id.into()],
        )?;
        self.dbs
            .character
            .execute("UPDATE characters SET online = 0 WHERE online <> 0", &[])?;
        Ok(())
    }

    /// Writes the running core version into the world database.
    pub fn record_core_version(&self, version: &str, revision: &str) -> Result<(), StorageError> {
        self.dbs
            .world
            .execute(
                "UPDATE version SET core_version = ?, core_revision = ?",
                &[version.into(), revision.into()],
            )
            .map(drop)
    }

    /// Reads the world database version string.
    pub fn load_db_version(&self) -> Result<String, StorageError> {
        let rows = self
            .dbs
            .world
            .query("SELECT db_version FROM version LIMIT 1", &[])?;
        Ok(rows
            .first()
            .and_then(|row| row.first())
            .and_then(Value::as_text)
            .unwrap_or("unknown")
            .to_string())
    }

    /// Runs `op`, logging instead of failing; teardown keeps going regardless.
    pub fn best_effort(&self, what: &str, op: impl FnOnce(&Self) -> Result<(), StorageError>) {
        if let Err(e) = op(self) {
            warn!(realm = self.realm_id, error = %e, "{what} failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryConnector;

    fn cfg() -> DatabaseConfig {
        DatabaseConfig {
            world: "127.0.0.1;3306;u;p;world".into(),
            character: "127.0.0.1;3306;u;p;characters".into(),
            login: "127.0.0.1;3306;u;p;realmd".into(),
        }
    }

    #[test]
    fn missing_connection_string_is_fatal() {
        let mut c = cfg();
        c.character.clear();
        let err = Databases::connect(&MemoryConnector::new(), &c).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Storage {
                role: DatabaseRole::Character,
                source: StorageError::MissingConnectionInfo { .. }
            }
        ));
    }

    #[test]
    fn unreachable_database_is_fatal() {
        let connector = MemoryConnector::new().unreachable(DatabaseRole::Login);
        let err = Databases::connect(&connector, &cfg()).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Storage {
                role: DatabaseRole::Login,
                source: StorageError::Unreachable { .. }
            }
        ));
        assert!(connector.database(DatabaseRole::World).is_some());
    }

    #[test]
    fn directory_writes_target_the_realm() {
        let connector = MemoryConnector::new();
        let dbs = Databases::connect(&connector, &cfg()).unwrap();
        let dir = RealmDirectory::new(dbs, 3);

        dir.mark_offline_invalid().unwrap();
        dir.mark_online().unwrap();
        dir.clear_online_markers().unwrap();

        let login = connector.database(DatabaseRole::Login).unwrap();
        let stmts = login.statements();
        assert_eq!(stmts.len(), 3);
        assert!(stmts[0].0.starts_with("UPDATE realmlist SET flag = (flag & ~?) | ?"));
        assert_eq!(stmts[0].1.last(), Some(&Value::Int(3)));
        assert!(stmts[2].0.starts_with("UPDATE account SET online = 0"));

        let chars = connector.database(DatabaseRole::Character).unwrap();
        assert_eq!(chars.statements().len(), 1);
    }

    #[test]
    fn db_version_falls_back_to_unknown() {
        let connector = MemoryConnector::new();
        let dir = RealmDirectory::new(Databases::connect(&connector, &cfg()).unwrap(), 1);
        assert_eq!(dir.load_db_version().unwrap(), "unknown");

        let connector = MemoryConnector::new().respond(
            DatabaseRole::World,
            "SELECT db_version",
            vec![vec![Value::Text("WDB 2.4.3".into())]],
        );
        let dir = RealmDirectory::new(Databases::connect(&connector, &cfg()).unwrap(), 1);
        assert_eq!(dir.load_db_version().unwrap(), "WDB 2.4.3");
    }
}
