//! Connection strings in `host;port;user;password;database` form.

use std::fmt;

use crate::storage::StorageError;

/// Parsed connection string.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Server host (or `.` for a local socket).
    pub host: String,
    /// Server port (or socket path when `host` is `.`).
    pub port: String,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl ConnectionInfo {
    /// Parses `host;port;user;password;database`.
    ///
    /// ```
    /// use worldvisor::ConnectionInfo;
    ///
    /// let info = ConnectionInfo::parse("127.0.0.1;3306;oregon;secret;world").unwrap();
    /// assert_eq!(info.database, "world");
    /// assert_eq!(info.target(), "127.0.0.1:3306/world");
    /// ```
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        let parts: Vec<&str> = s.split(';').map(str::trim).collect();
        let [host, port, user, password, database] = parts.as_slice() else {
            return Err(StorageError::InvalidConnectionInfo {
                reason: format!("expected 5 ';'-separated fields, got {}", parts.len()),
            });
        };
        if host.is_empty() || database.is_empty() {
            return Err(StorageError::InvalidConnectionInfo {
                reason: "host and database must not be empty".into(),
            });
        }
        Ok(Self {
            host: host.to_string(),
            port: port.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            database: database.to_string(),
        })
    }

    /// `host:port/database`, safe to log.
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

// The password never reaches logs.
impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_field_count() {
        let err = ConnectionInfo::parse("127.0.0.1;3306;root").unwrap_err();
        assert!(matches!(err, StorageError::InvalidConnectionInfo { .. }));
    }

    #[test]
    fn rejects_empty_database() {
        assert!(ConnectionInfo::parse("h;1;u;p;").is_err());
    }

    #[test]
    fn debug_hides_password() {
        let info = ConnectionInfo::parse("h;1;u;hunter2;db").unwrap();
        assert!(!format!("{info:?}").contains("hunter2"));
    }
}
