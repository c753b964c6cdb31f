//! # Server configuration.
//!
//! [`ServerConfig`] is read from a TOML file (default [`DEFAULT_CONFIG_PATH`]).
//! Every field has a default, so a partial file is valid; [`ServerConfig::validate`]
//! rejects the few settings the server cannot start without.
//!
//! # Example
//! ```
//! use worldvisor::ServerConfig;
//!
//! let cfg = ServerConfig::from_toml_str(r#"
//!     realm_id = 1
//!
//!     [database]
//!     world = "127.0.0.1;3306;mangos;mangos;world"
//!     character = "127.0.0.1;3306;mangos;mangos;characters"
//!     login = "127.0.0.1;3306;mangos;mangos;realmd"
//!
//!     [freeze_detector]
//!     max_stuck_time_secs = 0
//! "#).unwrap();
//!
//! assert!(cfg.validate().is_ok());
//! assert!(!cfg.freeze_detector.enabled());
//! assert_eq!(cfg.network.world_port, 8085);
//! ```
//!
//! ## Sentinel values
//! - `freeze_detector.max_stuck_time_secs = 0` → watchdog disabled
//! - `remote_admin.secret = ""` → remote admin refuses to start
//! - `pid_file = ""` → no pid file

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Config file read when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "worldserver.toml";

/// Version of the configuration layout this build expects.
pub const CONFIG_VERSION: u64 = 2026101601;

/// Errors raised while loading configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read.
    #[error("cannot read configuration file {path}: {source}")]
    Read {
        /// Path that was tried.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for [`ServerConfig`].
    #[error("cannot parse configuration: {source}")]
    Parse {
        /// Underlying parser error.
        #[source]
        source: toml::de::Error,
    },

    /// A required setting is absent or out of range.
    #[error("invalid configuration: {field}: {reason}")]
    Invalid {
        /// Dotted setting name.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Whole configuration file.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Layout version the file was written for.
    pub conf_version: u64,
    /// Id of this realm in the directory; must be non-zero.
    pub realm_id: u32,
    /// Pid file path; empty disables it.
    pub pid_file: PathBuf,
    /// Connection strings.
    pub database: DatabaseConfig,
    /// World listener.
    pub network: NetworkConfig,
    /// Interactive console.
    pub console: ConsoleConfig,
    /// Watchdog.
    pub freeze_detector: FreezeDetectorConfig,
    /// Remote administration listener.
    pub remote_admin: RemoteAdminConfig,
    /// Primary tick loop.
    pub world: WorldConfig,
    /// Teardown bounds.
    pub shutdown: ShutdownConfig,
    /// Diagnostics.
    pub log: LogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            conf_version: CONFIG_VERSION,
            realm_id: 0,
            pid_file: PathBuf::new(),
            database: DatabaseConfig::default(),
            network: NetworkConfig::default(),
            console: ConsoleConfig::default(),
            freeze_detector: FreezeDetectorConfig::default(),
            remote_admin: RemoteAdminConfig::default(),
            world: WorldConfig::default(),
            shutdown: ShutdownConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads and parses `path`. Does not validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse { source })
    }

    /// Checks the settings startup cannot do without.
    ///
    /// Database strings are checked again (per role) when connecting; this only
    /// rejects values that are never usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.realm_id == 0 {
            return Err(ConfigError::Invalid {
                field: "realm_id",
                reason: "realm id not set",
            });
        }
        if self.world.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "world.tick_interval_ms",
                reason: "must be greater than zero",
            });
        }
        if self.freeze_detector.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "freeze_detector.poll_interval_ms",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }

    /// True when the file predates this build's layout.
    pub fn is_outdated(&self) -> bool {
        self.conf_version < CONFIG_VERSION
    }
}

/// `host;port;user;password;database` strings, one per role.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// World/entity data.
    pub world: String,
    /// Character/session data.
    pub character: String,
    /// Account and realm directory data.
    pub login: String,
}

/// World listener settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind.
    pub bind_ip: IpAddr,
    /// Port to bind; `0` picks an ephemeral port.
    pub world_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            world_port: 8085,
        }
    }
}

impl NetworkConfig {
    /// Socket address to bind.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.world_port)
    }
}

/// Interactive console settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Start the console loop.
    pub enable: bool,
    /// Ring the terminal bell once the console starts.
    pub beep_at_start: bool,
    /// Console text encoding label (`utf-8`, `windows-1251`, ...).
    pub encoding: String,
    /// Prompt text.
    pub prompt: String,
    /// Persist history here; empty keeps it in memory.
    pub history_file: PathBuf,
    /// Bound on joining the console at teardown.
    pub join_timeout_ms: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enable: true,
            beep_at_start: true,
            encoding: "utf-8".to_string(),
            prompt: "mangos>".to_string(),
            history_file: PathBuf::new(),
            join_timeout_ms: 500,
        }
    }
}

impl ConsoleConfig {
    /// Join bound as a [`Duration`].
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// Watchdog settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FreezeDetectorConfig {
    /// Stall threshold; `0` disables the watchdog.
    pub max_stuck_time_secs: u64,
    /// Poll interval.
    pub poll_interval_ms: u64,
}

impl Default for FreezeDetectorConfig {
    fn default() -> Self {
        Self {
            max_stuck_time_secs: 60,
            poll_interval_ms: 1000,
        }
    }
}

impl FreezeDetectorConfig {
    /// Whether the watchdog should start.
    pub fn enabled(&self) -> bool {
        self.max_stuck_time_secs != 0
    }

    /// Stall threshold as a [`Duration`].
    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.max_stuck_time_secs)
    }

    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Remote administration listener settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RemoteAdminConfig {
    /// Start the listener.
    pub enable: bool,
    /// Address to bind.
    pub bind_ip: IpAddr,
    /// Port to bind.
    pub port: u16,
    /// Shared secret expected as the first line.
    pub secret: String,
}

impl Default for RemoteAdminConfig {
    fn default() -> Self {
        Self {
            enable: false,
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3443,
            secret: String::new(),
        }
    }
}

impl RemoteAdminConfig {
    /// Socket address to bind.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }
}

/// Primary tick loop settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Target tick length.
    pub tick_interval_ms: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
        }
    }
}

impl WorldConfig {
    /// Tick length as a [`Duration`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Teardown settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Bound on each worker join (console excepted).
    pub grace_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 30 }
    }
}

impl ShutdownConfig {
    /// Join bound as a [`Duration`].
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

/// Diagnostics settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` overrides it.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_takes_defaults() {
        let cfg = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.conf_version, CONFIG_VERSION);
        assert_eq!(cfg.world.tick_interval(), Duration::from_millis(50));
        assert_eq!(cfg.freeze_detector.threshold(), Duration::from_secs(60));
        assert!(cfg.console.enable);
        assert!(!cfg.remote_admin.enable);
        assert!(cfg.pid_file.as_os_str().is_empty());
    }

    #[test]
    fn zero_realm_id_is_rejected() {
        let cfg = ServerConfig::from_toml_str("").unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid {
                field: "realm_id",
                ..
            })
        ));
    }

    #[test]
    fn old_layout_is_flagged() {
        let cfg = ServerConfig::from_toml_str("conf_version = 2020010101\nrealm_id = 2").unwrap();
        assert!(cfg.is_outdated());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = ServerConfig::from_toml_str(
            r#"
            [network]
            bind_ip = "127.0.0.1"
            world_port = 0

            [console]
            enable = false
            encoding = "windows-1251"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.network.addr(), "127.0.0.1:0".parse().unwrap());
        assert!(!cfg.console.enable);
        assert_eq!(cfg.console.encoding, "windows-1251");
        assert_eq!(cfg.console.prompt, "mangos>");
    }

    #[test]
    fn unknown_type_is_a_parse_error() {
        let err = ServerConfig::from_toml_str("realm_id = \"one\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = ServerConfig::load("/nonexistent/worldserver.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
