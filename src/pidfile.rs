//! Process id file written at startup and removed at exit.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::RuntimeError;

/// A written pid file; [`PidFile::remove`] deletes it.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Writes the current process id to `path`.
    pub fn create(path: &Path) -> Result<Self, RuntimeError> {
        let pid = std::process::id();
        std::fs::write(path, format!("{pid}\n")).map_err(|source| RuntimeError::PidFile {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), pid, "pid file written");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the file; failure is only logged.
    pub fn remove(self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "cannot remove pid file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_remove() {
        let path = std::env::temp_dir().join(format!("worldvisor-{}.pid", std::process::id()));
        let pid = PidFile::create(&path).unwrap();
        let text = std::fs::read_to_string(pid.path()).unwrap();
        assert_eq!(text.trim(), std::process::id().to_string());
        pid.remove();
        assert!(!path.exists());
    }

    #[test]
    fn unwritable_path_is_fatal() {
        let err = PidFile::create(Path::new("/nonexistent/dir/worldvisor.pid")).unwrap_err();
        assert_eq!(err.as_label(), "runtime_pid_file");
    }
}
