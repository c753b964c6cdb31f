//! # Cross-platform OS signal handling.
//!
//! Provides [`wait_for_termination_signal`], an async helper that completes when the
//! process receives a termination signal and tells which [`ShutdownReason`] it maps to,
//! and [`SignalHook`], which forwards the first signal into a [`Termination`] cell.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal) → [`ShutdownReason::Restart`]
//! - `SIGTERM` (default kill signal, used by systemd) → [`ShutdownReason::Shutdown`]
//!
//! **Windows platforms:**
//! - `Ctrl-C` → [`ShutdownReason::Restart`]
//! - `Ctrl-Break` → [`ShutdownReason::Shutdown`]

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::{ShutdownReason, Termination};

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
///
/// Returns the mapped reason, or `Err` if signal registration fails.
#[cfg(unix)]
pub async fn wait_for_termination_signal() -> std::io::Result<ShutdownReason> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let reason = tokio::select! {
        _ = sigint.recv()  => ShutdownReason::Restart,
        _ = sigterm.recv() => ShutdownReason::Shutdown,
    };
    Ok(reason)
}

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
///
/// Returns the mapped reason, or `Err` if signal registration fails.
#[cfg(windows)]
pub async fn wait_for_termination_signal() -> std::io::Result<ShutdownReason> {
    let mut ctrl_break = tokio::signal::windows::ctrl_break()?;

    let reason = tokio::select! {
        r = tokio::signal::ctrl_c() => { r?; ShutdownReason::Restart }
        _ = ctrl_break.recv() => ShutdownReason::Shutdown,
    };
    Ok(reason)
}

/// Installed signal interception; [`unhook`](SignalHook::unhook) removes it.
pub struct SignalHook {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl SignalHook {
    /// Starts listening for termination signals and records the first one in `termination`.
    pub fn install(termination: Termination) -> Self {
        let token = CancellationToken::new();
        let stop = token.clone();
        let join = tokio::spawn(async move {
            tokio::select! {
                res = wait_for_termination_signal() => match res {
                    Ok(reason) => {
                        debug!(%reason, "termination signal received");
                        termination.request(reason);
                    }
                    Err(e) => warn!(error = %e, "cannot register signal handlers"),
                },
                _ = stop.cancelled() => {}
            }
        });
        Self { token, join }
    }

    /// Stops listening; signal streams are dropped with the listener task.
    pub async fn unhook(self) {
        self.token.cancel();
        let _ = self.join.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unhook_leaves_termination_untouched() {
        let t = Termination::new();
        let hook = SignalHook::install(t.clone());
        hook.unhook().await;
        assert!(!t.is_stopped());
    }
}
