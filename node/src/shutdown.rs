//! Termination signal handling.

use std::fmt;
use tracing::info;

use crate::{NodeError, Result};

/// Why the node is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT or Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl ShutdownReason {
    /// Process exit code for a graceful shutdown
    pub fn exit_code(&self) -> i32 {
        0
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Interrupt => write!(f, "SIGINT"),
            ShutdownReason::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Waits for SIGINT or SIGTERM.
#[cfg(unix)]
pub async fn wait_for_signal() -> Result<ShutdownReason> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt =
        signal(SignalKind::interrupt()).map_err(|e| NodeError::Signal(e.to_string()))?;
    let mut terminate =
        signal(SignalKind::terminate()).map_err(|e| NodeError::Signal(e.to_string()))?;

    let reason = tokio::select! {
        _ = interrupt.recv() => ShutdownReason::Interrupt,
        _ = terminate.recv() => ShutdownReason::Terminate,
    };
    info!(target: "poolnode::shutdown", signal = %reason, "received shutdown signal");
    Ok(reason)
}

/// Waits for Ctrl+C.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> Result<ShutdownReason> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| NodeError::Signal(e.to_string()))?;
    info!(target: "poolnode::shutdown", signal = %ShutdownReason::Interrupt, "received shutdown signal");
    Ok(ShutdownReason::Interrupt)
}
