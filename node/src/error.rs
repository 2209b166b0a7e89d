use poolnode_config::{ConfigError, RoleKind};
use poolnode_core::CoreError;
use poolnode_wallets::WalletError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for node operations
pub type Result<T> = std::result::Result<T, NodeError>;

/// Errors that abort node startup or shutdown.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("TLS file not found: {0}")]
    MissingTlsFile(PathBuf),

    #[error("Invalid peer key file {path}: {reason}")]
    InvalidPeerKey { path: PathBuf, reason: String },

    #[error("{role} failed: {reason}")]
    Role { role: RoleKind, reason: String },

    #[error("Failed to install signal handler: {0}")]
    Signal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
