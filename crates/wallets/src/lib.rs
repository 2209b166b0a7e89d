//! Poolnode Wallets
//!
//! This crate provides:
//! - `Wallet`: a key pair together with its account address
//! - `WalletStore`: persistent address → wallet mapping with one default address
//! - `MemoryWalletStore` and `FileWalletStore` implementations

pub mod file_store;
pub mod store;
pub mod wallet;

pub use file_store::FileWalletStore;
pub use store::{MemoryWalletStore, WalletStore};
pub use wallet::Wallet;

use poolnode_core::{Address, CoreError};
use thiserror::Error;

/// Result type for wallet operations
pub type Result<T> = std::result::Result<T, WalletError>;

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Invalid wallet seed: {0}")]
    InvalidSeed(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(Address),

    #[error("Invalid wallet file: {0}")]
    InvalidWalletFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}
