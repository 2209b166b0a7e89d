//! # Poolnode Core
//!
//! Fundamental types and collaborator interfaces for the poolnode orchestrator.
//!
//! ## Architecture
//!
//! - **Primitives**: `address`, `hash`, `key_pair`, `peer` - identities and hashes
//! - **Chain parameters**: `genesis`, `policy` - genesis profiles and coin units
//! - **Networking**: `network` - dumb and websocket network configurations
//! - **Consensus**: `consensus`, `events` - the traits a consensus engine exposes
//!   and the typed events it emits
//! - **Local engine**: `local` - an in-process consensus engine for isolated nodes

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// User-friendly account addresses
pub mod address;
/// Consensus modes and collaborator traits
pub mod consensus;
/// Typed chain and network events
pub mod events;
/// Genesis profile registry
pub mod genesis;
/// 32-byte hashes
pub mod hash;
/// Ed25519 key pairs and public keys
pub mod key_pair;
/// In-process consensus engine
pub mod local;
/// Network configurations
pub mod network;
/// Peer addresses and seed peers
pub mod peer;
/// Coin unit policy
pub mod policy;

pub use address::Address;
pub use consensus::{
    Accounts, Blockchain, Consensus, ConsensusFactory, ConsensusType, Mempool, Network,
};
pub use events::{ChainSnapshot, HeadChanged, PeerJoined};
pub use genesis::GenesisConfig;
pub use hash::Hash;
pub use key_pair::{KeyPair, PublicKey};
pub use local::{LocalConsensus, LocalConsensusFactory};
pub use network::{NetworkConfig, TlsCredentials};
pub use peer::{PeerAddress, SeedPeer};

use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors
#[derive(Error, Debug)]
pub enum CoreError {
    /// Address string could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Address check digits did not match
    #[error("Invalid address checksum: {0}")]
    InvalidChecksum(String),

    /// Hex decoding failed
    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// Key material had the wrong length
    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Expected number of bytes
        expected: usize,
        /// Actual number of bytes
        actual: usize,
    },

    /// Public key bytes are not a valid curve point
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Genesis profile name is not registered
    #[error("Unknown genesis profile: {0}")]
    UnknownGenesisProfile(String),

    /// Consensus engine failed to bootstrap or serve a request
    #[error("Consensus error: {0}")]
    Consensus(String),
}
