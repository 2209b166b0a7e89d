//! Consensus modes and the interfaces a consensus engine exposes to the node.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use crate::{Address, ChainSnapshot, GenesisConfig, Hash, HeadChanged, NetworkConfig, PeerJoined, Result};

/// How a node validates and stores chain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusType {
    /// Full history and state
    Full,
    /// State without full history
    Light,
    /// Neither history nor state; relies on peer proofs
    Nano,
}

impl ConsensusType {
    /// All recognised modes
    pub const ALL: [ConsensusType; 3] = [ConsensusType::Full, ConsensusType::Light, ConsensusType::Nano];

    /// Whether the mode keeps local account state.
    pub fn has_accounts(&self) -> bool {
        !matches!(self, ConsensusType::Nano)
    }

    /// Lowercase tag
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusType::Full => "full",
            ConsensusType::Light => "light",
            ConsensusType::Nano => "nano",
        }
    }
}

impl fmt::Display for ConsensusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsensusType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(ConsensusType::Full),
            "light" => Ok(ConsensusType::Light),
            "nano" => Ok(ConsensusType::Nano),
            _ => Err(format!("Unknown consensus type: {}", s)),
        }
    }
}

/// Read access to the chain head.
pub trait Blockchain: Send + Sync {
    /// Head height
    fn height(&self) -> u32;

    /// Head hash
    fn head_hash(&self) -> Hash;

    /// Accumulated work up to the head
    fn total_work(&self) -> u128;

    /// Subscribes to head changes.
    fn subscribe_head(&self) -> broadcast::Receiver<HeadChanged>;

    /// Consistent view of height, work and hash.
    fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            height: self.height(),
            total_work: self.total_work(),
            head_hash: self.head_hash(),
        }
    }
}

/// Account balance state. Only full and light engines keep one.
#[async_trait]
pub trait Accounts: Send + Sync {
    /// Balance of `address` in lunas; unknown accounts hold zero.
    async fn balance(&self, address: &Address) -> Result<u64>;
}

/// Pending transaction pool.
pub trait Mempool: Send + Sync {
    /// Number of pending transactions
    fn len(&self) -> usize;

    /// Whether the pool is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Peer network of a consensus engine.
#[async_trait]
pub trait Network: Send + Sync {
    /// Starts connecting to the network.
    async fn connect(&self) -> Result<()>;

    /// Number of connected peers
    fn peer_count(&self) -> usize;

    /// Subscribes to peer joins.
    fn subscribe_peers(&self) -> broadcast::Receiver<PeerJoined>;
}

/// A running consensus engine.
pub trait Consensus: Send + Sync {
    /// Mode the engine runs in
    fn consensus_type(&self) -> ConsensusType;

    /// Chain head access
    fn blockchain(&self) -> Arc<dyn Blockchain>;

    /// Account state; `None` in nano mode.
    fn accounts(&self) -> Option<Arc<dyn Accounts>>;

    /// Transaction pool
    fn mempool(&self) -> Arc<dyn Mempool>;

    /// Peer network
    fn network(&self) -> Arc<dyn Network>;

    /// Whether the local view has caught up with the network
    fn is_established(&self) -> bool;

    /// Watches the established flag. It flips to `true` at most once.
    fn subscribe_established(&self) -> watch::Receiver<bool>;
}

/// Builds consensus engines bound to a network configuration.
#[async_trait]
pub trait ConsensusFactory: Send + Sync {
    /// Full consensus
    async fn full(&self, network: &NetworkConfig, genesis: &GenesisConfig) -> Result<Arc<dyn Consensus>>;

    /// Light consensus
    async fn light(&self, network: &NetworkConfig, genesis: &GenesisConfig) -> Result<Arc<dyn Consensus>>;

    /// Nano consensus
    async fn nano(&self, network: &NetworkConfig, genesis: &GenesisConfig) -> Result<Arc<dyn Consensus>>;
}
