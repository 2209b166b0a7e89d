//! Events emitted by a consensus engine.

use crate::{Hash, PeerAddress};

/// The blockchain head moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadChanged {
    /// Height of the new head
    pub height: u32,
    /// Hash of the new head
    pub hash: Hash,
}

/// A peer finished its handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerJoined {
    /// Address of the peer
    pub peer: PeerAddress,
}

/// Point-in-time view of the chain head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSnapshot {
    /// Head height
    pub height: u32,
    /// Accumulated work up to the head
    pub total_work: u128,
    /// Head hash
    pub head_hash: Hash,
}
