//! Genesis profile registry.
//!
//! A profile selects the chain parameters a node runs with. Seed peers from the
//! node configuration are appended to the profile's built-in list, which is
//! owned by the `GenesisConfig` value rather than held in process-global state.

use crate::{CoreError, Hash, Result, SeedPeer};

/// Registered genesis profiles as `(name, network id)`.
pub const GENESIS_PROFILES: &[(&str, u8)] = &[("main", 42), ("test", 1), ("dev", 2)];

/// Chain parameters selected by profile name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisConfig {
    name: String,
    network_id: u8,
    genesis_hash: Hash,
    seed_peers: Vec<SeedPeer>,
}

impl GenesisConfig {
    /// Looks up a registered profile.
    pub fn for_profile(name: &str) -> Result<Self> {
        let (name, network_id) = GENESIS_PROFILES
            .iter()
            .find(|(profile, _)| *profile == name)
            .ok_or_else(|| CoreError::UnknownGenesisProfile(name.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            network_id: *network_id,
            genesis_hash: Hash::digest(format!("genesis:{}:{}", name, network_id)),
            seed_peers: Vec::new(),
        })
    }

    /// Whether `name` is a registered profile.
    pub fn is_known_profile(name: &str) -> bool {
        GENESIS_PROFILES.iter().any(|(profile, _)| *profile == name)
    }

    /// Profile name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Network id of the profile
    pub fn network_id(&self) -> u8 {
        self.network_id
    }

    /// Hash of the genesis block
    pub fn genesis_hash(&self) -> Hash {
        self.genesis_hash
    }

    /// Bootstrap peers in insertion order
    pub fn seed_peers(&self) -> &[SeedPeer] {
        &self.seed_peers
    }

    /// Appends a bootstrap peer.
    pub fn add_seed_peer(&mut self, peer: SeedPeer) {
        self.seed_peers.push(peer);
    }
}
