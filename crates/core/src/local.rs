//! In-process consensus engine.
//!
//! `LocalConsensus` keeps an in-memory chain seeded with the genesis block of
//! its profile. It does not speak the peer-to-peer protocol: `connect()`
//! announces the configured seed peers as joined and declares consensus
//! established, which is what an isolated or test node needs. Blocks, peers
//! and balances can be injected through `push_block`, `announce_peer` and
//! `credit`.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::{
    Accounts, Address, Blockchain, Consensus, ConsensusFactory, ConsensusType, GenesisConfig,
    Hash, HeadChanged, Mempool, Network, NetworkConfig, PeerAddress, PeerJoined, Result,
    SeedPeer,
};

/// Capacity of the head-changed channel
pub const HEAD_CHANNEL_SIZE: usize = 1024;
/// Capacity of the peer-joined channel
pub const PEER_CHANNEL_SIZE: usize = 256;

#[derive(Debug, Clone, Copy)]
struct ChainHead {
    height: u32,
    hash: Hash,
    total_work: u128,
}

/// In-memory chain.
pub struct LocalBlockchain {
    head: RwLock<ChainHead>,
    head_tx: broadcast::Sender<HeadChanged>,
}

impl LocalBlockchain {
    /// Creates a chain holding only the genesis block at height 1.
    pub fn new(genesis: &GenesisConfig) -> Self {
        let (head_tx, _) = broadcast::channel(HEAD_CHANNEL_SIZE);
        Self {
            head: RwLock::new(ChainHead {
                height: 1,
                hash: genesis.genesis_hash(),
                total_work: 1,
            }),
            head_tx,
        }
    }

    /// Appends a block of the given difficulty and announces the new head.
    pub fn push_block(&self, difficulty: u64) -> HeadChanged {
        let event = {
            let mut head = self.head.write();
            let height = head.height + 1;
            let mut preimage = head.hash.as_bytes().to_vec();
            preimage.extend_from_slice(&height.to_be_bytes());
            head.height = height;
            head.hash = Hash::digest(preimage);
            head.total_work += difficulty as u128;
            HeadChanged {
                height,
                hash: head.hash,
            }
        };
        let _ = self.head_tx.send(event.clone());
        event
    }
}

impl Blockchain for LocalBlockchain {
    fn height(&self) -> u32 {
        self.head.read().height
    }

    fn head_hash(&self) -> Hash {
        self.head.read().hash
    }

    fn total_work(&self) -> u128 {
        self.head.read().total_work
    }

    fn subscribe_head(&self) -> broadcast::Receiver<HeadChanged> {
        self.head_tx.subscribe()
    }

    fn snapshot(&self) -> crate::ChainSnapshot {
        let head = *self.head.read();
        crate::ChainSnapshot {
            height: head.height,
            total_work: head.total_work,
            head_hash: head.hash,
        }
    }
}

/// In-memory account balances.
#[derive(Default)]
pub struct LocalAccounts {
    balances: RwLock<HashMap<Address, u64>>,
}

impl LocalAccounts {
    /// Adds `lunas` to the balance of `address`.
    pub fn credit(&self, address: Address, lunas: u64) {
        let mut balances = self.balances.write();
        let balance = balances.entry(address).or_insert(0);
        *balance = balance.saturating_add(lunas);
    }
}

#[async_trait]
impl Accounts for LocalAccounts {
    async fn balance(&self, address: &Address) -> Result<u64> {
        Ok(self.balances.read().get(address).copied().unwrap_or(0))
    }
}

/// Counting transaction pool.
#[derive(Default)]
pub struct LocalMempool {
    pending: AtomicUsize,
}

impl Mempool for LocalMempool {
    fn len(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

/// Network that never dials; seed peers join on `connect()`.
pub struct LocalNetwork {
    peer_address: PeerAddress,
    seed_peers: Vec<SeedPeer>,
    peers: RwLock<Vec<PeerAddress>>,
    peer_tx: broadcast::Sender<PeerJoined>,
    established_tx: Arc<watch::Sender<bool>>,
    connected: AtomicBool,
}

impl LocalNetwork {
    fn new(
        network: &NetworkConfig,
        genesis: &GenesisConfig,
        established_tx: Arc<watch::Sender<bool>>,
    ) -> Self {
        let (peer_tx, _) = broadcast::channel(PEER_CHANNEL_SIZE);
        Self {
            peer_address: network.peer_address(),
            seed_peers: genesis.seed_peers().to_vec(),
            peers: RwLock::new(Vec::new()),
            peer_tx,
            established_tx,
            connected: AtomicBool::new(false),
        }
    }

    /// Own peer address
    pub fn peer_address(&self) -> &PeerAddress {
        &self.peer_address
    }

    /// Registers a joined peer and announces it.
    pub fn announce_peer(&self, peer: PeerAddress) {
        self.peers.write().push(peer.clone());
        let _ = self.peer_tx.send(PeerJoined { peer });
    }
}

#[async_trait]
impl Network for LocalNetwork {
    async fn connect(&self) -> Result<()> {
        if self.connected.swap(true, Ordering::SeqCst) {
            debug!(target: "poolnode::consensus", "network already connected");
            return Ok(());
        }

        for seed in &self.seed_peers {
            self.announce_peer(PeerAddress::seed(seed));
        }

        info!(
            target: "poolnode::consensus",
            peer_address = %self.peer_address,
            seed_peers = self.seed_peers.len(),
            "local network connected"
        );
        self.established_tx.send_replace(true);
        Ok(())
    }

    fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    fn subscribe_peers(&self) -> broadcast::Receiver<PeerJoined> {
        self.peer_tx.subscribe()
    }
}

/// In-process consensus engine.
pub struct LocalConsensus {
    consensus_type: ConsensusType,
    blockchain: Arc<LocalBlockchain>,
    accounts: Option<Arc<LocalAccounts>>,
    mempool: Arc<LocalMempool>,
    network: Arc<LocalNetwork>,
    established_tx: Arc<watch::Sender<bool>>,
}

impl LocalConsensus {
    /// Creates an engine of the given mode bound to `network`.
    pub fn new(consensus_type: ConsensusType, network: &NetworkConfig, genesis: &GenesisConfig) -> Self {
        let (established_tx, _) = watch::channel(false);
        let established_tx = Arc::new(established_tx);
        let accounts = consensus_type
            .has_accounts()
            .then(|| Arc::new(LocalAccounts::default()));

        Self {
            consensus_type,
            blockchain: Arc::new(LocalBlockchain::new(genesis)),
            accounts,
            mempool: Arc::new(LocalMempool::default()),
            network: Arc::new(LocalNetwork::new(network, genesis, established_tx.clone())),
            established_tx,
        }
    }

    /// Appends a block; see [`LocalBlockchain::push_block`].
    pub fn push_block(&self, difficulty: u64) -> HeadChanged {
        self.blockchain.push_block(difficulty)
    }

    /// Announces a joined peer; see [`LocalNetwork::announce_peer`].
    pub fn announce_peer(&self, peer: PeerAddress) {
        self.network.announce_peer(peer);
    }

    /// Credits an account. No-op in nano mode.
    pub fn credit(&self, address: Address, lunas: u64) {
        if let Some(accounts) = &self.accounts {
            accounts.credit(address, lunas);
        }
    }

    /// Declares consensus established.
    pub fn mark_established(&self) {
        self.established_tx.send_replace(true);
    }
}

impl Consensus for LocalConsensus {
    fn consensus_type(&self) -> ConsensusType {
        self.consensus_type
    }

    fn blockchain(&self) -> Arc<dyn Blockchain> {
        self.blockchain.clone()
    }

    fn accounts(&self) -> Option<Arc<dyn Accounts>> {
        self.accounts
            .as_ref()
            .map(|accounts| accounts.clone() as Arc<dyn Accounts>)
    }

    fn mempool(&self) -> Arc<dyn Mempool> {
        self.mempool.clone()
    }

    fn network(&self) -> Arc<dyn Network> {
        self.network.clone()
    }

    fn is_established(&self) -> bool {
        *self.established_tx.borrow()
    }

    fn subscribe_established(&self) -> watch::Receiver<bool> {
        self.established_tx.subscribe()
    }
}

/// Factory producing [`LocalConsensus`] engines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalConsensusFactory;

impl LocalConsensusFactory {
    fn build(consensus_type: ConsensusType, network: &NetworkConfig, genesis: &GenesisConfig) -> Arc<dyn Consensus> {
        info!(
            target: "poolnode::consensus",
            consensus = %consensus_type,
            profile = genesis.name(),
            "bootstrapping local consensus"
        );
        Arc::new(LocalConsensus::new(consensus_type, network, genesis))
    }
}

#[async_trait]
impl ConsensusFactory for LocalConsensusFactory {
    async fn full(&self, network: &NetworkConfig, genesis: &GenesisConfig) -> Result<Arc<dyn Consensus>> {
        Ok(Self::build(ConsensusType::Full, network, genesis))
    }

    async fn light(&self, network: &NetworkConfig, genesis: &GenesisConfig) -> Result<Arc<dyn Consensus>> {
        Ok(Self::build(ConsensusType::Light, network, genesis))
    }

    async fn nano(&self, network: &NetworkConfig, genesis: &GenesisConfig) -> Result<Arc<dyn Consensus>> {
        Ok(Self::build(ConsensusType::Nano, network, genesis))
    }
}
