//! Node startup and shutdown orchestration.
//!
//! Startup is strictly sequential: genesis, network identity, consensus,
//! wallet, pool role, status summary, lifecycle loop and finally the network
//! connection. The result is an immutable [`Startup`] shared by reference;
//! the active role is owned separately by the [`Node`].

use poolnode_config::{NodeConfig, RoleKind};
use poolnode_core::policy::lunas_to_coins;
use poolnode_core::{Address, Consensus, ConsensusFactory, GenesisConfig, NetworkConfig};
use poolnode_wallets::{FileWalletStore, Wallet, WalletStore};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::consensus::select_consensus;
use crate::identity::{build_identity, init_genesis};
use crate::lifecycle::{spawn_event_loop, LifecycleLogger};
use crate::roles::{dispatch_role, ActiveRole, DefaultRoleFactory, RoleContext, RoleFactory};
use crate::shutdown::{wait_for_signal, ShutdownReason};
use crate::wallet::resolve_wallet;
use crate::Result;

/// External services the node is assembled from.
#[derive(Clone)]
pub struct Collaborators {
    /// Builds the consensus engine
    pub consensus_factory: Arc<dyn ConsensusFactory>,
    /// Persists wallets
    pub wallet_store: Arc<dyn WalletStore>,
    /// Builds pool roles
    pub role_factory: Arc<dyn RoleFactory>,
}

impl Collaborators {
    /// In-process collaborators with wallets stored under `config.data_dir`.
    pub async fn local(config: &NodeConfig) -> Result<Self> {
        let wallet_store = FileWalletStore::open(&config.data_dir).await?;
        Ok(Self {
            consensus_factory: Arc::new(poolnode_core::LocalConsensusFactory),
            wallet_store: Arc::new(wallet_store),
            role_factory: Arc::new(DefaultRoleFactory),
        })
    }
}

/// Everything startup produced, fixed for the life of the process.
pub struct Startup {
    config: NodeConfig,
    genesis: GenesisConfig,
    network_config: NetworkConfig,
    consensus: Arc<dyn Consensus>,
    wallet_store: Arc<dyn WalletStore>,
    wallet: Wallet,
    started_at: Instant,
}

impl Startup {
    /// Validated configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Genesis profile including configured seed peers
    pub fn genesis(&self) -> &GenesisConfig {
        &self.genesis
    }

    /// Network identity
    pub fn network_config(&self) -> &NetworkConfig {
        &self.network_config
    }

    /// Consensus engine
    pub fn consensus(&self) -> &Arc<dyn Consensus> {
        &self.consensus
    }

    /// Wallet store
    pub fn wallet_store(&self) -> &Arc<dyn WalletStore> {
        &self.wallet_store
    }

    /// Active wallet
    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// When startup began
    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}

/// A started node.
pub struct Node {
    startup: Arc<Startup>,
    role: Option<ActiveRole>,
    shutdown_tx: broadcast::Sender<()>,
    event_loop: JoinHandle<()>,
}

impl Node {
    /// Startup result
    pub fn startup(&self) -> &Arc<Startup> {
        &self.startup
    }

    /// Kind of the active pool role, if any
    pub fn active_role(&self) -> Option<RoleKind> {
        self.role.as_ref().map(ActiveRole::kind)
    }

    /// Whether the lifecycle loop is still running
    pub fn is_running(&self) -> bool {
        !self.event_loop.is_finished()
    }

    /// Stops the active role and the lifecycle loop.
    ///
    /// A failing role stop is logged; shutdown still completes.
    pub async fn shutdown(self) {
        if let Some(role) = &self.role {
            if let Err(e) = role.stop().await {
                error!(target: "poolnode::runtime", role = %role.kind(), error = %e, "failed to stop pool role");
            }
        }

        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.event_loop.await {
            error!(target: "poolnode::runtime", error = %e, "lifecycle loop failed");
        }
        info!(target: "poolnode::runtime", "node stopped");
    }
}

fn wallet_list(addresses: &[Address]) -> String {
    addresses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

async fn log_status(startup: &Startup) -> Result<()> {
    let wallets = wallet_list(&startup.wallet_store.list().await?);
    info!(target: "poolnode::runtime", %wallets, "managing wallets [{}]", wallets);

    let address = startup.wallet.address();
    match startup.consensus.accounts() {
        Some(accounts) => {
            let balance = accounts.balance(&address).await?;
            info!(
                target: "poolnode::runtime",
                wallet = %address,
                balance = %lunas_to_coins(balance),
                "wallet initialized"
            );
        }
        None => {
            info!(target: "poolnode::runtime", wallet = %address, "wallet initialized");
        }
    }

    let blockchain = startup.consensus.blockchain();
    info!(
        target: "poolnode::runtime",
        height = blockchain.height(),
        head_hash = %blockchain.head_hash(),
        "blockchain state"
    );
    Ok(())
}

/// Runs startup and returns the running node.
pub async fn start(config: NodeConfig, collaborators: Collaborators) -> Result<Node> {
    let started_at = Instant::now();
    info!(
        target: "poolnode::runtime",
        profile = %config.profile,
        consensus = %config.consensus,
        "starting node"
    );

    let genesis = init_genesis(&config)?;
    let network_config = build_identity(&config).await?;
    let consensus = select_consensus(
        collaborators.consensus_factory.as_ref(),
        config.consensus,
        &network_config,
        &genesis,
    )
    .await?;

    let wallet_store = collaborators.wallet_store;
    let wallet = resolve_wallet(wallet_store.as_ref(), config.wallet_seed.as_deref()).await?;

    let ctx = RoleContext {
        consensus: consensus.clone(),
        wallet: wallet.clone(),
    };
    let role = dispatch_role(config.role.as_ref(), &ctx, collaborators.role_factory.as_ref()).await?;

    let startup = Arc::new(Startup {
        config,
        genesis,
        network_config,
        consensus,
        wallet_store,
        wallet,
        started_at,
    });
    log_status(&startup).await?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let logger = LifecycleLogger::new(startup.consensus.consensus_type(), started_at);
    let event_loop = spawn_event_loop(startup.consensus.clone(), logger, shutdown_rx);

    startup.consensus.network().connect().await?;
    info!(target: "poolnode::runtime", "node started");

    Ok(Node {
        startup,
        role,
        shutdown_tx,
        event_loop,
    })
}

/// Waits for `signal`, then shuts the node down.
pub async fn run_until_shutdown<F>(node: Node, signal: F) -> Result<ShutdownReason>
where
    F: Future<Output = Result<ShutdownReason>>,
{
    let reason = match signal.await {
        Ok(reason) => reason,
        Err(e) => {
            node.shutdown().await;
            return Err(e);
        }
    };
    info!(target: "poolnode::runtime", signal = %reason, "shutting down");
    node.shutdown().await;
    Ok(reason)
}

/// Starts a node and runs it until SIGINT or SIGTERM.
pub async fn run(config: NodeConfig, collaborators: Collaborators) -> Result<ShutdownReason> {
    let node = start(config, collaborators).await?;
    run_until_shutdown(node, wait_for_signal()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_list_is_one_line() {
        let first = Address::new([0u8; 20]);
        let second = poolnode_core::KeyPair::generate().address();
        let line = wallet_list(&[first, second]);
        assert_eq!(line, format!("{}, {}", first, second));
        assert!(line.starts_with("NQ07 0000"));
        assert_eq!(wallet_list(&[]), "");
    }
}
