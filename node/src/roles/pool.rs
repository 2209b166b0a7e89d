//! Built-in pool roles.
//!
//! The datastore-backed share accounting lives outside this process; these
//! roles own the parts the node is responsible for: the miner listener, chain
//! following and an orderly drain on shutdown.

use async_trait::async_trait;
use poolnode_config::{PoolPayoutConfig, PoolServerConfig, PoolServiceConfig, RoleKind};
use poolnode_core::Consensus;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::{PoolRole, RoleContext, RoleFactory};
use crate::identity::check_tls_files;
use crate::{NodeError, Result};

/// Maximum time a role gets to drain after shutdown is requested
pub const ROLE_STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Background task of a role plus the channel that stops it.
struct RoleTask {
    kind: RoleKind,
    shutdown_tx: broadcast::Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RoleTask {
    fn new(kind: RoleKind) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            kind,
            shutdown_tx,
            handle: Mutex::new(None),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    async fn attach(&self, handle: JoinHandle<()>) -> Result<()> {
        let mut slot = self.handle.lock().await;
        if slot.is_some() {
            handle.abort();
            return Err(NodeError::Role {
                role: self.kind,
                reason: "already started".to_string(),
            });
        }
        *slot = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some(handle) = self.handle.lock().await.take() else {
            return Ok(());
        };
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(ROLE_STOP_TIMEOUT, handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(NodeError::Role {
                role: self.kind,
                reason: format!("task failed: {}", e),
            }),
            Err(_) => Err(NodeError::Role {
                role: self.kind,
                reason: "timed out while draining".to_string(),
            }),
        }
    }
}

/// Accepts miner connections.
///
/// The configured TLS key and certificate must exist before the server is
/// built, but the listener itself accepts plain TCP. TLS is expected to be
/// terminated by a proxy in front of it.
pub struct PoolServer {
    config: PoolServerConfig,
    task: RoleTask,
    local_addr: OnceLock<SocketAddr>,
    counters: Arc<ConnectionCounters>,
}

#[derive(Debug, Default)]
struct ConnectionCounters {
    accepted: AtomicUsize,
    active: AtomicUsize,
}

impl PoolServer {
    /// Creates the server. Fails if the TLS files are missing.
    pub fn new(config: PoolServerConfig) -> Result<Self> {
        check_tls_files(&config.tls)?;
        Ok(Self {
            config,
            task: RoleTask::new(RoleKind::PoolServer),
            local_addr: OnceLock::new(),
            counters: Arc::new(ConnectionCounters::default()),
        })
    }

    /// Bound listen address, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Number of miner connections accepted so far
    pub fn connections(&self) -> usize {
        self.counters.accepted.load(Ordering::SeqCst)
    }

    /// Number of miner connections currently open
    pub fn active_connections(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }
}

/// Holds one miner connection open until the miner leaves or the server closes.
async fn serve_miner(
    mut stream: TcpStream,
    peer: SocketAddr,
    counters: Arc<ConnectionCounters>,
    mut close_rx: broadcast::Receiver<()>,
) {
    // Share submissions are consumed by the datastore-backed service; inbound
    // bytes are only drained here.
    let mut buf = [0u8; 1024];
    loop {
        tokio::select! {
            read = stream.read(&mut buf) => match read {
                Ok(0) => {
                    debug!(target: "poolnode::roles", %peer, "miner disconnected");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(target: "poolnode::roles", %peer, error = %e, "miner connection failed");
                    break;
                }
            },
            _ = close_rx.recv() => {
                if let Err(e) = stream.shutdown().await {
                    debug!(target: "poolnode::roles", %peer, error = %e, "miner connection already closed");
                }
                break;
            }
        }
    }
    counters.active.fetch_sub(1, Ordering::SeqCst);
}

async fn accept_loop(
    listener: TcpListener,
    counters: Arc<ConnectionCounters>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let (close_tx, _) = broadcast::channel(1);
    let mut miners = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    counters.accepted.fetch_add(1, Ordering::SeqCst);
                    counters.active.fetch_add(1, Ordering::SeqCst);
                    debug!(target: "poolnode::roles", %peer, "miner connected");
                    miners.spawn(serve_miner(stream, peer, counters.clone(), close_tx.subscribe()));
                }
                Err(e) => {
                    warn!(target: "poolnode::roles", error = %e, "failed to accept miner connection");
                }
            },
            Some(finished) = miners.join_next(), if !miners.is_empty() => {
                if let Err(e) = finished {
                    warn!(target: "poolnode::roles", error = %e, "miner connection task failed");
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }

    drop(listener);
    let _ = close_tx.send(());
    while let Some(finished) = miners.join_next().await {
        if let Err(e) = finished {
            warn!(target: "poolnode::roles", error = %e, "miner connection task failed");
        }
    }
    info!(target: "poolnode::roles", "pool server listener closed");
}

#[async_trait]
impl PoolRole for PoolServer {
    fn kind(&self) -> RoleKind {
        RoleKind::PoolServer
    }

    async fn start(&self) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.port))
            .await
            .map_err(|e| NodeError::Role {
                role: RoleKind::PoolServer,
                reason: format!("failed to bind port {}: {}", self.config.port, e),
            })?;
        let local_addr = listener.local_addr()?;
        let _ = self.local_addr.set(local_addr);

        let handle = tokio::spawn(accept_loop(
            listener,
            self.counters.clone(),
            self.task.subscribe(),
        ));
        self.task.attach(handle).await?;

        info!(
            target: "poolnode::roles",
            name = %self.config.name,
            pool_address = %self.config.pool_address,
            listen = %local_addr,
            datastore = %self.config.datastore.host,
            "pool server listening"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.task.stop().await?;
        info!(
            target: "poolnode::roles",
            connections = self.connections(),
            "pool server stopped"
        );
        Ok(())
    }
}

/// Follows the chain head until shutdown.
async fn follow_chain(kind: RoleKind, consensus: Arc<dyn Consensus>, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut head_rx = consensus.blockchain().subscribe_head();
    loop {
        tokio::select! {
            event = head_rx.recv() => match event {
                Ok(head) => {
                    debug!(
                        target: "poolnode::roles",
                        role = %kind,
                        height = head.height,
                        hash = %head.hash,
                        "processing new head"
                    );
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(target: "poolnode::roles", role = %kind, skipped, "head events lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    error!(target: "poolnode::roles", role = %kind, "head event channel closed");
                    break;
                }
            },
            _ = shutdown_rx.recv() => break,
        }
    }
}

/// Computes reward shares from the chain.
pub struct PoolService {
    config: PoolServiceConfig,
    consensus: Arc<dyn Consensus>,
    task: RoleTask,
}

impl PoolService {
    /// Creates the service.
    pub fn new(config: PoolServiceConfig, consensus: Arc<dyn Consensus>) -> Self {
        Self {
            config,
            consensus,
            task: RoleTask::new(RoleKind::PoolService),
        }
    }
}

#[async_trait]
impl PoolRole for PoolService {
    fn kind(&self) -> RoleKind {
        RoleKind::PoolService
    }

    async fn start(&self) -> Result<()> {
        let handle = tokio::spawn(follow_chain(
            RoleKind::PoolService,
            self.consensus.clone(),
            self.task.subscribe(),
        ));
        self.task.attach(handle).await?;
        info!(
            target: "poolnode::roles",
            pool_address = %self.config.pool_address,
            datastore = %self.config.datastore.host,
            "pool service started"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.task.stop().await?;
        info!(target: "poolnode::roles", "pool service stopped");
        Ok(())
    }
}

/// Disburses rewards from the node wallet.
pub struct PoolPayout {
    config: PoolPayoutConfig,
    ctx: RoleContext,
    task: RoleTask,
}

impl PoolPayout {
    /// Creates the payout role paying from `ctx.wallet`.
    pub fn new(config: PoolPayoutConfig, ctx: RoleContext) -> Self {
        Self {
            config,
            ctx,
            task: RoleTask::new(RoleKind::PoolPayout),
        }
    }
}

#[async_trait]
impl PoolRole for PoolPayout {
    fn kind(&self) -> RoleKind {
        RoleKind::PoolPayout
    }

    async fn start(&self) -> Result<()> {
        let handle = tokio::spawn(follow_chain(
            RoleKind::PoolPayout,
            self.ctx.consensus.clone(),
            self.task.subscribe(),
        ));
        self.task.attach(handle).await?;
        info!(
            target: "poolnode::roles",
            wallet = %self.ctx.wallet.address(),
            datastore = %self.config.datastore.host,
            "pool payout started"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.task.stop().await?;
        info!(target: "poolnode::roles", "pool payout stopped");
        Ok(())
    }
}

/// Builds the roles above.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRoleFactory;

#[async_trait]
impl RoleFactory for DefaultRoleFactory {
    async fn pool_server(&self, _ctx: &RoleContext, config: &PoolServerConfig) -> Result<Box<dyn PoolRole>> {
        Ok(Box::new(PoolServer::new(config.clone())?))
    }

    async fn pool_service(&self, ctx: &RoleContext, config: &PoolServiceConfig) -> Result<Box<dyn PoolRole>> {
        Ok(Box::new(PoolService::new(config.clone(), ctx.consensus.clone())))
    }

    async fn pool_payout(&self, ctx: &RoleContext, config: &PoolPayoutConfig) -> Result<Box<dyn PoolRole>> {
        Ok(Box::new(PoolPayout::new(config.clone(), ctx.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolnode_config::DatastoreConfig;
    use poolnode_core::{
        ConsensusType, GenesisConfig, KeyPair, LocalConsensus, NetworkConfig, TlsCredentials,
    };
    use poolnode_wallets::Wallet;
    use tempfile::TempDir;

    fn datastore() -> DatastoreConfig {
        DatastoreConfig {
            host: "localhost".to_string(),
            password: "secret".to_string(),
        }
    }

    fn server_config(tls: TlsCredentials) -> PoolServerConfig {
        PoolServerConfig {
            name: "Test Pool".to_string(),
            pool_address: KeyPair::generate().address(),
            port: 0,
            datastore: datastore(),
            tls,
        }
    }

    fn tls_files(dir: &TempDir) -> TlsCredentials {
        let key_path = dir.path().join("key.pem");
        let cert_path = dir.path().join("cert.pem");
        std::fs::write(&key_path, "key").unwrap();
        std::fs::write(&cert_path, "cert").unwrap();
        TlsCredentials {
            key_path,
            cert_path,
        }
    }

    fn local_consensus() -> Arc<LocalConsensus> {
        let genesis = GenesisConfig::for_profile("dev").unwrap();
        Arc::new(LocalConsensus::new(
            ConsensusType::Full,
            &NetworkConfig::dumb(KeyPair::generate()),
            &genesis,
        ))
    }

    async fn wait_for(condition: impl Fn() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_pool_server_requires_tls_files() {
        let config = server_config(TlsCredentials {
            key_path: "/nonexistent/key.pem".into(),
            cert_path: "/nonexistent/cert.pem".into(),
        });
        assert!(matches!(
            PoolServer::new(config),
            Err(NodeError::MissingTlsFile(_))
        ));
    }

    #[tokio::test]
    async fn test_pool_server_accepts_and_drains() {
        let dir = TempDir::new().unwrap();
        let server = PoolServer::new(server_config(tls_files(&dir))).unwrap();
        assert!(server.local_addr().is_none());

        server.start().await.unwrap();
        let port = server.local_addr().unwrap().port();
        let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

        wait_for(|| server.active_connections() == 1).await;
        assert_eq!(server.connections(), 1);

        server.stop().await.unwrap();
        let mut buf = [0u8; 8];
        let read = client.read(&mut buf).await.unwrap_or(0);
        assert_eq!(read, 0);
        assert_eq!(server.active_connections(), 0);

        // A second stop has nothing left to drain.
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_pool_server_releases_disconnected_miners() {
        let dir = TempDir::new().unwrap();
        let server = PoolServer::new(server_config(tls_files(&dir))).unwrap();
        server.start().await.unwrap();
        let port = server.local_addr().unwrap().port();

        for round in 1..=3 {
            let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
            client.write_all(b"hello").await.unwrap();
            wait_for(|| server.active_connections() == 1).await;
            drop(client);
            wait_for(|| server.active_connections() == 0).await;
            assert_eq!(server.connections(), round);
        }

        tokio::time::timeout(Duration::from_secs(5), server.stop())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_pool_server_cannot_start_twice() {
        let dir = TempDir::new().unwrap();
        let server = PoolServer::new(server_config(tls_files(&dir))).unwrap();
        server.start().await.unwrap();
        assert!(matches!(
            server.start().await,
            Err(NodeError::Role {
                role: RoleKind::PoolServer,
                ..
            })
        ));
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_chain_following_roles_stop_cleanly() {
        let consensus = local_consensus();
        let ctx = RoleContext {
            consensus: consensus.clone(),
            wallet: Wallet::generate(),
        };

        let roles: Vec<Box<dyn PoolRole>> = vec![
            DefaultRoleFactory
                .pool_service(
                    &ctx,
                    &PoolServiceConfig {
                        pool_address: KeyPair::generate().address(),
                        datastore: datastore(),
                    },
                )
                .await
                .unwrap(),
            DefaultRoleFactory
                .pool_payout(&ctx, &PoolPayoutConfig { datastore: datastore() })
                .await
                .unwrap(),
        ];

        for role in &roles {
            role.start().await.unwrap();
        }
        consensus.push_block(1);
        consensus.push_block(1);
        for role in &roles {
            role.stop().await.unwrap();
        }
        assert_eq!(roles[0].kind(), RoleKind::PoolService);
        assert_eq!(roles[1].kind(), RoleKind::PoolPayout);
    }
}
