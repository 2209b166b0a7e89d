//! Pool role dispatch.
//!
//! A node activates at most one pool role. Conflicting role flags never reach
//! this module because configuration validation rejects them. Every role can
//! be stopped, so a shutdown signal drains whichever role is active.

mod pool;

pub use pool::{DefaultRoleFactory, PoolPayout, PoolServer, PoolService};

use async_trait::async_trait;
use poolnode_config::{PoolPayoutConfig, PoolServerConfig, PoolServiceConfig, RoleConfig, RoleKind};
use poolnode_core::Consensus;
use poolnode_wallets::Wallet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::Result;

/// Lifecycle hooks of a pool role.
#[async_trait]
pub trait PoolRole: Send + Sync {
    /// Which role this is
    fn kind(&self) -> RoleKind;

    /// Starts serving.
    async fn start(&self) -> Result<()>;

    /// Stops serving and drains in-flight work.
    async fn stop(&self) -> Result<()>;
}

/// Node resources a role is built from.
#[derive(Clone)]
pub struct RoleContext {
    /// The node's consensus engine
    pub consensus: Arc<dyn Consensus>,
    /// The active wallet, used for signing payouts
    pub wallet: Wallet,
}

/// Builds pool roles.
#[async_trait]
pub trait RoleFactory: Send + Sync {
    /// Builds the pool server role.
    async fn pool_server(&self, ctx: &RoleContext, config: &PoolServerConfig) -> Result<Box<dyn PoolRole>>;

    /// Builds the pool service role.
    async fn pool_service(&self, ctx: &RoleContext, config: &PoolServiceConfig) -> Result<Box<dyn PoolRole>>;

    /// Builds the pool payout role.
    async fn pool_payout(&self, ctx: &RoleContext, config: &PoolPayoutConfig) -> Result<Box<dyn PoolRole>>;
}

/// The started role of this process. `stop` takes effect at most once.
pub struct ActiveRole {
    role: Box<dyn PoolRole>,
    stopped: AtomicBool,
}

impl ActiveRole {
    fn new(role: Box<dyn PoolRole>) -> Self {
        Self {
            role,
            stopped: AtomicBool::new(false),
        }
    }

    /// Which role is active
    pub fn kind(&self) -> RoleKind {
        self.role.kind()
    }

    /// Whether the role has been stopped
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Stops the role. Returns `false` if it was already stopped.
    pub async fn stop(&self) -> Result<bool> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            debug!(target: "poolnode::roles", role = %self.kind(), "role already stopped");
            return Ok(false);
        }
        info!(target: "poolnode::roles", role = %self.kind(), "stopping pool role");
        self.role.stop().await?;
        Ok(true)
    }
}

/// Builds and starts the configured role, if any.
pub async fn dispatch_role(
    config: Option<&RoleConfig>,
    ctx: &RoleContext,
    factory: &dyn RoleFactory,
) -> Result<Option<ActiveRole>> {
    let Some(config) = config else {
        info!(target: "poolnode::roles", "no pool role enabled");
        return Ok(None);
    };

    let role = match config {
        RoleConfig::PoolServer(server) => factory.pool_server(ctx, server).await?,
        RoleConfig::PoolService(service) => factory.pool_service(ctx, service).await?,
        RoleConfig::PoolPayout(payout) => factory.pool_payout(ctx, payout).await?,
    };
    role.start().await?;

    info!(target: "poolnode::roles", role = %role.kind(), "pool role started");
    Ok(Some(ActiveRole::new(role)))
}
