//! Wallet stores.

use async_trait::async_trait;
use parking_lot::RwLock;
use poolnode_core::Address;
use std::collections::BTreeMap;
use tracing::info;

use crate::{Result, Wallet, WalletError};

/// Persistent mapping from address to wallet with one default address.
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Returns the default wallet, creating and persisting a random one when
    /// the store has no default yet.
    async fn get_default(&self) -> Result<Wallet>;

    /// Returns the current default address without creating one.
    async fn default_address(&self) -> Result<Option<Address>>;

    /// Looks up a wallet by address.
    async fn get(&self, address: &Address) -> Result<Option<Wallet>>;

    /// Stores a wallet, replacing any wallet with the same address.
    async fn put(&self, wallet: &Wallet) -> Result<()>;

    /// Points the default at a stored wallet.
    async fn set_default(&self, address: &Address) -> Result<()>;

    /// Addresses of all stored wallets.
    async fn list(&self) -> Result<Vec<Address>>;
}

/// Wallets plus the default pointer; the state behind every store.
#[derive(Debug, Default, Clone)]
pub(crate) struct WalletSet {
    pub(crate) wallets: BTreeMap<Address, Wallet>,
    pub(crate) default: Option<Address>,
}

impl WalletSet {
    /// Default wallet, if the pointer is set and resolves.
    pub(crate) fn default_wallet(&self) -> Option<Wallet> {
        self.default
            .and_then(|address| self.wallets.get(&address))
            .cloned()
    }

    /// Inserts a fresh random wallet and makes it the default.
    pub(crate) fn create_default(&mut self) -> Wallet {
        let wallet = Wallet::generate();
        info!(
            target: "poolnode::wallet",
            address = %wallet.address(),
            "created new default wallet"
        );
        self.wallets.insert(wallet.address(), wallet.clone());
        self.default = Some(wallet.address());
        wallet
    }

    pub(crate) fn set_default(&mut self, address: &Address) -> Result<()> {
        if !self.wallets.contains_key(address) {
            return Err(WalletError::WalletNotFound(*address));
        }
        self.default = Some(*address);
        Ok(())
    }
}

/// Non-persistent wallet store.
#[derive(Debug, Default)]
pub struct MemoryWalletStore {
    state: RwLock<WalletSet>,
}

impl MemoryWalletStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    async fn get_default(&self) -> Result<Wallet> {
        if let Some(wallet) = self.state.read().default_wallet() {
            return Ok(wallet);
        }
        let mut state = self.state.write();
        // Another caller may have created it between the two locks.
        match state.default_wallet() {
            Some(wallet) => Ok(wallet),
            None => Ok(state.create_default()),
        }
    }

    async fn default_address(&self) -> Result<Option<Address>> {
        Ok(self.state.read().default)
    }

    async fn get(&self, address: &Address) -> Result<Option<Wallet>> {
        Ok(self.state.read().wallets.get(address).cloned())
    }

    async fn put(&self, wallet: &Wallet) -> Result<()> {
        self.state
            .write()
            .wallets
            .insert(wallet.address(), wallet.clone());
        Ok(())
    }

    async fn set_default(&self, address: &Address) -> Result<()> {
        self.state.write().set_default(address)
    }

    async fn list(&self) -> Result<Vec<Address>> {
        Ok(self.state.read().wallets.keys().copied().collect())
    }
}
