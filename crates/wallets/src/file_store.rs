//! JSON file backed wallet store.
//!
//! The store keeps a single `wallets.json` document in its directory. Every
//! mutation rewrites the document through a temporary file followed by a
//! rename, so a crash never leaves a truncated file behind.

use async_trait::async_trait;
use poolnode_core::Address;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use crate::store::WalletSet;
use crate::{Result, Wallet, WalletError, WalletStore};

/// File name of the wallet document
pub const WALLET_FILE_NAME: &str = "wallets.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct WalletFile {
    default: Option<Address>,
    wallets: Vec<StoredWallet>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredWallet {
    address: Address,
    private_key: String,
}

/// Wallet store persisted as JSON in a directory.
pub struct FileWalletStore {
    path: PathBuf,
    state: Mutex<WalletSet>,
}

impl FileWalletStore {
    /// Opens the store in `dir`, creating the directory when missing.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(WALLET_FILE_NAME);

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => Self::decode(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => WalletSet::default(),
            Err(e) => return Err(e.into()),
        };

        debug!(
            target: "poolnode::wallet",
            path = %path.display(),
            wallets = state.wallets.len(),
            "opened wallet store"
        );

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Location of the wallet document
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode(bytes: &[u8]) -> Result<WalletSet> {
        let file: WalletFile = serde_json::from_slice(bytes)?;
        let mut set = WalletSet::default();
        for stored in file.wallets {
            let wallet = Wallet::load_plain(&stored.private_key)?;
            if wallet.address() != stored.address {
                return Err(WalletError::InvalidWalletFormat(format!(
                    "key does not match address {}",
                    stored.address
                )));
            }
            set.wallets.insert(wallet.address(), wallet);
        }
        if let Some(default) = file.default {
            if !set.wallets.contains_key(&default) {
                return Err(WalletError::InvalidWalletFormat(format!(
                    "default {} is not a stored wallet",
                    default
                )));
            }
            set.default = Some(default);
        }
        Ok(set)
    }

    async fn persist(&self, set: &WalletSet) -> Result<()> {
        let file = WalletFile {
            default: set.default,
            wallets: set
                .wallets
                .values()
                .map(|wallet| StoredWallet {
                    address: wallet.address(),
                    private_key: wallet.export_plain(),
                })
                .collect(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Applies `change` to a copy of the current set and swaps it in once it
    /// is on disk. A failed write leaves memory untouched.
    async fn commit<T>(
        &self,
        state: &mut WalletSet,
        change: impl FnOnce(&mut WalletSet) -> Result<T>,
    ) -> Result<T> {
        let mut next = state.clone();
        let out = change(&mut next)?;
        self.persist(&next).await?;
        *state = next;
        Ok(out)
    }
}

#[async_trait]
impl WalletStore for FileWalletStore {
    async fn get_default(&self) -> Result<Wallet> {
        let mut state = self.state.lock().await;
        if let Some(wallet) = state.default_wallet() {
            return Ok(wallet);
        }
        self.commit(&mut state, |set| Ok(set.create_default())).await
    }

    async fn default_address(&self) -> Result<Option<Address>> {
        Ok(self.state.lock().await.default)
    }

    async fn get(&self, address: &Address) -> Result<Option<Wallet>> {
        Ok(self.state.lock().await.wallets.get(address).cloned())
    }

    async fn put(&self, wallet: &Wallet) -> Result<()> {
        let mut state = self.state.lock().await;
        self.commit(&mut state, |set| {
            set.wallets.insert(wallet.address(), wallet.clone());
            Ok(())
        })
        .await
    }

    async fn set_default(&self, address: &Address) -> Result<()> {
        let mut state = self.state.lock().await;
        self.commit(&mut state, |set| set.set_default(address)).await
    }

    async fn list(&self) -> Result<Vec<Address>> {
        Ok(self.state.lock().await.wallets.keys().copied().collect())
    }
}
