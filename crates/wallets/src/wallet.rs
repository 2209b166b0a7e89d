use poolnode_core::{Address, KeyPair, PublicKey};

use crate::{Result, WalletError};

/// A key pair and the address it controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    key_pair: KeyPair,
    address: Address,
}

impl Wallet {
    /// Creates a wallet with a fresh random key.
    pub fn generate() -> Self {
        Self::from_key_pair(KeyPair::generate())
    }

    /// Wraps an existing key pair.
    pub fn from_key_pair(key_pair: KeyPair) -> Self {
        let address = key_pair.address();
        Self { key_pair, address }
    }

    /// Loads a wallet from a plain (unencrypted) hex encoded private key.
    ///
    /// The same seed always yields the same wallet.
    pub fn load_plain(seed: &str) -> Result<Self> {
        KeyPair::from_hex(seed)
            .map(Self::from_key_pair)
            .map_err(|e| WalletError::InvalidSeed(e.to_string()))
    }

    /// Plain hex encoding of the private key, the inverse of [`Wallet::load_plain`].
    pub fn export_plain(&self) -> String {
        hex::encode(self.key_pair.private_key())
    }

    /// Account address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Signing key pair
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Public key
    pub fn public_key(&self) -> PublicKey {
        self.key_pair.public_key()
    }
}
