//! Genesis profile and network identity.
//!
//! The peer key is persisted in the data directory so the node keeps the same
//! peer address and public key across restarts.

use poolnode_config::{NetworkMode, NodeConfig};
use poolnode_core::{GenesisConfig, KeyPair, NetworkConfig, TlsCredentials};
use std::path::Path;
use tracing::{debug, info};

use crate::{NodeError, Result};

/// File holding the hex encoded peer private key
pub const PEER_KEY_FILE: &str = "peer_key";

/// Selects the genesis profile and appends the configured seed peers.
pub fn init_genesis(config: &NodeConfig) -> Result<GenesisConfig> {
    let mut genesis = GenesisConfig::for_profile(&config.profile)?;
    for peer in &config.seed_peers {
        genesis.add_seed_peer(peer.clone());
    }
    debug!(
        target: "poolnode::identity",
        profile = genesis.name(),
        network_id = genesis.network_id(),
        seed_peers = genesis.seed_peers().len(),
        "genesis profile initialized"
    );
    Ok(genesis)
}

/// Loads the peer key from `data_dir`, generating and persisting one on first run.
pub async fn load_or_create_peer_key(data_dir: &Path) -> Result<KeyPair> {
    let path = data_dir.join(PEER_KEY_FILE);
    match tokio::fs::read_to_string(&path).await {
        Ok(contents) => KeyPair::from_hex(&contents).map_err(|e| NodeError::InvalidPeerKey {
            path: path.clone(),
            reason: e.to_string(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::create_dir_all(data_dir).await?;
            let key_pair = KeyPair::generate();
            tokio::fs::write(&path, hex::encode(key_pair.private_key())).await?;
            info!(
                target: "poolnode::identity",
                path = %path.display(),
                "generated new peer key"
            );
            Ok(key_pair)
        }
        Err(e) => Err(e.into()),
    }
}

/// Builds the network configuration for `mode`, checking that TLS files exist.
pub fn build_network_config(mode: &NetworkMode, key_pair: KeyPair) -> Result<NetworkConfig> {
    match mode {
        NetworkMode::Dumb => Ok(NetworkConfig::dumb(key_pair)),
        NetworkMode::Ws { host, port, tls } => {
            if let Some(tls) = tls {
                check_tls_files(tls)?;
            }
            Ok(NetworkConfig::ws(host.clone(), *port, tls.clone(), key_pair))
        }
    }
}

/// Fails unless both TLS files exist.
pub fn check_tls_files(tls: &TlsCredentials) -> Result<()> {
    for path in [&tls.key_path, &tls.cert_path] {
        if !path.is_file() {
            return Err(NodeError::MissingTlsFile(path.clone()));
        }
    }
    Ok(())
}

/// Builds the node's network identity and logs it.
pub async fn build_identity(config: &NodeConfig) -> Result<NetworkConfig> {
    let key_pair = load_or_create_peer_key(&config.data_dir).await?;
    let network_config = build_network_config(&config.network, key_pair)?;

    info!(
        target: "poolnode::identity",
        peer_address = %network_config.peer_address(),
        public_key = %network_config.public_key(),
        "network identity ready"
    );
    Ok(network_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolnode_config::RawNodeConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_peer_key_is_stable() {
        let dir = TempDir::new().unwrap();
        let first = load_or_create_peer_key(dir.path()).await.unwrap();
        let second = load_or_create_peer_key(dir.path()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_corrupt_peer_key_is_fatal() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(PEER_KEY_FILE), "nope").unwrap();
        assert!(matches!(
            load_or_create_peer_key(dir.path()).await,
            Err(NodeError::InvalidPeerKey { .. })
        ));
    }

    #[test]
    fn test_missing_tls_files_are_fatal() {
        let mode = NetworkMode::Ws {
            host: "node.example.com".to_string(),
            port: 8443,
            tls: Some(TlsCredentials {
                key_path: "/nonexistent/key.pem".into(),
                cert_path: "/nonexistent/cert.pem".into(),
            }),
        };
        assert!(matches!(
            build_network_config(&mode, KeyPair::generate()),
            Err(NodeError::MissingTlsFile(_))
        ));
    }

    #[test]
    fn test_existing_tls_files_are_accepted() {
        let dir = TempDir::new().unwrap();
        let key_path = dir.path().join("key.pem");
        let cert_path = dir.path().join("cert.pem");
        std::fs::write(&key_path, "key").unwrap();
        std::fs::write(&cert_path, "cert").unwrap();

        let mode = NetworkMode::Ws {
            host: "node.example.com".to_string(),
            port: 8443,
            tls: Some(TlsCredentials {
                key_path,
                cert_path,
            }),
        };
        let config = build_network_config(&mode, KeyPair::generate()).unwrap();
        assert_eq!(
            config.peer_address().to_string(),
            "wss://node.example.com:8443/"
        );
    }

    #[tokio::test]
    async fn test_build_identity_binds_persisted_key() {
        let dir = TempDir::new().unwrap();
        let mut config = RawNodeConfig {
            dumb: true,
            ..Default::default()
        }
        .validate()
        .unwrap();
        config.data_dir = dir.path().to_path_buf();

        let identity = build_identity(&config).await.unwrap();
        assert!(identity.is_dumb());
        let key = load_or_create_peer_key(dir.path()).await.unwrap();
        assert_eq!(identity.public_key(), key.public_key());
    }

    #[test]
    fn test_init_genesis_appends_seed_peers() {
        let mut raw = RawNodeConfig {
            dumb: true,
            network: "test".to_string(),
            ..Default::default()
        };
        raw.seed_peers.push(poolnode_config::RawSeedPeer {
            host: "seed.example.com".to_string(),
            port: 8443,
            public_key: KeyPair::generate().public_key().to_hex(),
        });
        let genesis = init_genesis(&raw.validate().unwrap()).unwrap();
        assert_eq!(genesis.name(), "test");
        assert_eq!(genesis.seed_peers().len(), 1);
    }
}
