//! Poolnode Configuration Module
//!
//! Configuration is read once at startup, either as TOML or as JSON, into a
//! [`RawNodeConfig`] that mirrors the file. [`RawNodeConfig::validate`] turns
//! it into a [`NodeConfig`] built from closed enums: an unknown consensus type,
//! an unknown genesis profile or more than one enabled pool role is rejected
//! before any node resource exists.

#![warn(missing_docs)]

pub mod loader;
pub mod roles;

pub use loader::{load, load_from_str, ConfigFormat};
pub use roles::{
    DatastoreConfig, PoolPayoutConfig, PoolServerConfig, PoolServiceConfig, RawDatastore,
    RawPoolPayout, RawPoolServer, RawPoolService, RoleConfig, RoleKind, DEFAULT_DATASTORE_HOST,
    DEFAULT_POOL_SERVER_PORT,
};

use poolnode_core::{ConsensusType, GenesisConfig, PublicKey, SeedPeer, TlsCredentials};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Default websocket port
pub const DEFAULT_PORT: u16 = 8443;
/// Default genesis profile
pub const DEFAULT_NETWORK: &str = "main";
/// Default consensus mode
pub const DEFAULT_CONSENSUS: &str = "full";
/// Default data directory
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration errors. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File that was being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML, including unknown keys
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed JSON, including unknown keys
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Consensus mode other than full, light or nano
    #[error("Unknown consensus type: {0} (expected full, light or nano)")]
    UnknownConsensusType(String),

    /// No genesis profile with this name
    #[error("Unknown network profile: {0}")]
    UnknownNetwork(String),

    /// More than one pool role is enabled; lists them in priority order
    #[error("Conflicting pool roles enabled: {}", join_roles(.0))]
    ConflictingRoles(Vec<RoleKind>),

    /// A field required by an enabled section is absent
    #[error("Missing field `{field}` in [{section}]")]
    MissingField {
        /// Section name
        section: &'static str,
        /// Field name within the section
        field: &'static str,
    },

    /// Only one of the key and certificate paths is set
    #[error("TLS in [{0}] needs both a key and a certificate path")]
    InconsistentTls(&'static str),

    /// A seed peer entry is unusable
    #[error("Invalid seed peer #{index}: {reason}")]
    InvalidSeedPeer {
        /// Position in `seed_peers`
        index: usize,
        /// What is wrong with it
        reason: String,
    },

    /// A pool address is not a valid user-friendly address
    #[error("Invalid address in [{section}]: {reason}")]
    InvalidAddress {
        /// Section holding the address
        section: &'static str,
        /// Parse failure
        reason: String,
    },

    /// The wallet seed is not 64 hex characters
    #[error("Invalid wallet seed: {0}")]
    InvalidWalletSeed(String),
}

fn join_roles(roles: &[RoleKind]) -> String {
    roles
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// `[log]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// `[[seed_peers]]` entry as written in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSeedPeer {
    /// Host name or IP
    pub host: String,
    /// Websocket port
    pub port: u16,
    /// Hex encoded ed25519 public key
    #[serde(alias = "publicKey")]
    pub public_key: String,
}

/// `[tls]` section as written in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawTls {
    /// Private key file
    pub key: Option<PathBuf>,
    /// Certificate chain file
    pub cert: Option<PathBuf>,
}

/// `[wallet]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawWallet {
    /// Hex encoded plain private key
    pub seed: Option<String>,
}

/// Configuration as written in the file, before validation.
///
/// Keys are snake_case. The camelCase spellings used by older node configs
/// are accepted as aliases, and any other key is an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawNodeConfig {
    /// Genesis profile name
    pub network: String,
    /// Consensus mode: full, light or nano
    #[serde(alias = "type", alias = "consensus_type", alias = "consensusType")]
    pub consensus: String,
    /// Bootstrap peers appended to the profile's list
    #[serde(alias = "seedPeers")]
    pub seed_peers: Vec<RawSeedPeer>,
    /// Run without a reachable address
    pub dumb: bool,
    /// Public host name, required unless `dumb`
    pub host: Option<String>,
    /// Websocket listen port
    pub port: u16,
    /// Websocket TLS material
    pub tls: Option<RawTls>,
    /// Directory of the wallet store and peer key
    #[serde(alias = "dataDir")]
    pub data_dir: PathBuf,
    /// Wallet settings
    pub wallet: RawWallet,
    /// Logging settings
    pub log: LogConfig,
    /// Pool server role
    #[serde(alias = "poolServer")]
    pub pool_server: RawPoolServer,
    /// Pool service role
    #[serde(alias = "poolService")]
    pub pool_service: RawPoolService,
    /// Pool payout role
    #[serde(alias = "poolPayout")]
    pub pool_payout: RawPoolPayout,
}

impl Default for RawNodeConfig {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK.to_string(),
            consensus: DEFAULT_CONSENSUS.to_string(),
            seed_peers: Vec::new(),
            dumb: false,
            host: None,
            port: DEFAULT_PORT,
            tls: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            wallet: RawWallet::default(),
            log: LogConfig::default(),
            pool_server: RawPoolServer::default(),
            pool_service: RawPoolService::default(),
            pool_payout: RawPoolPayout::default(),
        }
    }
}

/// How the node presents itself on the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkMode {
    /// No reachable address
    Dumb,
    /// Websocket listener
    Ws {
        /// Public host name
        host: String,
        /// Listen port
        port: u16,
        /// TLS material, or `None` for plain websockets
        tls: Option<TlsCredentials>,
    },
}

/// Validated node configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Genesis profile name
    pub profile: String,
    /// Consensus mode
    pub consensus: ConsensusType,
    /// Bootstrap peers appended to the profile's list
    pub seed_peers: Vec<SeedPeer>,
    /// Network presentation
    pub network: NetworkMode,
    /// Directory of the wallet store
    pub data_dir: PathBuf,
    /// Plain private key the default wallet is derived from
    pub wallet_seed: Option<String>,
    /// Logging settings
    pub log: LogConfig,
    /// The activated pool role, if any
    pub role: Option<RoleConfig>,
}

impl fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConfig")
            .field("profile", &self.profile)
            .field("consensus", &self.consensus)
            .field("seed_peers", &self.seed_peers)
            .field("network", &self.network)
            .field("data_dir", &self.data_dir)
            .field("wallet_seed", &self.wallet_seed.as_ref().map(|_| "<redacted>"))
            .field("log", &self.log)
            .field("role", &self.role)
            .finish()
    }
}

impl RawNodeConfig {
    /// Validates the raw configuration.
    pub fn validate(&self) -> Result<NodeConfig> {
        let consensus = self
            .consensus
            .parse::<ConsensusType>()
            .map_err(|_| ConfigError::UnknownConsensusType(self.consensus.clone()))?;

        if !GenesisConfig::is_known_profile(&self.network) {
            return Err(ConfigError::UnknownNetwork(self.network.clone()));
        }

        let role = self.validate_role()?;

        let seed_peers = self
            .seed_peers
            .iter()
            .enumerate()
            .map(|(index, peer)| {
                let public_key = peer.public_key.parse::<PublicKey>().map_err(|e| {
                    ConfigError::InvalidSeedPeer {
                        index,
                        reason: e.to_string(),
                    }
                })?;
                if peer.host.is_empty() {
                    return Err(ConfigError::InvalidSeedPeer {
                        index,
                        reason: "empty host".to_string(),
                    });
                }
                Ok(SeedPeer {
                    host: peer.host.clone(),
                    port: peer.port,
                    public_key,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let network = if self.dumb {
            NetworkMode::Dumb
        } else {
            let host = self.host.clone().ok_or(ConfigError::MissingField {
                section: "node",
                field: "host",
            })?;
            let tls = match &self.tls {
                None => None,
                Some(RawTls {
                    key: Some(key),
                    cert: Some(cert),
                }) => Some(TlsCredentials {
                    key_path: key.clone(),
                    cert_path: cert.clone(),
                }),
                Some(RawTls {
                    key: None,
                    cert: None,
                }) => None,
                Some(_) => return Err(ConfigError::InconsistentTls("tls")),
            };
            NetworkMode::Ws {
                host,
                port: self.port,
                tls,
            }
        };

        let wallet_seed = match &self.wallet.seed {
            Some(seed) if seed.trim().is_empty() => None,
            Some(seed) => {
                let trimmed = seed.trim();
                if trimmed.len() != 64 || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(ConfigError::InvalidWalletSeed(
                        "expected 64 hex characters".to_string(),
                    ));
                }
                Some(trimmed.to_string())
            }
            None => None,
        };

        Ok(NodeConfig {
            profile: self.network.clone(),
            consensus,
            seed_peers,
            network,
            data_dir: self.data_dir.clone(),
            wallet_seed,
            log: self.log.clone(),
            role,
        })
    }

    fn validate_role(&self) -> Result<Option<RoleConfig>> {
        let enabled: Vec<RoleKind> = [
            (RoleKind::PoolServer, self.pool_server.enabled),
            (RoleKind::PoolService, self.pool_service.enabled),
            (RoleKind::PoolPayout, self.pool_payout.enabled),
        ]
        .into_iter()
        .filter_map(|(kind, enabled)| enabled.then_some(kind))
        .collect();

        match enabled.as_slice() {
            [] => Ok(None),
            [RoleKind::PoolServer] => Ok(Some(RoleConfig::PoolServer(self.pool_server.validate()?))),
            [RoleKind::PoolService] => {
                Ok(Some(RoleConfig::PoolService(self.pool_service.validate()?)))
            }
            [RoleKind::PoolPayout] => Ok(Some(RoleConfig::PoolPayout(self.pool_payout.validate()?))),
            _ => Err(ConfigError::ConflictingRoles(enabled)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolnode_core::KeyPair;
    use serde_json::json;

    fn dumb_config() -> RawNodeConfig {
        RawNodeConfig {
            dumb: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_validate_when_dumb() {
        let config = dumb_config().validate().unwrap();
        assert_eq!(config.consensus, ConsensusType::Full);
        assert_eq!(config.profile, "main");
        assert_eq!(config.network, NetworkMode::Dumb);
        assert!(config.role.is_none());
        assert!(config.wallet_seed.is_none());
    }

    #[test]
    fn test_unknown_consensus_type() {
        let raw = RawNodeConfig {
            consensus: "pico".to_string(),
            ..dumb_config()
        };
        assert!(matches!(
            raw.validate(),
            Err(ConfigError::UnknownConsensusType(t)) if t == "pico"
        ));
    }

    #[test]
    fn test_unknown_network() {
        let raw = RawNodeConfig {
            network: "moon".to_string(),
            ..dumb_config()
        };
        assert!(matches!(raw.validate(), Err(ConfigError::UnknownNetwork(_))));
    }

    #[test]
    fn test_host_required_unless_dumb() {
        let raw = RawNodeConfig::default();
        assert!(matches!(
            raw.validate(),
            Err(ConfigError::MissingField { field: "host", .. })
        ));

        let raw = RawNodeConfig {
            host: Some("node.example.com".to_string()),
            ..Default::default()
        };
        let config = raw.validate().unwrap();
        assert_eq!(
            config.network,
            NetworkMode::Ws {
                host: "node.example.com".to_string(),
                port: DEFAULT_PORT,
                tls: None
            }
        );
    }

    #[test]
    fn test_half_configured_tls_is_rejected() {
        let raw = RawNodeConfig {
            host: Some("node.example.com".to_string()),
            tls: Some(RawTls {
                key: Some("key.pem".into()),
                cert: None,
            }),
            ..Default::default()
        };
        assert!(matches!(
            raw.validate(),
            Err(ConfigError::InconsistentTls("tls"))
        ));
    }

    #[test]
    fn test_seed_peer_public_key_is_checked() {
        let mut raw = dumb_config();
        raw.seed_peers.push(RawSeedPeer {
            host: "seed.example.com".to_string(),
            port: 8443,
            public_key: KeyPair::generate().public_key().to_hex(),
        });
        raw.seed_peers.push(RawSeedPeer {
            host: "seed2.example.com".to_string(),
            port: 8443,
            public_key: "beef".to_string(),
        });
        assert!(matches!(
            raw.validate(),
            Err(ConfigError::InvalidSeedPeer { index: 1, .. })
        ));

        raw.seed_peers.pop();
        assert_eq!(raw.validate().unwrap().seed_peers.len(), 1);
    }

    #[test]
    fn test_wallet_seed_format() {
        let mut raw = dumb_config();
        raw.wallet.seed = Some("abc".to_string());
        assert!(matches!(
            raw.validate(),
            Err(ConfigError::InvalidWalletSeed(_))
        ));

        raw.wallet.seed = Some("11".repeat(32));
        assert_eq!(raw.validate().unwrap().wallet_seed, Some("11".repeat(32)));

        raw.wallet.seed = Some(String::new());
        assert_eq!(raw.validate().unwrap().wallet_seed, None);
    }

    #[test]
    fn test_conflicting_roles_are_rejected() {
        let mut raw = dumb_config();
        raw.pool_server.enabled = true;
        raw.pool_payout.enabled = true;
        match raw.validate() {
            Err(ConfigError::ConflictingRoles(roles)) => {
                assert_eq!(roles, vec![RoleKind::PoolServer, RoleKind::PoolPayout]);
            }
            other => panic!("expected conflicting roles, got {:?}", other),
        }
    }

    #[test]
    fn test_payout_role_requires_datastore_password() {
        let mut raw = dumb_config();
        raw.pool_payout.enabled = true;
        assert!(matches!(
            raw.validate(),
            Err(ConfigError::MissingField {
                section: "pool_payout",
                ..
            })
        ));

        raw.pool_payout.datastore.password = Some("secret".to_string());
        let config = raw.validate().unwrap();
        match config.role {
            Some(RoleConfig::PoolPayout(payout)) => {
                assert_eq!(payout.datastore.host, DEFAULT_DATASTORE_HOST);
                assert_eq!(payout.datastore.password, "secret");
            }
            other => panic!("expected payout role, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut raw = dumb_config();
        raw.wallet.seed = Some("ab".repeat(32));
        raw.pool_payout.enabled = true;
        raw.pool_payout.datastore.password = Some("hunter2".to_string());
        let debug = format!("{:?}", raw.validate().unwrap());
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains(&"ab".repeat(32)));
    }

    #[test]
    fn test_camel_case_keys_are_accepted() {
        let pool_address = KeyPair::generate().address().to_user_friendly();
        let raw: RawNodeConfig = serde_json::from_value(json!({
            "network": "dev",
            "consensusType": "light",
            "dumb": true,
            "dataDir": "/var/lib/poolnode",
            "poolService": {
                "enabled": true,
                "poolAddress": pool_address,
                "mySqlHost": "db.internal",
                "mySqlPsw": "secret"
            }
        }))
        .unwrap();

        let config = raw.validate().unwrap();
        assert_eq!(config.consensus, ConsensusType::Light);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/poolnode"));
        match config.role {
            Some(RoleConfig::PoolService(service)) => {
                assert_eq!(service.datastore.host, "db.internal");
                assert_eq!(service.datastore.password, "secret");
            }
            other => panic!("expected pool service, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let unknown_root = serde_json::from_value::<RawNodeConfig>(json!({ "poolServr": {} }));
        assert!(unknown_root.is_err());

        let unknown_in_role = serde_json::from_value::<RawNodeConfig>(json!({
            "pool_payout": { "enabled": true, "payoutInterval": 10 }
        }));
        assert!(unknown_in_role.is_err());
    }
}
