//! Pool role configuration.

use poolnode_core::{Address, TlsCredentials};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::{ConfigError, Result};

/// Default listen port of the pool server
pub const DEFAULT_POOL_SERVER_PORT: u16 = 8444;
/// Default datastore host
pub const DEFAULT_DATASTORE_HOST: &str = "localhost";

/// The three pool roles, in dispatch priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleKind {
    /// Accepts miner connections and share submissions
    PoolServer,
    /// Computes reward shares per account
    PoolService,
    /// Disburses accumulated rewards on-chain
    PoolPayout,
}

impl RoleKind {
    /// Configuration section name
    pub fn section(&self) -> &'static str {
        match self {
            RoleKind::PoolServer => "pool_server",
            RoleKind::PoolService => "pool_service",
            RoleKind::PoolPayout => "pool_payout",
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleKind::PoolServer => write!(f, "pool-server"),
            RoleKind::PoolService => write!(f, "pool-service"),
            RoleKind::PoolPayout => write!(f, "pool-payout"),
        }
    }
}

/// Credentials of the pool datastore.
#[derive(Clone, PartialEq, Eq)]
pub struct DatastoreConfig {
    /// Database host
    pub host: String,
    /// Database password
    pub password: String,
}

impl fmt::Debug for DatastoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatastoreConfig")
            .field("host", &self.host)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Validated pool server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolServerConfig {
    /// Display name announced to miners
    pub name: String,
    /// Address receiving block rewards
    pub pool_address: Address,
    /// Miner listen port
    pub port: u16,
    /// Datastore credentials
    pub datastore: DatastoreConfig,
    /// TLS key and certificate, checked to exist at startup. The miner
    /// listener itself speaks plain TCP; TLS is terminated in front of it.
    pub tls: TlsCredentials,
}

/// Validated pool service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolServiceConfig {
    /// Address receiving block rewards
    pub pool_address: Address,
    /// Datastore credentials
    pub datastore: DatastoreConfig,
}

/// Validated pool payout settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolPayoutConfig {
    /// Datastore credentials
    pub datastore: DatastoreConfig,
}

/// The single pool role a node activates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleConfig {
    /// Pool server role
    PoolServer(PoolServerConfig),
    /// Pool service role
    PoolService(PoolServiceConfig),
    /// Pool payout role
    PoolPayout(PoolPayoutConfig),
}

impl RoleConfig {
    /// Which role this is
    pub fn kind(&self) -> RoleKind {
        match self {
            RoleConfig::PoolServer(_) => RoleKind::PoolServer,
            RoleConfig::PoolService(_) => RoleKind::PoolService,
            RoleConfig::PoolPayout(_) => RoleKind::PoolPayout,
        }
    }
}

/// Datastore section as written in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawDatastore {
    /// Database host, [`DEFAULT_DATASTORE_HOST`] when unset
    pub host: Option<String>,
    /// Database password
    pub password: Option<String>,
}

impl RawDatastore {
    /// Validates the nested section, falling back to the flat `mySqlHost` /
    /// `mySqlPsw` keys of the role section.
    fn validate(
        &self,
        kind: RoleKind,
        flat_host: Option<&String>,
        flat_password: Option<&String>,
    ) -> Result<DatastoreConfig> {
        let password = self
            .password
            .as_ref()
            .or(flat_password)
            .cloned()
            .ok_or(ConfigError::MissingField {
                section: kind.section(),
                field: "datastore.password",
            })?;
        Ok(DatastoreConfig {
            host: self
                .host
                .as_ref()
                .or(flat_host)
                .cloned()
                .unwrap_or_else(|| DEFAULT_DATASTORE_HOST.to_string()),
            password,
        })
    }
}

/// `[pool_server]` as written in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawPoolServer {
    /// Activates the role
    pub enabled: bool,
    /// Display name announced to miners
    pub name: Option<String>,
    /// User-friendly reward address
    #[serde(alias = "poolAddress")]
    pub pool_address: Option<String>,
    /// Miner listen port
    pub port: u16,
    /// TLS private key file
    #[serde(alias = "sslKeyPath")]
    pub ssl_key_path: Option<PathBuf>,
    /// TLS certificate file
    #[serde(alias = "sslCertPath")]
    pub ssl_cert_path: Option<PathBuf>,
    /// Datastore credentials
    pub datastore: RawDatastore,
    /// Flat datastore host
    #[serde(rename = "mySqlHost", skip_serializing_if = "Option::is_none")]
    pub mysql_host: Option<String>,
    /// Flat datastore password
    #[serde(rename = "mySqlPsw", skip_serializing_if = "Option::is_none")]
    pub mysql_password: Option<String>,
}

impl Default for RawPoolServer {
    fn default() -> Self {
        Self {
            enabled: false,
            name: None,
            pool_address: None,
            port: DEFAULT_POOL_SERVER_PORT,
            ssl_key_path: None,
            ssl_cert_path: None,
            datastore: RawDatastore::default(),
            mysql_host: None,
            mysql_password: None,
        }
    }
}

impl RawPoolServer {
    pub(crate) fn validate(&self) -> Result<PoolServerConfig> {
        let kind = RoleKind::PoolServer;
        let name = self.name.clone().ok_or(ConfigError::MissingField {
            section: kind.section(),
            field: "name",
        })?;
        let tls = match (&self.ssl_key_path, &self.ssl_cert_path) {
            (Some(key_path), Some(cert_path)) => TlsCredentials {
                key_path: key_path.clone(),
                cert_path: cert_path.clone(),
            },
            (None, None) => {
                return Err(ConfigError::MissingField {
                    section: kind.section(),
                    field: "ssl_key_path",
                })
            }
            _ => return Err(ConfigError::InconsistentTls(kind.section())),
        };
        Ok(PoolServerConfig {
            name,
            pool_address: parse_pool_address(kind, self.pool_address.as_deref())?,
            port: self.port,
            datastore: self.datastore.validate(
                kind,
                self.mysql_host.as_ref(),
                self.mysql_password.as_ref(),
            )?,
            tls,
        })
    }
}

/// `[pool_service]` as written in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawPoolService {
    /// Activates the role
    pub enabled: bool,
    /// User-friendly reward address
    #[serde(alias = "poolAddress")]
    pub pool_address: Option<String>,
    /// Datastore credentials
    pub datastore: RawDatastore,
    /// Flat datastore host
    #[serde(rename = "mySqlHost", skip_serializing_if = "Option::is_none")]
    pub mysql_host: Option<String>,
    /// Flat datastore password
    #[serde(rename = "mySqlPsw", skip_serializing_if = "Option::is_none")]
    pub mysql_password: Option<String>,
}

impl RawPoolService {
    pub(crate) fn validate(&self) -> Result<PoolServiceConfig> {
        let kind = RoleKind::PoolService;
        Ok(PoolServiceConfig {
            pool_address: parse_pool_address(kind, self.pool_address.as_deref())?,
            datastore: self.datastore.validate(
                kind,
                self.mysql_host.as_ref(),
                self.mysql_password.as_ref(),
            )?,
        })
    }
}

/// `[pool_payout]` as written in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawPoolPayout {
    /// Activates the role
    pub enabled: bool,
    /// Datastore credentials
    pub datastore: RawDatastore,
    /// Flat datastore host
    #[serde(rename = "mySqlHost", skip_serializing_if = "Option::is_none")]
    pub mysql_host: Option<String>,
    /// Flat datastore password
    #[serde(rename = "mySqlPsw", skip_serializing_if = "Option::is_none")]
    pub mysql_password: Option<String>,
}

impl RawPoolPayout {
    pub(crate) fn validate(&self) -> Result<PoolPayoutConfig> {
        Ok(PoolPayoutConfig {
            datastore: self.datastore.validate(
                RoleKind::PoolPayout,
                self.mysql_host.as_ref(),
                self.mysql_password.as_ref(),
            )?,
        })
    }
}

fn parse_pool_address(kind: RoleKind, value: Option<&str>) -> Result<Address> {
    let value = value.ok_or(ConfigError::MissingField {
        section: kind.section(),
        field: "pool_address",
    })?;
    Address::from_user_friendly(value).map_err(|e| ConfigError::InvalidAddress {
        section: kind.section(),
        reason: e.to_string(),
    })
}
