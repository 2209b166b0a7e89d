use std::path::PathBuf;

use crate::{KeyPair, PeerAddress, PublicKey};

/// Paths to the TLS key and certificate a websocket node serves with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsCredentials {
    /// Private key (PEM)
    pub key_path: PathBuf,
    /// Certificate chain (PEM)
    pub cert_path: PathBuf,
}

/// Network configuration a consensus engine is bound to.
#[derive(Debug, Clone)]
pub enum NetworkConfig {
    /// No reachable address; the node only dials out
    Dumb {
        /// Node identity
        key_pair: KeyPair,
    },
    /// Websocket listener on `host:port`
    Ws {
        /// Public host name
        host: String,
        /// Listen port
        port: u16,
        /// TLS material; `None` serves plain websockets
        tls: Option<TlsCredentials>,
        /// Node identity
        key_pair: KeyPair,
    },
}

impl NetworkConfig {
    /// No-network identity configuration.
    pub fn dumb(key_pair: KeyPair) -> Self {
        NetworkConfig::Dumb { key_pair }
    }

    /// Websocket configuration.
    pub fn ws(host: impl Into<String>, port: u16, tls: Option<TlsCredentials>, key_pair: KeyPair) -> Self {
        NetworkConfig::Ws {
            host: host.into(),
            port,
            tls,
            key_pair,
        }
    }

    /// Node identity key pair.
    pub fn key_pair(&self) -> &KeyPair {
        match self {
            NetworkConfig::Dumb { key_pair } | NetworkConfig::Ws { key_pair, .. } => key_pair,
        }
    }

    /// Node identity public key.
    pub fn public_key(&self) -> PublicKey {
        self.key_pair().public_key()
    }

    /// Address other peers see for this node.
    pub fn peer_address(&self) -> PeerAddress {
        match self {
            NetworkConfig::Dumb { key_pair } => PeerAddress::Dumb {
                public_key: key_pair.public_key(),
            },
            NetworkConfig::Ws {
                host,
                port,
                tls,
                key_pair,
            } => PeerAddress::Ws {
                host: host.clone(),
                port: *port,
                secure: tls.is_some(),
                public_key: key_pair.public_key(),
            },
        }
    }

    /// Whether this is the no-network variant.
    pub fn is_dumb(&self) -> bool {
        matches!(self, NetworkConfig::Dumb { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_address_carries_identity() {
        let key_pair = KeyPair::generate();
        let dumb = NetworkConfig::dumb(key_pair.clone());
        assert!(dumb.is_dumb());
        assert_eq!(dumb.peer_address().public_key(), &key_pair.public_key());

        let ws = NetworkConfig::ws("node.example.com", 8443, None, key_pair.clone());
        assert_eq!(ws.peer_address().to_string(), "ws://node.example.com:8443/");

        let tls = TlsCredentials {
            key_path: "key.pem".into(),
            cert_path: "cert.pem".into(),
        };
        let wss = NetworkConfig::ws("node.example.com", 8443, Some(tls), key_pair);
        assert_eq!(wss.peer_address().to_string(), "wss://node.example.com:8443/");
    }
}
