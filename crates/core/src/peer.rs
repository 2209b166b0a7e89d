use serde::{Deserialize, Serialize};
use std::fmt;

use crate::PublicKey;

/// A bootstrap peer descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPeer {
    /// Host name or IP address
    pub host: String,
    /// Websocket port
    pub port: u16,
    /// Public key the peer must present
    pub public_key: PublicKey,
}

/// The address under which a peer can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeerAddress {
    /// A peer without a reachable address
    Dumb {
        /// Identity key of the peer
        public_key: PublicKey,
    },
    /// A websocket peer
    Ws {
        /// Host name or IP address
        host: String,
        /// Websocket port
        port: u16,
        /// Whether the peer speaks TLS
        secure: bool,
        /// Identity key of the peer
        public_key: PublicKey,
    },
}

impl PeerAddress {
    /// Address of a configured seed peer. Seed peers are always reached over TLS.
    pub fn seed(peer: &SeedPeer) -> Self {
        PeerAddress::Ws {
            host: peer.host.clone(),
            port: peer.port,
            secure: true,
            public_key: peer.public_key,
        }
    }

    /// Identity key of the peer.
    pub fn public_key(&self) -> &PublicKey {
        match self {
            PeerAddress::Dumb { public_key } | PeerAddress::Ws { public_key, .. } => public_key,
        }
    }

    /// Whether other peers can dial this address.
    pub fn is_reachable(&self) -> bool {
        matches!(self, PeerAddress::Ws { .. })
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerAddress::Dumb { public_key } => {
                write!(f, "dumb:///{}", &public_key.to_hex()[..16])
            }
            PeerAddress::Ws {
                host, port, secure, ..
            } => {
                let scheme = if *secure { "wss" } else { "ws" };
                write!(f, "{}://{}:{}/", scheme, host, port)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyPair;

    #[test]
    fn test_display() {
        let public_key = KeyPair::generate().public_key();
        let dumb = PeerAddress::Dumb { public_key };
        assert!(dumb.to_string().starts_with("dumb:///"));
        assert!(!dumb.is_reachable());

        let seed = PeerAddress::seed(&SeedPeer {
            host: "seed.example.com".to_string(),
            port: 8443,
            public_key,
        });
        assert_eq!(seed.to_string(), "wss://seed.example.com:8443/");
        assert!(seed.is_reachable());
        assert_eq!(seed.public_key(), &public_key);
    }
}
