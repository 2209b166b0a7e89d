//! Loading complete configuration documents.

use poolnode_config::{
    load, load_from_str, ConfigError, ConfigFormat, LogFormat, NetworkMode, RoleConfig, RoleKind,
};
use poolnode_core::{ConsensusType, KeyPair};
use std::io::Write;

#[test]
fn test_nano_node_without_roles() {
    let config = load_from_str(
        r#"
        network = "dev"
        type = "nano"
        dumb = true

        [wallet]

        [pool_server]
        enabled = false

        [pool_service]
        enabled = false

        [pool_payout]
        enabled = false
        "#,
        ConfigFormat::Toml,
    )
    .unwrap();

    assert_eq!(config.consensus, ConsensusType::Nano);
    assert_eq!(config.network, NetworkMode::Dumb);
    assert!(config.role.is_none());
    assert!(config.wallet_seed.is_none());
}

#[test]
fn test_pool_server_from_toml() {
    let pool_address = KeyPair::generate().address();
    let seed_key = KeyPair::generate().public_key();
    let document = format!(
        r#"
        network = "test"
        consensus = "light"
        host = "pool.example.com"
        port = 9000

        [tls]
        key = "/etc/pool/key.pem"
        cert = "/etc/pool/cert.pem"

        [[seed_peers]]
        host = "seed.example.com"
        port = 8443
        public_key = "{seed_key}"

        [log]
        level = "debug"
        format = "json"

        [pool_server]
        enabled = true
        name = "Example Pool"
        pool_address = "{pool_address}"
        port = 8444
        ssl_key_path = "/etc/pool/key.pem"
        ssl_cert_path = "/etc/pool/cert.pem"

        [pool_server.datastore]
        host = "db.internal"
        password = "secret"
        "#,
    );

    let config = load_from_str(&document, ConfigFormat::Toml).unwrap();
    assert_eq!(config.consensus, ConsensusType::Light);
    assert_eq!(config.profile, "test");
    assert_eq!(config.log.format, LogFormat::Json);
    assert_eq!(config.seed_peers[0].public_key, seed_key);
    assert!(matches!(
        config.network,
        NetworkMode::Ws { port: 9000, tls: Some(_), .. }
    ));

    match config.role {
        Some(RoleConfig::PoolServer(server)) => {
            assert_eq!(server.name, "Example Pool");
            assert_eq!(server.pool_address, pool_address);
            assert_eq!(server.datastore.host, "db.internal");
        }
        other => panic!("expected pool server, got {:?}", other),
    }
}

#[test]
fn test_pool_service_from_json_file() {
    let pool_address = KeyPair::generate().address();
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"{{
            "network": "dev",
            "type": "full",
            "dumb": true,
            "wallet": {{ "seed": "{}" }},
            "pool_service": {{
                "enabled": true,
                "pool_address": "{}",
                "datastore": {{ "password": "pw" }}
            }}
        }}"#,
        "07".repeat(32),
        pool_address
    )
    .unwrap();

    let config = load(file.path()).unwrap();
    assert_eq!(config.wallet_seed.as_deref(), Some("07".repeat(32).as_str()));
    assert_eq!(config.role.as_ref().map(RoleConfig::kind), Some(RoleKind::PoolService));
}

#[test]
fn test_two_enabled_roles_are_rejected_at_load_time() {
    let result = load_from_str(
        r#"
        dumb = true

        [pool_service]
        enabled = true

        [pool_payout]
        enabled = true
        "#,
        ConfigFormat::Toml,
    );
    match result {
        Err(err @ ConfigError::ConflictingRoles(_)) => {
            assert_eq!(
                err.to_string(),
                "Conflicting pool roles enabled: pool-service, pool-payout"
            );
        }
        other => panic!("expected conflicting roles, got {:?}", other),
    }
}

#[test]
fn test_invalid_pool_address() {
    let result = load_from_str(
        r#"
        dumb = true

        [pool_service]
        enabled = true
        pool_address = "NQ00 NOT AN ADDRESS"

        [pool_service.datastore]
        password = "pw"
        "#,
        ConfigFormat::Toml,
    );
    assert!(matches!(
        result,
        Err(ConfigError::InvalidAddress {
            section: "pool_service",
            ..
        })
    ));
}

#[test]
fn test_malformed_toml() {
    assert!(matches!(
        load_from_str("dumb = [", ConfigFormat::Toml),
        Err(ConfigError::Toml(_))
    ));
}

#[test]
fn test_camel_case_role_flags_conflict() {
    let pool_address = KeyPair::generate().address();
    let document = format!(
        r#"{{
            "network": "dev",
            "consensusType": "nano",
            "dumb": true,
            "seedPeers": [],
            "poolServer": {{
                "enabled": true,
                "name": "pool",
                "poolAddress": "{pool_address}",
                "sslKeyPath": "key.pem",
                "sslCertPath": "cert.pem",
                "mySqlPsw": "pw"
            }},
            "poolPayout": {{ "enabled": true, "mySqlPsw": "pw", "mySqlHost": "db" }}
        }}"#
    );

    match load_from_str(&document, ConfigFormat::Json) {
        Err(ConfigError::ConflictingRoles(roles)) => {
            assert_eq!(roles, vec![RoleKind::PoolServer, RoleKind::PoolPayout]);
        }
        other => panic!("expected conflicting roles, got {:?}", other),
    }
}

#[test]
fn test_misspelled_section_is_rejected() {
    let result = load_from_str(
        r#"
        dumb = true

        [pool_sever]
        enabled = true
        "#,
        ConfigFormat::Toml,
    );
    assert!(matches!(result, Err(ConfigError::Toml(_))));

    let result = load_from_str(
        r#"{ "dumb": true, "poolPayout": { "enabled": true, "mySqlPassword": "pw" } }"#,
        ConfigFormat::Json,
    );
    assert!(matches!(result, Err(ConfigError::Json(_))));
}
