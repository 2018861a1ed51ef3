//! Tests for configuration validation

use std::collections::HashMap;

use prometheus_ftp_master::config::{AccessOptions, MasterConfig, PoolConfig, SecureMode};

#[test]
fn test_pool_config_defaults() {
    let cfg = PoolConfig::new(AccessOptions::new("ftp.example.com"));
    assert_eq!(cfg.max_connections, 1);
    assert!(cfg.auto_reconnect);
    assert_eq!(cfg.access.port, 21);
    assert_eq!(cfg.access.user, "anonymous");
    assert_eq!(cfg.access.secure, SecureMode::Plain);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_pool_config_invalid_max_connections() {
    let mut invalid = PoolConfig::new(AccessOptions::new("ftp.example.com"));
    invalid.max_connections = 0;
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_invalid_host() {
    let invalid = PoolConfig::new(AccessOptions::new("  "));
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_from_json() {
    let cfg = PoolConfig::from_json_str(
        r#"{
            "access": {"host": "ftp.example.com", "user": "alice", "password": "secret", "secure": "explicit"},
            "max_connections": 4,
            "auto_reconnect": false
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.max_connections, 4);
    assert!(!cfg.auto_reconnect);
    assert_eq!(cfg.access.secure, SecureMode::Explicit);
    assert_eq!(cfg.access.port, 21);
}

#[test]
fn test_pool_config_from_json_rejects_invalid() {
    let result = PoolConfig::from_json_str(
        r#"{"access": {"host": "ftp.example.com"}, "max_connections": 0}"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_password_is_redacted_in_debug() {
    let access = AccessOptions::new("ftp.example.com").with_credentials("alice", "hunter2");
    let debug = format!("{access:?}");
    assert!(debug.contains("alice"));
    assert!(!debug.contains("hunter2"));
}

#[test]
fn test_master_config_validation() {
    let mut servers = HashMap::new();
    servers.insert(
        "mirror".to_string(),
        PoolConfig::new(AccessOptions::new("mirror.example.com")),
    );
    let cfg = MasterConfig { servers };
    assert!(cfg.validate().is_ok());

    let empty = MasterConfig {
        servers: HashMap::new(),
    };
    assert!(empty.validate().is_err());
}
