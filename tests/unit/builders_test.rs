//! Tests for builder modules

use prometheus_ftp_master::builders::{build_master, build_masters};
use prometheus_ftp_master::config::{AccessOptions, MasterConfig, PoolConfig};
use prometheus_ftp_master::core::{FtpMaster, PoolError};
use prometheus_ftp_master::infra::{MemoryConnection, MemoryConnectionFactory};
use prometheus_ftp_master::runtime::TokioSpawner;

#[tokio::test]
async fn test_build_master_from_config() {
    let mut cfg = PoolConfig::new(AccessOptions::new("ftp.example.com"));
    cfg.max_connections = 3;
    cfg.auto_reconnect = false;

    let factory = MemoryConnectionFactory::new();
    let master: FtpMaster<MemoryConnection> =
        build_master(&cfg, factory.clone(), TokioSpawner::default()).unwrap();

    assert_eq!(master.max_connections(), 3);
    assert!(!master.auto_reconnect());
    assert_eq!(factory.created(), 3);
}

#[tokio::test]
async fn test_build_master_rejects_invalid_config() {
    let mut cfg = PoolConfig::new(AccessOptions::new("ftp.example.com"));
    cfg.max_connections = 0;

    let result: Result<FtpMaster<MemoryConnection>, PoolError> =
        build_master(&cfg, MemoryConnectionFactory::new(), TokioSpawner::default());
    assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_build_masters_per_server() {
    let cfg = MasterConfig::from_json_str(
        r#"{"servers": {
            "primary": {"access": {"host": "ftp1.example.com"}, "max_connections": 2, "auto_reconnect": false},
            "mirror": {"access": {"host": "ftp2.example.com"}, "auto_reconnect": false}
        }}"#,
    )
    .unwrap();

    let masters = build_masters(
        &cfg,
        |_name, _pool| Ok(MemoryConnectionFactory::new()),
        TokioSpawner::default(),
    )
    .unwrap();

    assert_eq!(masters.len(), 2);
    let primary: &FtpMaster<MemoryConnection> = &masters["primary"];
    assert_eq!(primary.max_connections(), 2);
    assert_eq!(masters["mirror"].max_connections(), 1);
}
