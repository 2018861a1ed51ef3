//! Tests for error types

use prometheus_ftp_master::core::{ConnectionError, PoolError, QUEUE_CLEARED_REASON};

#[test]
fn test_queue_cleared_error() {
    let err = PoolError::QueueCleared;
    assert_eq!(format!("{}", err), QUEUE_CLEARED_REASON);
    assert!(err.is_queue_cleared());
    assert!(!err.is_cancelled());
}

#[test]
fn test_cancelled_error() {
    let err = PoolError::Cancelled;
    assert_eq!(format!("{}", err), "task cancelled");
    assert!(err.is_cancelled());
}

#[test]
fn test_connection_error_is_transparent() {
    let err: PoolError = ConnectionError::Access("530 login incorrect".to_string()).into();
    assert_eq!(format!("{}", err), "access failed: 530 login incorrect");
}

#[test]
fn test_work_error_keeps_message() {
    let err = PoolError::Work(anyhow::anyhow!("550 permission denied"));
    assert_eq!(format!("{}", err), "550 permission denied");
}

#[test]
fn test_invalid_config_error() {
    let err = PoolError::InvalidConfig("max_connections must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: max_connections must be greater than 0"
    );
}
