//! Tests for utility functions

use prometheus_ftp_master::util::{init_tracing, init_tracing_with_default};

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    init_tracing_with_default("prometheus_ftp_master=debug");
    tracing::info!("tracing initialized");
}
