//! Configuration models for pooled servers.

pub mod pool;

pub use pool::{AccessOptions, MasterConfig, PoolConfig, SecureMode};
