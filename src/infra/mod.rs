//! Infrastructure adapters: concrete connection backends.

pub mod connection;

pub use connection::{MemoryConnection, MemoryConnectionFactory};
