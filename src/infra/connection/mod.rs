//! Connection backends.

pub mod memory;

pub use memory::{MemoryConnection, MemoryConnectionFactory};
