//! # Prometheus FTP Master
//!
//! A connection-pool task scheduler for shared FTP sessions.
//!
//! FTP control sessions are stateful and expensive to open, and a session can
//! only drive one data transfer at a time. `FtpMaster` owns a small, resizable
//! set of sessions to one server and hands each queued unit of work exclusive
//! use of one open session for as long as the work runs.
//!
//! ## Key Features
//!
//! - **Exclusive binding**: a task holds exactly one idle, open connection
//!   for the duration of its work function, and a connection serves at most
//!   one task at a time
//! - **FIFO with priority**: tasks run in submission order; priority tasks jump
//!   to the head of the queue
//! - **Two-phase abort**: aborting a queued task removes it without touching
//!   any connection; aborting a running task tears down its data transfer and
//!   settles it with [`core::PoolError::Cancelled`]
//! - **Auto-reconnect**: dropped sessions are re-established in the background
//!   and failures are broadcast to subscribers
//! - **Live resizing**: grow or shrink the pool while tasks run
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use prometheus_ftp_master::config::AccessOptions;
//! use prometheus_ftp_master::core::FtpMaster;
//!
//! let access = AccessOptions::new("ftp.example.com").with_credentials("alice", "secret");
//! let master = FtpMaster::new(access, 2, true, MyFtpClient::new);
//!
//! let mut failures = master.subscribe_errors();
//! tokio::spawn(async move {
//!     while let Ok(failure) = failures.recv().await {
//!         eprintln!("handle {} could not reconnect: {}", failure.handle, failure.error);
//!     }
//! });
//!
//! let listing = master
//!     .enqueue(|client| async move { client.list("/pub").await }, false)
//!     .await?;
//! ```
//!
//! Any session type can be pooled by implementing [`core::Connection`]; the
//! in-memory backend in [`infra`] simulates one for tests and dry runs.
//!
//! ## Configuration
//!
//! Pools can be built from JSON or `FTP_*` environment variables (a `.env`
//! file is honored) through [`config::PoolConfig`] and [`builders`].

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Scheduling core: pool, queue, tasks, supervision.
pub mod core;
/// Configuration types and loaders.
pub mod config;
/// Builders that turn configuration into running masters.
pub mod builders;
/// Concrete connection backends.
pub mod infra;
/// Runtime adapters.
pub mod runtime;
/// Logging helpers.
pub mod util;
