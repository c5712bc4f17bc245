//! columnkv - a networked key-value store with snapshot persistence
//!
//! This library provides:
//! - A line-oriented TCP server, optionally wrapped in TLS
//! - Optional shared-token authentication per command
//! - A reader/writer locked in-memory store
//! - Full-snapshot persistence to a two-column Parquet file
//! - A client library used by the bundled binaries and tests

pub mod client;
pub mod columnar;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod persistence;
pub mod protocol;
pub mod server;
pub mod session;
pub mod store;
pub mod tls;

pub use client::Client;
pub use config::{AuthPolicy, Config};
pub use dispatcher::CommandDispatcher;
pub use error::{ColumnKvError, Result};
pub use persistence::Persistence;
pub use protocol::{Command, Reply, Response};
pub use server::Server;
pub use store::{MemoryStore, Store};
