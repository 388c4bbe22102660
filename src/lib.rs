//! dbpool — a TCP connection-pool server for expensive database
//! connections.
//!
//! Many short-lived client processes share a small, fixed set of real
//! database connections: each worker pre-establishes its pool at startup,
//! every accepted client connection is bound to one slot for its
//! lifetime, and database operations travel over a small framed JSON
//! protocol. [`PoolClient`] speaks the same protocol and implements the
//! [`Driver`] contract, so pooling is transparent to callers.

pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod pool;
pub mod protocol;
pub mod server;

pub use client::{PoolClient, PoolClientBuilder};
pub use config::{ClientConfig, ConnectUrl, LogDestination, ServerConfig};
pub use driver::{BindArgs, Driver, DriverFactory, Row};
pub use error::{PoolError, PoolResult};
pub use pool::{ConnId, Pool, Slot};
pub use protocol::{Method, Request, Response};
pub use server::PoolServer;
