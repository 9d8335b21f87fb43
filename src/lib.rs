//! A local SOCKS5 endpoint that relays client connections over a tunnel
//! circuit
//!
//! ## SOCKS5 Implementation
//!
//! - Features:
//!     - CONNECT to IPv4 and domain name destinations
//!     - No Authentication
//!     - One tokio task per client connection
//!     - One tunnel stream per client, released when the client goes away
//!     - Optional handshake timeout and connection limit
//! - Not supported: BIND, UDP ASSOCIATE, IPv6 destinations, SOCKS4
//! - [SOCKS5 (RFC 1928)](https://datatracker.ietf.org/doc/html/rfc1928)
//!
//! The tunnel itself lives behind the [`Circuit`] trait. [`DirectCircuit`]
//! is a plain-TCP stand-in for running without one.
//!
//! # Example
//! ```no_run
//! use circuit_socks::{DirectCircuit, ServerConfig, Socks5Server};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = Socks5Server::new(Arc::new(DirectCircuit::new()), ServerConfig::default());
//!     server.run().await
//! }
//! ```

pub mod address;
pub mod auth;
pub mod circuit;
pub mod config;
pub mod direct;
pub mod error;
pub mod handler;
pub mod handshake;
pub mod protocol;
pub mod relay;
pub mod server;

// Re-export main types at crate root for convenience
pub use address::Destination;
pub use circuit::{Circuit, StreamId, StreamLease, TunnelStream};
pub use config::ServerConfig;
pub use direct::DirectCircuit;
pub use error::HandshakeError;
pub use handler::ConnectionHandler;
pub use handshake::SocksRequest;
pub use protocol::{AddressType, Command, ReplyCode, Version};
pub use relay::RelayStats;
pub use server::Socks5Server;
