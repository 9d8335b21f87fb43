use std::net::{Ipv4Addr, SocketAddr};
use std::num::NonZeroUsize;
use std::time::Duration;

/// Port the proxy listens on unless told otherwise
pub const DEFAULT_SOCKS_PORT: u16 = 1050;

/// ServerConfig houses the listener settings. The defaults give a
/// loopback-only proxy with no timeouts and no connection limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,

    /// Upper bound on the SOCKS5 negotiation of each client
    pub handshake_timeout: Option<Duration>,

    /// Upper bound on concurrently served clients
    pub max_connections: Option<NonZeroUsize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_SOCKS_PORT)),
            handshake_timeout: None,
            max_connections: None,
        }
    }
}

impl ServerConfig {
    /// with_listen_addr overrides the bind address
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max: Option<NonZeroUsize>) -> Self {
        self.max_connections = max;
        self
    }
}
