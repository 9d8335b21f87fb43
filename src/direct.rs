use crate::address::Destination;
use crate::circuit::{Circuit, StreamId, TunnelStream};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpStream;
use tracing::debug;

/// DirectCircuit satisfies the [`Circuit`] contract with plain TCP: every
/// stream is a direct connection to its destination. It provides no
/// anonymity and exists so the proxy can run without a tunnel provider.
#[derive(Debug, Default)]
pub struct DirectCircuit {
    next_id: AtomicU64,
}

impl DirectCircuit {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Circuit for DirectCircuit {
    type Stream = DirectStream;

    async fn create_stream(&self, destination: &Destination) -> Result<DirectStream> {
        let id = StreamId(self.next_id.fetch_add(1, Ordering::Relaxed));

        // Domain names are resolved locally here
        let socket = TcpStream::connect((destination.host.as_str(), destination.port))
            .await
            .with_context(|| format!("failed to connect to {destination}"))?;

        debug!("stream {} connected to {}", id, destination);

        Ok(DirectStream {
            id,
            socket: Some(socket),
        })
    }
}

/// DirectStream is a single TCP connection opened by [`DirectCircuit`]
#[derive(Debug)]
pub struct DirectStream {
    id: StreamId,
    socket: Option<TcpStream>,
}

impl TunnelStream for DirectStream {
    type Socket = TcpStream;

    fn id(&self) -> StreamId {
        self.id
    }

    fn create_socket(&mut self) -> Result<TcpStream> {
        self.socket
            .take()
            .ok_or_else(|| anyhow!("socket of stream {} already taken", self.id))
    }

    fn release(&mut self) {
        // Dropping an unused socket closes it
        self.socket = None;
    }
}
