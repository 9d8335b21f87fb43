//! The seam between the proxy and the tunnel that carries its traffic.
//!
//! A [`Circuit`] is built and owned elsewhere; the proxy only asks it for
//! one [`TunnelStream`] per client connection. Streams are held through a
//! [`StreamLease`] so they are handed back to the circuit however the
//! connection ends.

use crate::address::Destination;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

/// Diagnostic identifier of a stream inside its circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Circuit is a long-lived tunnel shared by every connection task.
///
/// Implementations must tolerate concurrent `create_stream` calls.
#[async_trait]
pub trait Circuit: Send + Sync + 'static {
    type Stream: TunnelStream;

    /// create_stream opens a new logical stream to `destination`. This may
    /// wait on network and tunnel-building work.
    async fn create_stream(&self, destination: &Destination) -> Result<Self::Stream>;
}

/// TunnelStream is one logical flow multiplexed over a circuit
pub trait TunnelStream: Send + 'static {
    type Socket: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    fn id(&self) -> StreamId;

    /// create_socket yields the byte-stream endpoint of this stream
    fn create_socket(&mut self) -> Result<Self::Socket>;

    /// release frees the stream's tunnel resources. Called exactly once.
    fn release(&mut self);
}

/// StreamLease owns a stream for the lifetime of one client connection and
/// releases it on drop, unwinding included.
pub struct StreamLease<T: TunnelStream> {
    stream: T,
}

impl<T: TunnelStream> StreamLease<T> {
    pub fn new(stream: T) -> Self {
        Self { stream }
    }

    pub fn id(&self) -> StreamId {
        self.stream.id()
    }

    pub fn create_socket(&mut self) -> Result<T::Socket> {
        self.stream.create_socket()
    }
}

impl<T: TunnelStream> Drop for StreamLease<T> {
    fn drop(&mut self) {
        info!("Suspending stream {}", self.stream.id());
        self.stream.release();
    }
}
