use crate::circuit::{Circuit, StreamLease};
use crate::handshake;
use crate::protocol::{self, ReplyCode};
use crate::relay;
use anyhow::{Context, Result};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

/// ConnectionHandler drives one accepted client from handshake to the end
/// of its relay. It is cheap to clone; clones share the circuit.
pub struct ConnectionHandler<C> {
    circuit: Arc<C>,
    handshake_timeout: Option<Duration>,
}

impl<C> Clone for ConnectionHandler<C> {
    fn clone(&self) -> Self {
        Self {
            circuit: Arc::clone(&self.circuit),
            handshake_timeout: self.handshake_timeout,
        }
    }
}

/// ConnectionHandler implementation block
impl<C: Circuit> ConnectionHandler<C> {
    /// new is a constructor for the ConnectionHandler type
    pub fn new(circuit: Arc<C>) -> Self {
        Self {
            circuit,
            handshake_timeout: None,
        }
    }

    /// with_handshake_timeout bounds how long a client may take to
    /// finish the SOCKS5 negotiation
    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// run owns `client` until the connection is over. `local_port` is the
    /// port the client connected to, echoed back in the success reply.
    ///
    /// Errors are this connection's alone; every failure path has already
    /// replied to the client or closed it when this returns.
    pub async fn run<S>(&self, mut client: S, peer: SocketAddr, local_port: u16) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        // Negotiate auth and read the CONNECT request
        let request = handshake::handshake(&mut client, self.handshake_timeout)
            .await
            .context("SOCKS5 handshake failed")?;
        let destination = request.destination;

        info!("Socket connecting to {} for {}", destination, peer);

        // Open a stream on the circuit
        let stream = match self.circuit.create_stream(&destination).await {
            Ok(stream) => stream,
            Err(e) => {
                refuse(&mut client).await;
                return Err(e.context(format!("no tunnel stream to {destination}")));
            }
        };

        // From here on the stream goes back to the circuit however we leave
        let mut lease = StreamLease::new(stream);
        let stream_id = lease.id();

        // Instantiate the tunnel socket
        let tunnel = match lease.create_socket() {
            Ok(socket) => socket,
            Err(e) => {
                refuse(&mut client).await;
                return Err(e.context(format!("stream {stream_id} has no socket")));
            }
        };

        // Send success reply
        client
            .write_all(&protocol::success_reply(local_port))
            .await
            .context("couldn't write SOCKS reply")?;

        // Relay until either side is done
        match relay::relay(tunnel, client).await {
            Ok(stats) => {
                info!(
                    "stream {} to {} closed: {} bytes from client, {} bytes from tunnel",
                    stream_id, destination, stats.from_client, stats.from_tunnel
                );
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                error!(
                    "tunnel pipe broke on stream {} for {}; dropping this connection",
                    stream_id, peer
                );
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("relay on stream {stream_id} failed")),
        }
    }
}

/// refuse sends the general failure reply and closes the client
async fn refuse<S>(client: &mut S)
where
    S: AsyncWrite + Unpin,
{
    if let Err(e) = client
        .write_all(&protocol::failure_reply(ReplyCode::ServerFailure))
        .await
    {
        debug!("could not deliver failure reply: {}", e);
    }
    if let Err(e) = client.shutdown().await {
        debug!("client socket already closed: {}", e);
    }
}
