//! Bidirectional byte relay between a tunnel endpoint and a client socket.

use crate::protocol::RELAY_CHUNK_SIZE;
use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Byte counts of a finished relay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub from_client: u64,
    pub from_tunnel: u64,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Upstream,
    Downstream,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upstream => f.write_str("client -> tunnel"),
            Direction::Downstream => f.write_str("tunnel -> client"),
        }
    }
}

/// relay copies bytes both ways between `tunnel` and `client` until either
/// side reaches EOF or fails, then shuts down the tunnel endpoint followed
/// by the client endpoint.
///
/// Only the reads race each other. A chunk that has been read is written
/// out in full before the next wait, so an EOF on one side never strands
/// bytes already taken from the other. Both endpoints are owned here and
/// closed once, whatever ended the loop; an I/O error is logged and handed
/// back only after that cleanup has run.
pub async fn relay<A, B>(tunnel: A, client: B) -> io::Result<RelayStats>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut tunnel_r, mut tunnel_w) = tokio::io::split(tunnel);
    let (mut client_r, mut client_w) = tokio::io::split(client);
    let mut stats = RelayStats::default();

    let mut client_buf = [0u8; RELAY_CHUNK_SIZE];
    let mut tunnel_buf = [0u8; RELAY_CHUNK_SIZE];

    let outcome: Result<(), (Direction, io::Error)> = loop {
        // Wait until either side has data. read() is cancel safe, so the
        // losing branch has consumed nothing.
        let (direction, read) = tokio::select! {
            res = client_r.read(&mut client_buf) => (Direction::Upstream, res),
            res = tunnel_r.read(&mut tunnel_buf) => (Direction::Downstream, res),
        };

        let n = match read {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) => break Err((direction, e)),
        };

        // Forward the chunk to the opposite side
        let written = match direction {
            Direction::Upstream => forward(&mut tunnel_w, &client_buf[..n]).await,
            Direction::Downstream => forward(&mut client_w, &tunnel_buf[..n]).await,
        };
        if let Err(e) = written {
            break Err((direction, e));
        }

        match direction {
            Direction::Upstream => stats.from_client += n as u64,
            Direction::Downstream => stats.from_tunnel += n as u64,
        }
    };

    if let Err((direction, e)) = &outcome {
        warn!("relay {} failed: {}", direction, e);
    }

    info!("Closing tunnel socket");
    if let Err(e) = tunnel_w.shutdown().await {
        debug!("tunnel socket was already closed: {}", e);
    }
    info!("Closing client socket");
    if let Err(e) = client_w.shutdown().await {
        debug!("client socket was already closed: {}", e);
    }

    outcome.map(|()| stats).map_err(|(_, e)| e)
}

/// forward writes one chunk out completely
async fn forward<W>(writer: &mut W, chunk: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    // write_all keeps going across short writes
    writer.write_all(chunk).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};
    use tokio::io::{DuplexStream, ReadBuf, duplex};

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    #[tokio::test]
    async fn carries_arbitrary_sizes_both_ways() {
        let sizes = [1usize, 17, 4095, 4096, 4097, 3 * 4096 + 5, 100_000];

        for &size in &sizes {
            let (tunnel_peer, tunnel_end) = duplex(1024);
            let (client_peer, client_end) = duplex(1024);
            let relay_task = tokio::spawn(relay(tunnel_end, client_end));

            let (mut tp_r, mut tp_w) = tokio::io::split(tunnel_peer);
            let (mut cp_r, mut cp_w) = tokio::io::split(client_peer);

            let up = pattern(size, 1);
            let down = pattern(size / 2 + 3, 9);

            let send_up = async {
                cp_w.write_all(&up).await.unwrap();
            };
            let recv_up = async {
                let mut got = vec![0u8; up.len()];
                tp_r.read_exact(&mut got).await.unwrap();
                got
            };
            let send_down = async {
                tp_w.write_all(&down).await.unwrap();
            };
            let recv_down = async {
                let mut got = vec![0u8; down.len()];
                cp_r.read_exact(&mut got).await.unwrap();
                got
            };

            let ((), got_up, (), got_down) = tokio::join!(send_up, recv_up, send_down, recv_down);
            assert_eq!(got_up, up, "size {size}");
            assert_eq!(got_down, down, "size {size}");

            // client hangs up -> relay ends and closes the tunnel side
            cp_w.shutdown().await.unwrap();
            let stats = relay_task.await.unwrap().unwrap();
            assert_eq!(stats.from_client, up.len() as u64);
            assert_eq!(stats.from_tunnel, down.len() as u64);

            let mut rest = Vec::new();
            tp_r.read_to_end(&mut rest).await.unwrap();
            assert!(rest.is_empty());
        }
    }

    #[tokio::test]
    async fn interleaved_small_messages() {
        let (tunnel_peer, tunnel_end) = duplex(64);
        let (mut client_peer, client_end) = duplex(64);
        let relay_task = tokio::spawn(relay(tunnel_end, client_end));
        let mut tunnel_peer = tunnel_peer;

        for round in 0..50u8 {
            let msg = pattern(round as usize + 1, round);
            client_peer.write_all(&msg).await.unwrap();
            let mut got = vec![0u8; msg.len()];
            tunnel_peer.read_exact(&mut got).await.unwrap();
            assert_eq!(got, msg);

            let reply = pattern(2 * round as usize + 1, round ^ 0x5A);
            tunnel_peer.write_all(&reply).await.unwrap();
            let mut got = vec![0u8; reply.len()];
            client_peer.read_exact(&mut got).await.unwrap();
            assert_eq!(got, reply);
        }

        drop(tunnel_peer);
        relay_task.await.unwrap().unwrap();

        let mut rest = Vec::new();
        client_peer.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn bytes_in_flight_survive_client_hangup() {
        // A small client pipe makes the relay block part way through a chunk
        let (mut tunnel_peer, tunnel_end) = duplex(4096);
        let (client_peer, client_end) = duplex(16);
        let relay_task = tokio::spawn(relay(tunnel_end, client_end));
        let (mut cp_r, mut cp_w) = tokio::io::split(client_peer);

        let sent = pattern(100, 3);
        tunnel_peer.write_all(&sent).await.unwrap();

        // Once the first byte arrives the relay holds the whole chunk
        let mut first = [0u8; 1];
        cp_r.read_exact(&mut first).await.unwrap();

        // The client stops sending while the rest is still on its way
        cp_w.shutdown().await.unwrap();

        let mut received = first.to_vec();
        cp_r.read_to_end(&mut received).await.unwrap();
        assert_eq!(received.len(), sent.len());
        assert_eq!(received, sent);

        let stats = relay_task.await.unwrap().unwrap();
        assert_eq!(stats.from_tunnel, 100);
        assert_eq!(stats.from_client, 0);
    }

    /// Endpoint that records how often it was shut down and dropped
    struct Tracked {
        inner: DuplexStream,
        shutdowns: Arc<AtomicUsize>,
        drops: Arc<AtomicUsize>,
    }

    impl Tracked {
        fn new(inner: DuplexStream) -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            let shutdowns = Arc::new(AtomicUsize::new(0));
            let drops = Arc::new(AtomicUsize::new(0));
            let tracked = Tracked {
                inner,
                shutdowns: shutdowns.clone(),
                drops: drops.clone(),
            };
            (tracked, shutdowns, drops)
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl AsyncRead for Tracked {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for Tracked {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.inner).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<io::Result<()>> {
            let res = Pin::new(&mut self.inner).poll_shutdown(cx);
            if res.is_ready() {
                self.shutdowns.fetch_add(1, Ordering::SeqCst);
            }
            res
        }
    }

    #[tokio::test]
    async fn peer_close_ends_relay_and_closes_each_endpoint_once() {
        for close_tunnel_side in [true, false] {
            let (tunnel_peer, tunnel_end) = duplex(256);
            let (client_peer, client_end) = duplex(256);
            let (tunnel_end, tunnel_shutdowns, tunnel_drops) = Tracked::new(tunnel_end);
            let (client_end, client_shutdowns, client_drops) = Tracked::new(client_end);

            let relay_task = tokio::spawn(relay(tunnel_end, client_end));

            let mut survivor = if close_tunnel_side {
                drop(tunnel_peer);
                client_peer
            } else {
                drop(client_peer);
                tunnel_peer
            };

            relay_task.await.unwrap().unwrap();

            // the surviving peer sees an orderly EOF
            let mut rest = Vec::new();
            survivor.read_to_end(&mut rest).await.unwrap();
            assert!(rest.is_empty());

            assert_eq!(tunnel_shutdowns.load(Ordering::SeqCst), 1);
            assert_eq!(client_shutdowns.load(Ordering::SeqCst), 1);
            assert_eq!(tunnel_drops.load(Ordering::SeqCst), 1);
            assert_eq!(client_drops.load(Ordering::SeqCst), 1);
        }
    }
}
