use crate::circuit::Circuit;
use crate::config::ServerConfig;
use crate::handler::ConnectionHandler;
use anyhow::{Context, Result, bail};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::Semaphore;
use tracing::{Instrument, error, info, info_span, warn};

/// Pending connections the kernel may queue for us
const LISTEN_BACKLOG: u32 = 1024;

/// Socks5Server represents the SOCKS5 listener and houses the shared
/// circuit every accepted connection is relayed over
pub struct Socks5Server<C> {
    pub config: ServerConfig,
    handler: ConnectionHandler<C>,
    listener: Option<TcpListener>,
}

/// Socks5Server implementation block
impl<C: Circuit> Socks5Server<C> {
    /// new is a constructor for the Socks5Server type
    pub fn new(circuit: Arc<C>, config: ServerConfig) -> Self {
        let handler = ConnectionHandler::new(circuit).with_handshake_timeout(config.handshake_timeout);
        Self {
            config,
            handler,
            listener: None,
        }
    }

    /// bind opens the listening socket with address reuse enabled and
    /// returns the address actually bound. Can only be called once.
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        if self.listener.is_some() {
            bail!("bind can only be called once");
        }

        let addr = self.config.listen_addr;
        // Instantiate socket
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        socket
            .bind(addr)
            .with_context(|| format!("failed to bind SOCKS port {addr}"))?;
        // Start listening
        let listener = socket.listen(LISTEN_BACKLOG)?;
        let bound = listener.local_addr()?;

        info!("Socks5 proxy initialized at {}", bound);

        self.listener = Some(listener);
        Ok(bound)
    }

    /// run serves connections until accepting fails
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// run_until serves connections until `shutdown` completes or
    /// accepting fails. The listening socket is closed before this returns,
    /// on either path.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if self.listener.is_none() {
            self.bind().await?;
        }
        let listener = self
            .listener
            .take()
            .context("listener vanished after bind")?;
        let local_addr = listener.local_addr()?;

        // Serve until shutdown or failure
        let result = self.accept_loop(&listener, shutdown).await;

        if let Err(e) = &result {
            error!("Exception in socks5 server: {}", e);
            for cause in e.chain().skip(1) {
                error!("  caused by: {}", cause);
            }
        }

        drop(listener);
        info!("Listener on {} closed", local_addr);

        result
    }

    /// accept_loop hands every accepted connection to its own task
    async fn accept_loop<F>(&self, listener: &TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let limiter = self
            .config
            .max_connections
            .map(|n| Arc::new(Semaphore::new(n.get())));
        tokio::pin!(shutdown);

        loop {
            // Wait for room before taking the next client off the backlog
            let permit = match &limiter {
                Some(limiter) => tokio::select! {
                    permit = Arc::clone(limiter).acquire_owned() => {
                        Some(permit.context("connection limiter closed")?)
                    }
                    _ = &mut shutdown => {
                        info!("Closing socket by user request");
                        return Ok(());
                    }
                },
                None => None,
            };

            // Accept incoming connection
            let (inbound, peer_addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("accept on SOCKS port failed: {}", e);
                        return Err(e).context("failed to receive incoming stream on SOCKS port");
                    }
                },
                _ = &mut shutdown => {
                    info!("Closing socket by user request");
                    return Ok(());
                }
            };

            let local_port = match inbound.local_addr() {
                Ok(addr) => addr.port(),
                Err(e) => {
                    warn!("dropping {}: no local address: {}", peer_addr, e);
                    continue;
                }
            };

            info!("new client: {}", peer_addr);

            // Clone for this connection
            let handler = self.handler.clone();
            let span = info_span!("socks", peer = %peer_addr);
            // Spawn async task
            tokio::spawn(
                async move {
                    // Held until this connection is over
                    let _permit = permit;

                    if let Err(e) = handler.run(inbound, peer_addr, local_port).await {
                        warn!("connection exited with error: {:#}", e);
                    }
                }
                .instrument(span),
            );
        }
    }
}
