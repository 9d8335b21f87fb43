use anyhow::Result;
use circuit_socks::{DirectCircuit, ServerConfig, Socks5Server, config::DEFAULT_SOCKS_PORT};
use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "A local SOCKS5 endpoint relaying over a tunnel circuit", long_about = None)]
struct Args {
    /// Listener address
    #[arg(short, long, default_value_t = SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_SOCKS_PORT)))]
    listen: SocketAddr,

    /// Seconds a client may take to finish the SOCKS5 handshake
    #[arg(long)]
    handshake_timeout: Option<u64>,

    /// Maximum number of clients served at once (at least 1)
    #[arg(long)]
    max_connections: Option<NonZeroUsize>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse args
    let args = Args::parse();

    // Initialize tracing subscriber
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    let config = ServerConfig::default()
        .with_listen_addr(args.listen)
        .with_handshake_timeout(args.handshake_timeout.map(Duration::from_secs))
        .with_max_connections(args.max_connections);

    // No tunnel provider is linked in; streams leave as plain TCP
    warn!("relaying over direct TCP connections: traffic is not anonymized");
    let circuit = Arc::new(DirectCircuit::new());

    // Instantiate server
    let mut server = Socks5Server::new(circuit, config);

    // Run it until Ctrl-C
    info!("Starting SOCKS5 proxy: {}", server.config.listen_addr);
    server.run_until(wait_for_ctrl_c()).await
}

/// wait_for_ctrl_c resolves on the first interrupt signal
async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("unable to listen for Ctrl-C, running until killed: {}", e);
        std::future::pending::<()>().await;
    }
}
