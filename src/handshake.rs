//! The server side of the SOCKS5 negotiation.
//!
//! [`handshake`] consumes exactly the bytes of the greeting and the CONNECT
//! request. On success it hands back the parsed [`SocksRequest`]; on failure
//! it has already written the matching failure frame and shut the client
//! socket down, so callers only need to log and walk away.

use crate::address::{self, Destination};
use crate::auth;
use crate::error::HandshakeError;
use crate::protocol::{Command, Version};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// SocksRequest is the validated CONNECT request of one client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocksRequest {
    pub version: u8,
    pub command: Command,
    pub address_type: u8,
    pub destination: Destination,
}

/// handshake runs the whole negotiation, optionally bounded by `timeout`,
/// and replies with a failure frame when it does not succeed.
pub async fn handshake<S>(
    stream: &mut S,
    timeout: Option<Duration>,
) -> Result<SocksRequest, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let outcome = match timeout {
        Some(limit) => tokio::time::timeout(limit, negotiate(stream))
            .await
            .unwrap_or(Err(HandshakeError::TimedOut)),
        None => negotiate(stream).await,
    };

    if let Err(e) = &outcome {
        reject(stream, e).await;
    }

    outcome
}

/// negotiate performs the greeting then reads the request
async fn negotiate<S>(stream: &mut S) -> Result<SocksRequest, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    auth::negotiate_auth(stream).await?;
    read_request(stream).await
}

/// read_request parses the CONNECT request that follows the greeting
pub async fn read_request<S>(stream: &mut S) -> Result<SocksRequest, HandshakeError>
where
    S: AsyncRead + Unpin,
{
    // SOCKS5 request format
    // +----+-----+-------+------+----------+----------+
    // |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
    // +----+-----+-------+------+----------+----------+
    // | 1  |  1  | X'00' |  1   | Variable |    2     |
    // +----+-----+-------+------+----------+----------+
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    let [version, command, _rsv, atyp] = header;

    // Both must hold: a SOCKS5 frame carrying CONNECT
    let command = match Command::from_byte(command) {
        Some(Command::Connect) if version == Version::SOCKS5 as u8 => Command::Connect,
        _ => return Err(HandshakeError::CommandNotSupported { version, command }),
    };

    let host = address::read_host(stream, atyp).await?;
    let port = address::read_port(stream).await?;

    Ok(SocksRequest {
        version,
        command,
        address_type: atyp,
        destination: Destination::new(host, port),
    })
}

/// reject writes the failure frame for `err` and closes the client's side.
/// The peer may already be gone, so write errors are only noted.
async fn reject<S>(stream: &mut S, err: &HandshakeError)
where
    S: AsyncWrite + Unpin,
{
    if let Err(e) = stream.write_all(&err.reply()).await {
        debug!("could not deliver failure reply: {}", e);
    }
    if let Err(e) = stream.shutdown().await {
        debug!("client socket already closed: {}", e);
    }
}
