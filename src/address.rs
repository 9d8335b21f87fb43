use crate::error::HandshakeError;
use crate::protocol::AddressType;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Destination is the `(host, port)` pair a client asked to reach. The host
/// is either a dotted-decimal IPv4 address or a domain name, left unresolved
/// so the tunnel can resolve it at the far end.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

impl Destination {
    /// new is a constructor for the Destination type
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// read_host consumes the DST.ADDR field for the given address type byte
/// and returns it as a host string.
///
/// IPv6 addresses are read in full so the stream stays aligned for the
/// failure reply, then rejected.
pub async fn read_host<S>(stream: &mut S, atyp: u8) -> Result<String, HandshakeError>
where
    S: AsyncRead + Unpin,
{
    match AddressType::from_byte(atyp) {
        Some(AddressType::IPv4) => {
            let mut addr = [0u8; 4];
            stream.read_exact(&mut addr).await?;
            Ok(Ipv4Addr::from(addr).to_string())
        }
        Some(AddressType::DomainName) => {
            // First octet in DomainName contains the number of
            // octets to follow
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;

            let mut domain = vec![0u8; len[0] as usize];
            stream.read_exact(&mut domain).await?;

            // Exactly `len` bytes are consumed whatever their content
            Ok(String::from_utf8_lossy(&domain).into_owned())
        }
        Some(AddressType::IPv6) => {
            let mut addr = [0u8; 16];
            stream.read_exact(&mut addr).await?;
            Err(HandshakeError::Ipv6NotSupported(Ipv6Addr::from(addr)))
        }
        None => Err(HandshakeError::AddressTypeNotSupported(atyp)),
    }
}

/// read_port consumes DST.PORT -> 2 bytes, network byte order
pub async fn read_port<S>(stream: &mut S) -> Result<u16, HandshakeError>
where
    S: AsyncRead + Unpin,
{
    let mut port_buf = [0u8; 2];
    stream.read_exact(&mut port_buf).await?;
    Ok(u16::from_be_bytes(port_buf))
}
