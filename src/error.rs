//! Failure taxonomy for the SOCKS5 negotiation.

use std::io;

use thiserror::Error;

use crate::protocol::{self, ReplyCode};

/// Reasons a SOCKS5 negotiation can fail. Each variant knows which reply
/// frame the client should receive before the connection is closed.
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// The client greeted with something other than SOCKS5
    #[error("unsupported SOCKS version {0:#04x}")]
    UnsupportedVersion(u8),

    /// The request was not a SOCKS5 CONNECT
    #[error("unsupported command {command:#04x} (request version {version:#04x})")]
    CommandNotSupported { version: u8, command: u8 },

    /// The destination address type is unknown
    #[error("unsupported address type {0:#04x}")]
    AddressTypeNotSupported(u8),

    /// IPv6 destinations are parsed off the wire but never served
    #[error("IPv6 destination {0} is not supported")]
    Ipv6NotSupported(std::net::Ipv6Addr),

    /// The client hung up in the middle of the negotiation
    #[error("connection closed during handshake")]
    ConnectionClosedEarly,

    /// The negotiation did not finish in time
    #[error("handshake timed out")]
    TimedOut,

    /// Any other socket failure
    #[error("I/O error during handshake: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for HandshakeError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => HandshakeError::ConnectionClosedEarly,
            _ => HandshakeError::Io(e),
        }
    }
}

impl HandshakeError {
    /// reply returns the bytes sent to the client for this failure
    pub fn reply(&self) -> Vec<u8> {
        match self {
            HandshakeError::UnsupportedVersion(_) => protocol::version_mismatch_reply().to_vec(),
            HandshakeError::CommandNotSupported { .. } => {
                protocol::failure_reply(ReplyCode::CommandNotSupported).to_vec()
            }
            HandshakeError::AddressTypeNotSupported(_) | HandshakeError::Ipv6NotSupported(_) => {
                protocol::failure_reply(ReplyCode::AddrTypeUnsupported).to_vec()
            }
            HandshakeError::ConnectionClosedEarly
            | HandshakeError::TimedOut
            | HandshakeError::Io(_) => protocol::failure_reply(ReplyCode::ServerFailure).to_vec(),
        }
    }
}
