// SOCKS5 wire constants used by the handshake and the reply frames.

/// Fields marked RESERVED (RSV) must be set to X'00'.
pub const RSV: u8 = 0x00;

/// Number of bytes read from either side of a relay per wake-up.
pub const RELAY_CHUNK_SIZE: usize = 4096;

/// Version represents available SOCKS proxy versions.
/// Only SOCKS5 is spoken here; SOCKS4 clients are turned away.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    SOCKS5 = 0x05,
}

/// AuthMethod represents the SOCKS5 authentication methods this server
/// knows about. Only `NoAuth` is ever selected.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    NoAuth = 0x00,
    // 0x01 GSSAPI and 0x02 username/password are not offered
    NoAcceptable = 0xFF,
}

/// Command represents SOCKS5 protocol commands
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect = 0x01,
    Bind = 0x02,
    UdpAssociate = 0x03,
}

/// Command implementation block
impl Command {
    /// from_byte converts a byte to its related SOCKS5 protocol command
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Command::Connect),
            0x02 => Some(Command::Bind),
            0x03 => Some(Command::UdpAssociate),
            _ => None,
        }
    }
}

/// AddressType represents the SOCKS5 address types:
/// IPv4, Domain Name, IPv6
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    IPv4 = 0x01,
    DomainName = 0x03,
    IPv6 = 0x04,
}

/// AddressType implementation block
impl AddressType {
    /// from_byte converts a byte to its related network address type
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(AddressType::IPv4),
            0x03 => Some(AddressType::DomainName),
            0x04 => Some(AddressType::IPv6),
            _ => None,
        }
    }
}

/// ReplyCode is the REP field of a SOCKS5 reply
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyCode {
    Succeeded = 0x00,
    ServerFailure = 0x01,
    CommandNotSupported = 0x07,
    AddrTypeUnsupported = 0x08,
}

/// greeting_reply is the method selection frame: SOCKS5, no authentication
pub const fn greeting_reply() -> [u8; 2] {
    [Version::SOCKS5 as u8, AuthMethod::NoAuth as u8]
}

/// failure_reply builds the short failure frame `VER REP RSV`
pub const fn failure_reply(code: ReplyCode) -> [u8; 3] {
    [Version::SOCKS5 as u8, code as u8, RSV]
}

/// version_mismatch_reply is sent to clients that do not speak SOCKS5
pub const fn version_mismatch_reply() -> [u8; 2] {
    [Version::SOCKS5 as u8, AuthMethod::NoAcceptable as u8]
}

/// success_reply builds the CONNECT success frame. The bound address is
/// a zeroed IPv4 placeholder; only the port carries information.
pub fn success_reply(bound_port: u16) -> [u8; 10] {
    // +----+-----+-------+------+----------+----------+
    // |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
    // +----+-----+-------+------+----------+----------+
    // | 1  |  1  | X'00' |  1   |    4     |    2     |
    // +----+-----+-------+------+----------+----------+
    let port = bound_port.to_be_bytes();
    [
        Version::SOCKS5 as u8,
        ReplyCode::Succeeded as u8,
        RSV,
        AddressType::IPv4 as u8,
        0,
        0,
        0,
        0,
        port[0],
        port[1],
    ]
}
