use crate::error::HandshakeError;
use crate::protocol::{self, Version};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// negotiate_auth handles the method selection sub-negotiation. Whatever
/// the client offers, "no authentication" is selected.
pub async fn negotiate_auth<S>(stream: &mut S) -> Result<(), HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // ClientHello format
    // +----+----------+----------+
    // |VER | NMETHODS | METHODS  |
    // +----+----------+----------+
    // | 1  |    1     | 1 to 255 |
    // +----+----------+----------+

    // Version first, so a non-SOCKS5 client is turned away before we
    // wait on anything else
    let mut version = [0u8; 1];
    stream.read_exact(&mut version).await?;

    if version[0] != Version::SOCKS5 as u8 {
        return Err(HandshakeError::UnsupportedVersion(version[0]));
    }

    let mut n_methods = [0u8; 1];
    stream.read_exact(&mut n_methods).await?;

    // Methods are consumed but not inspected
    let mut methods = vec![0u8; n_methods[0] as usize];
    stream.read_exact(&mut methods).await?;
    debug!("client offered auth methods {:?}", methods);

    // ServerChoice method selection reply format
    // +----+--------+
    // |VER | METHOD |
    // +----+--------+
    // | 1  |   1    |
    // +----+--------+
    stream.write_all(&protocol::greeting_reply()).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn reads_every_declared_method_and_selects_no_auth() {
        for n in [0u8, 1, 3, 255] {
            let (mut client, mut server) = duplex(1024);

            let mut hello = vec![0x05, n];
            hello.extend((0..n).map(|i| i.wrapping_mul(37)));
            // trailing byte must be left unread
            hello.push(0xAB);
            client.write_all(&hello).await.unwrap();

            negotiate_auth(&mut server).await.unwrap();

            let mut reply = [0u8; 2];
            client.read_exact(&mut reply).await.unwrap();
            assert_eq!(reply, [0x05, 0x00]);

            let mut next = [0u8; 1];
            server.read_exact(&mut next).await.unwrap();
            assert_eq!(next[0], 0xAB, "n = {n}");
        }
    }

    #[tokio::test]
    async fn socks4_greeting_is_rejected() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[0x04, 0x01]).await.unwrap();

        let err = negotiate_auth(&mut server).await.unwrap_err();
        assert!(matches!(err, HandshakeError::UnsupportedVersion(0x04)));
    }

    #[tokio::test]
    async fn short_method_list_is_closed_early() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[0x05, 0x03, 0x00]).await.unwrap();
        drop(client);

        let err = negotiate_auth(&mut server).await.unwrap_err();
        assert!(matches!(err, HandshakeError::ConnectionClosedEarly));
    }
}
