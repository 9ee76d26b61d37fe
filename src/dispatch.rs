//! Protocol dispatcher
//!
//! Every protocol shares one port. The first byte of a new connection
//! decides which handler takes it.

use crate::error::Result;
use crate::socks::{SOCKS4_VERSION, SOCKS5_VERSION};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Protocol selected by the first byte of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// SOCKS4 or SOCKS4a
    Socks4,
    /// SOCKS5
    Socks5,
    /// HTTP proxy; carries the consumed first byte of the request line
    Http(u8),
}

impl Protocol {
    /// Classify a dispatch byte
    pub fn from_first_byte(byte: u8) -> Self {
        match byte {
            SOCKS4_VERSION => Protocol::Socks4,
            SOCKS5_VERSION => Protocol::Socks5,
            other => Protocol::Http(other),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Socks4 => write!(f, "SOCKS4"),
            Protocol::Socks5 => write!(f, "SOCKS5"),
            Protocol::Http(_) => write!(f, "HTTP"),
        }
    }
}

/// Read the dispatch byte and classify the connection
///
/// Fails when the stream closes or errors before one byte arrives.
pub async fn sniff<S>(stream: &mut S) -> Result<Protocol>
where
    S: AsyncRead + Unpin,
{
    let byte = stream.read_u8().await?;
    Ok(Protocol::from_first_byte(byte))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxyError;
    use std::io::Cursor;

    #[test]
    fn test_from_first_byte() {
        assert_eq!(Protocol::from_first_byte(0x04), Protocol::Socks4);
        assert_eq!(Protocol::from_first_byte(0x05), Protocol::Socks5);
        assert_eq!(Protocol::from_first_byte(b'G'), Protocol::Http(b'G'));
        assert_eq!(Protocol::from_first_byte(b'C'), Protocol::Http(b'C'));
        assert_eq!(Protocol::from_first_byte(0x00), Protocol::Http(0x00));
    }

    #[tokio::test]
    async fn test_sniff_consumes_one_byte() {
        let mut stream = Cursor::new(b"GET / HTTP/1.1\r\n".to_vec());
        assert_eq!(sniff(&mut stream).await.unwrap(), Protocol::Http(b'G'));
        assert_eq!(stream.position(), 1);
    }

    #[tokio::test]
    async fn test_sniff_empty_stream() {
        let mut stream = Cursor::new(Vec::new());
        assert!(matches!(sniff(&mut stream).await, Err(ProxyError::Io(_))));
    }

    #[test]
    fn test_protocol_display() {
        assert_eq!(Protocol::Socks4.to_string(), "SOCKS4");
        assert_eq!(Protocol::Http(b'G').to_string(), "HTTP");
    }
}
