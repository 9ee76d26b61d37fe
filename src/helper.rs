//! Helper utilities for Mixsocks
//!
//! This module provides common utility functions used throughout the application.

use std::io;
use std::net::{IpAddr, SocketAddr, TcpListener};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Default buffer size for IO operations
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Largest datagram the UDP relay reads or writes
pub const MAX_UDP_PACKET: usize = 65535;

/// Reserve an ephemeral port on `ip`
///
/// Binds a throwaway TCP listener to `ip:0`, reads back the port the OS
/// assigned and releases it again. The port is free at the time of the call
/// but nothing prevents another process from taking it afterwards.
pub fn reserve_ephemeral_port(ip: IpAddr) -> io::Result<u16> {
    let listener = TcpListener::bind(SocketAddr::new(ip, 0))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Read one line terminated by `\n`, reading at most `limit` bytes
///
/// The terminator is kept. A line longer than `limit` is returned truncated
/// with the remainder left unread on the stream; an empty vector means EOF.
pub async fn read_line_bounded<R>(reader: &mut R, limit: usize) -> io::Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    (&mut *reader)
        .take(limit as u64)
        .read_until(b'\n', &mut line)
        .await?;
    Ok(line)
}

/// Read a NUL-terminated field of at most `limit` bytes (terminator excluded)
///
/// Fails with `InvalidData` when no terminator shows up within the bound and
/// with `UnexpectedEof` when the stream ends first.
pub async fn read_nul_terminated<R>(reader: &mut R, limit: usize) -> io::Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut field = Vec::new();
    (&mut *reader)
        .take(limit as u64 + 1)
        .read_until(0, &mut field)
        .await?;

    match field.last() {
        Some(0) => {
            field.pop();
            Ok(field)
        }
        _ if field.len() > limit => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("field exceeds {} bytes without terminator", limit),
        )),
        _ => Err(io::ErrorKind::UnexpectedEof.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::Ipv4Addr;
    use tokio::io::BufReader;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_BUFFER_SIZE, 8192);
        assert_eq!(MAX_UDP_PACKET, 65535);
    }

    #[test]
    fn test_reserve_ephemeral_port() {
        let port = reserve_ephemeral_port(IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap();
        assert_ne!(port, 0);
    }

    #[tokio::test]
    async fn test_read_line_bounded() {
        let mut reader = BufReader::new(Cursor::new(b"GET / HTTP/1.1\r\nHost: a\r\n".to_vec()));
        let line = read_line_bounded(&mut reader, 1024).await.unwrap();
        assert_eq!(line, b"GET / HTTP/1.1\r\n");

        let line = read_line_bounded(&mut reader, 1024).await.unwrap();
        assert_eq!(line, b"Host: a\r\n");

        let line = read_line_bounded(&mut reader, 1024).await.unwrap();
        assert!(line.is_empty());
    }

    #[tokio::test]
    async fn test_read_line_bounded_truncates() {
        let mut reader = BufReader::new(Cursor::new(b"abcdefgh\n".to_vec()));
        let line = read_line_bounded(&mut reader, 4).await.unwrap();
        assert_eq!(line, b"abcd");

        // The remainder stays on the stream
        let rest = read_line_bounded(&mut reader, 64).await.unwrap();
        assert_eq!(rest, b"efgh\n");
    }

    #[tokio::test]
    async fn test_read_nul_terminated() {
        let mut reader = BufReader::new(Cursor::new(b"user\0example.com\0tail".to_vec()));
        assert_eq!(read_nul_terminated(&mut reader, 255).await.unwrap(), b"user");
        assert_eq!(
            read_nul_terminated(&mut reader, 255).await.unwrap(),
            b"example.com"
        );
    }

    #[tokio::test]
    async fn test_read_nul_terminated_empty_field() {
        let mut reader = BufReader::new(Cursor::new(b"\0".to_vec()));
        assert!(read_nul_terminated(&mut reader, 255)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_read_nul_terminated_too_long() {
        let mut reader = BufReader::new(Cursor::new(vec![b'a'; 300]));
        let err = read_nul_terminated(&mut reader, 255).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_read_nul_terminated_eof() {
        let mut reader = BufReader::new(Cursor::new(b"abc".to_vec()));
        let err = read_nul_terminated(&mut reader, 255).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
