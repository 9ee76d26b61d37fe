//! SOCKS5 request parser
//!
//! Parses SOCKS5 requests from the client.

use super::reply::build_reply;
use crate::error::{ProxyError, Result, Socks5ReplyCode};
use crate::socks::consts::*;
use crate::socks::types::TargetAddr;
use std::net::{Ipv4Addr, Ipv6Addr};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

/// A parsed SOCKS5 request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks5Request {
    /// Raw command byte, dispatched by the handler
    pub command: u8,
    /// Destination of the request
    pub target: TargetAddr,
}

/// Parse a SOCKS5 request from the stream
///
/// # SOCKS5 Request Format
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
///
/// An unknown address type is answered with reply 0x08 before failing.
pub async fn parse_request<S>(stream: &mut S) -> Result<Socks5Request>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Read: VER CMD RSV
    let mut header = [0u8; 3];
    stream
        .read_exact(&mut header)
        .await
        .map_err(ProxyError::short_read("request header"))?;

    let version = header[0];
    let command = header[1];

    if version != SOCKS5_VERSION {
        return Err(ProxyError::BadVersion(version));
    }

    let addr_type = stream
        .read_u8()
        .await
        .map_err(ProxyError::short_read("address type"))?;

    if !matches!(
        addr_type,
        SOCKS5_ADDR_TYPE_IPV4 | SOCKS5_ADDR_TYPE_DOMAIN | SOCKS5_ADDR_TYPE_IPV6
    ) {
        build_reply(stream, Socks5ReplyCode::AddressTypeNotSupported, None).await?;
        return Err(ProxyError::protocol(format!(
            "unknown address type: {:#04x}",
            addr_type
        )));
    }

    let target = read_address(stream, addr_type).await?;

    tracing::debug!("Parsed SOCKS5 request: cmd {:#04x} to {}", command, target);

    Ok(Socks5Request { command, target })
}

/// Read the DST.ADDR and DST.PORT fields for `addr_type`
async fn read_address<S>(stream: &mut S, addr_type: u8) -> Result<TargetAddr>
where
    S: AsyncRead + Unpin,
{
    let target = match addr_type {
        SOCKS5_ADDR_TYPE_IPV4 => {
            let mut addr = [0u8; 4];
            stream
                .read_exact(&mut addr)
                .await
                .map_err(ProxyError::short_read("IPv4 address"))?;
            let port = read_port(stream).await?;

            TargetAddr::ipv4(Ipv4Addr::from(addr), port)
        }

        SOCKS5_ADDR_TYPE_DOMAIN => {
            let domain_len = stream
                .read_u8()
                .await
                .map_err(ProxyError::short_read("domain length"))?
                as usize;

            if domain_len == 0 {
                return Err(ProxyError::protocol("empty domain name"));
            }

            let mut domain_buf = vec![0u8; domain_len];
            stream
                .read_exact(&mut domain_buf)
                .await
                .map_err(ProxyError::short_read("domain name"))?;
            let domain = String::from_utf8(domain_buf)
                .map_err(|_| ProxyError::protocol("invalid UTF-8 in domain name"))?;
            let port = read_port(stream).await?;

            TargetAddr::domain(domain, port)
        }

        SOCKS5_ADDR_TYPE_IPV6 => {
            let mut addr = [0u8; 16];
            stream
                .read_exact(&mut addr)
                .await
                .map_err(ProxyError::short_read("IPv6 address"))?;
            let port = read_port(stream).await?;

            TargetAddr::ipv6(Ipv6Addr::from(addr), port)
        }

        other => {
            return Err(ProxyError::protocol(format!(
                "unknown address type: {:#04x}",
                other
            )))
        }
    };

    Ok(target)
}

async fn read_port<S>(stream: &mut S) -> Result<u16>
where
    S: AsyncRead + Unpin,
{
    stream
        .read_u16()
        .await
        .map_err(ProxyError::short_read("port"))
}
