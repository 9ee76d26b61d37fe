//! SOCKS4 and SOCKS4a handler
//!
//! Serves CONNECT requests. A destination IP of `0.0.0.x` with `x != 0`
//! marks a SOCKS4a request whose domain name follows the user id.

use super::consts::*;
use super::tcp_relay::relay_tcp;
use super::types::TargetAddr;
use crate::error::{ProxyError, Result};
use crate::helper::read_nul_terminated;
use crate::server::ProxyContext;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::io::{AsyncBufRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

/// A parsed SOCKS4 request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks4Request {
    /// Command byte
    pub command: u8,
    /// Destination, a domain for SOCKS4a
    pub target: TargetAddr,
    /// User id, read and otherwise ignored
    pub user_id: Vec<u8>,
}

/// Parse a SOCKS4 request whose version byte is already consumed
///
/// # SOCKS4 Request Format
///
/// ```text
/// +----+----------+--------+--------------+-------------------+
/// | CD | DST.PORT | DST.IP | USERID, NUL  | [DOMAIN, NUL] (4a)|
/// +----+----------+--------+--------------+-------------------+
/// | 1  |    2     |   4    |   variable   |     variable      |
/// +----+----------+--------+--------------+-------------------+
/// ```
pub async fn parse_socks4_request<S>(stream: &mut S) -> Result<Socks4Request>
where
    S: AsyncBufRead + Unpin,
{
    let command = stream
        .read_u8()
        .await
        .map_err(ProxyError::short_read("command"))?;
    let port = stream
        .read_u16()
        .await
        .map_err(ProxyError::short_read("port"))?;

    let mut ip = [0u8; 4];
    stream
        .read_exact(&mut ip)
        .await
        .map_err(ProxyError::short_read("IPv4 address"))?;

    let user_id = read_nul_terminated(stream, SOCKS4_MAX_FIELD_LEN)
        .await
        .map_err(ProxyError::short_read("user id"))?;

    let target = if is_socks4a(ip) {
        let domain = read_nul_terminated(stream, SOCKS4_MAX_FIELD_LEN)
            .await
            .map_err(ProxyError::short_read("domain name"))?;
        if domain.is_empty() {
            return Err(ProxyError::protocol("empty SOCKS4a domain name"));
        }
        let domain = String::from_utf8(domain)
            .map_err(|_| ProxyError::protocol("invalid UTF-8 in domain name"))?;
        TargetAddr::domain(domain, port)
    } else {
        TargetAddr::ipv4(Ipv4Addr::from(ip), port)
    };

    Ok(Socks4Request {
        command,
        target,
        user_id,
    })
}

/// `0.0.0.x` with non-zero `x`
fn is_socks4a(ip: [u8; 4]) -> bool {
    ip[..3] == [0, 0, 0] && ip[3] != 0
}

/// Encode a SOCKS4 reply with the given status
pub fn socks4_reply(status: u8) -> [u8; 8] {
    [SOCKS4_REPLY_VERSION, status, 0, 0, 0, 0, 0, 0]
}

/// Handle a SOCKS4/4a connection after the version byte
///
/// Unsupported commands and dial failures are answered with a rejection
/// before the error is returned.
pub async fn handle_socks4<S>(mut stream: S, peer: SocketAddr, ctx: &ProxyContext) -> Result<()>
where
    S: AsyncBufRead + AsyncWrite + Unpin + Send + 'static,
{
    let request = parse_socks4_request(&mut stream).await?;

    if request.command != SOCKS4_CMD_CONNECT {
        send_reply(&mut stream, SOCKS4_REPLY_REJECTED).await?;
        return Err(ProxyError::UnsupportedCommand(request.command));
    }

    let origin = match ctx.dialer.dial(&request.target).await {
        Ok(origin) => origin,
        Err(e) => {
            warn!("SOCKS4 connect from {} to {} failed: {}", peer, request.target, e);
            send_reply(&mut stream, SOCKS4_REPLY_REJECTED).await?;
            return Err(ProxyError::dial(&request.target, e));
        }
    };

    send_reply(&mut stream, SOCKS4_REPLY_GRANTED).await?;
    info!("SOCKS4 tunnel {} -> {} established", peer, request.target);

    relay_tcp(stream, origin).await;
    Ok(())
}

async fn send_reply<S>(stream: &mut S, status: u8) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&socks4_reply(status)).await?;
    stream.flush().await?;
    Ok(())
}
