//! SOCKS5 UDP ASSOCIATE command
//!
//! Answers with the shared UDP endpoint and then holds the control
//! connection open until the client closes it.

use crate::error::{Result, Socks5ReplyCode};
use crate::server::ProxyContext;
use crate::socks::command::build_reply;
use crate::socks::types::TargetAddr;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

/// Handle UDP ASSOCIATE on the control connection
///
/// # Arguments
///
/// * `stream` - The control connection
/// * `requested` - DST.ADDR/DST.PORT from the request, the client's
///   expected UDP source
/// * `peer` - Address of the control connection's client
/// * `ctx` - Shared proxy state
pub async fn handle_udp_associate<S>(
    mut stream: S,
    requested: TargetAddr,
    peer: SocketAddr,
    ctx: &ProxyContext,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let relay_addr = ctx.udp.local_addr();
    build_reply(&mut stream, Socks5ReplyCode::Succeeded, Some(relay_addr)).await?;

    info!("SOCKS5 UDP ASSOCIATE for {} via {}", peer, relay_addr);

    // Anything the client sends on the control connection is discarded
    match tokio::io::copy(&mut stream, &mut tokio::io::sink()).await {
        Ok(bytes) => debug!("UDP control connection of {} closed ({} bytes)", peer, bytes),
        Err(e) => debug!("UDP control connection of {} failed: {}", peer, e),
    }

    if ctx.config.socks.teardown_udp_on_close {
        if let Some(source) = association_source(&requested, peer) {
            ctx.udp.release(source).await;
        }
    }

    Ok(())
}

/// Client UDP source named by an ASSOCIATE request
///
/// An unspecified address (or a domain) stands for the control peer's IP.
/// Port 0 means the client did not know its source, so no session can be
/// tied to the control connection.
pub fn association_source(requested: &TargetAddr, peer: SocketAddr) -> Option<SocketAddr> {
    match requested {
        TargetAddr::Ip(addr) if addr.port() != 0 => {
            let ip = if addr.ip().is_unspecified() {
                peer.ip()
            } else {
                addr.ip()
            };
            Some(SocketAddr::new(ip, addr.port()))
        }
        TargetAddr::Domain(_, port) if *port != 0 => Some(SocketAddr::new(peer.ip(), *port)),
        _ => None,
    }
}
