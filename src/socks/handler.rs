//! Main SOCKS5 handler
//!
//! Entry point for SOCKS5 connections once the dispatcher has consumed the
//! version byte. Runs the auth negotiation, parses the request and executes
//! CONNECT or UDP ASSOCIATE.

use super::auth::negotiate_auth;
use super::command::{build_reply, parse_request, send_command_not_supported};
use super::tcp_relay::relay_tcp;
use super::types::{SocksCommand, TargetAddr};
use super::udp::handle_udp_associate;
use crate::error::{ProxyError, Result, Socks5ReplyCode};
use crate::server::ProxyContext;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Handle SOCKS5 protocol on a stream
///
/// # Protocol Flow
///
/// 1. Authentication negotiation (always "no authentication")
/// 2. Request parsing
/// 3. Command execution (CONNECT or UDP ASSOCIATE)
///
/// # Arguments
///
/// * `stream` - The accepted client stream, version byte already read
/// * `peer` - Client address
/// * `ctx` - Shared proxy state
pub async fn handle_socks5<S>(mut stream: S, peer: SocketAddr, ctx: &ProxyContext) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    negotiate_auth(&mut stream).await?;
    debug!("SOCKS5 negotiation with {} done", peer);

    let request = parse_request(&mut stream).await?;

    match SocksCommand::from_byte(request.command) {
        Some(SocksCommand::Connect) => {
            info!("SOCKS5 CONNECT from {} to {}", peer, request.target);
            handle_connect(stream, request.target, peer, ctx).await
        }
        Some(SocksCommand::UdpAssociate) => {
            handle_udp_associate(stream, request.target, peer, ctx).await
        }
        unsupported => {
            let name = match unsupported {
                Some(command) => command.to_string(),
                None => format!("command {:#04x}", request.command),
            };
            warn!("SOCKS5 {} from {} not supported", name, peer);
            send_command_not_supported(&mut stream).await?;
            Err(ProxyError::UnsupportedCommand(request.command))
        }
    }
}

async fn handle_connect<S>(
    mut stream: S,
    target: TargetAddr,
    peer: SocketAddr,
    ctx: &ProxyContext,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let origin = match ctx.dialer.dial(&target).await {
        Ok(origin) => origin,
        Err(e) => {
            warn!("SOCKS5 connect from {} to {} failed: {}", peer, target, e);
            let code = ctx.config.socks.reply_mapping.dial_failure(&e);
            build_reply(&mut stream, code, None).await?;
            return Err(ProxyError::dial(&target, e));
        }
    };

    build_reply(&mut stream, Socks5ReplyCode::Succeeded, None).await?;
    info!("SOCKS5 tunnel {} -> {} established", peer, target);

    let stats = relay_tcp(stream, origin).await;
    debug!(
        "SOCKS5 tunnel {} -> {} closed: {} bytes up, {} bytes down",
        peer, target, stats.client_to_origin, stats.origin_to_client
    );

    Ok(())
}
