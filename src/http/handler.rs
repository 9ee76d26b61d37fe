//! HTTP proxy handler
//!
//! Serves `CONNECT host:port` tunnels and forwards absolute-URI requests
//! after rewriting the request line to origin form.

use super::request::{parse_absolute_uri, parse_authority, RequestLine};
use crate::error::{ProxyError, Result};
use crate::helper::read_line_bounded;
use crate::server::ProxyContext;
use crate::socks::{relay_tcp, TargetAddr};
use std::net::SocketAddr;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Response sent once a CONNECT tunnel is up
pub const CONNECT_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";

/// Response sent when a CONNECT target cannot be reached
pub const BAD_GATEWAY: &[u8] = b"HTTP/1.1 502 Bad Gateway\r\n\r\n";

/// Handle an HTTP proxy request
///
/// # Arguments
///
/// * `stream` - The client stream, buffered
/// * `first_byte` - The request-line byte consumed by the dispatcher
/// * `peer` - Client address
/// * `ctx` - Shared proxy state
pub async fn handle_http<S>(
    mut stream: S,
    first_byte: u8,
    peer: SocketAddr,
    ctx: &ProxyContext,
) -> Result<()>
where
    S: AsyncBufRead + AsyncWrite + Unpin + Send + 'static,
{
    let limit = ctx.config.http.max_request_line;
    let request = read_request_line(&mut stream, first_byte, limit).await?;

    if request.is_connect() {
        let target = parse_authority(&request.target)?;
        drain_headers(&mut stream, limit).await?;
        info!("HTTP CONNECT from {} to {}", peer, target);
        handle_connect(stream, target, peer, ctx).await
    } else {
        let (target, path) = parse_absolute_uri(&request.target)?;
        info!("HTTP {} from {} to {}{}", request.method, peer, target, path);
        handle_forward(stream, target, request.origin_form(&path), peer, ctx).await
    }
}

/// Read the rest of the request line and prepend the sniffed byte
///
/// Lines longer than `limit` are cut at the limit; the remainder stays on
/// the stream.
async fn read_request_line<S>(stream: &mut S, first_byte: u8, limit: usize) -> Result<RequestLine>
where
    S: AsyncBufRead + Unpin,
{
    let mut line = vec![first_byte];
    line.extend(read_line_bounded(stream, limit.saturating_sub(1)).await?);

    RequestLine::parse(&String::from_utf8_lossy(&line))
}

/// Discard header lines up to and including the empty line
///
/// Headers are read in chunks of at most `limit` bytes. Only a chunk that
/// starts a line and holds the whole line counts as the empty line, so the
/// tail of an overlong header never ends the block.
async fn drain_headers<S>(stream: &mut S, limit: usize) -> Result<()>
where
    S: AsyncBufRead + Unpin,
{
    // "\r\n" must fit in one chunk
    let limit = limit.max(2);
    let mut at_line_start = true;

    loop {
        let chunk = read_line_bounded(stream, limit).await?;
        if chunk.is_empty() {
            return Err(ProxyError::protocol("connection closed inside headers"));
        }

        if at_line_start && matches!(chunk.as_slice(), b"\r\n" | b"\n") {
            return Ok(());
        }
        at_line_start = chunk.ends_with(b"\n");
    }
}

async fn handle_connect<S>(
    mut stream: S,
    target: TargetAddr,
    peer: SocketAddr,
    ctx: &ProxyContext,
) -> Result<()>
where
    S: AsyncBufRead + AsyncWrite + Unpin + Send + 'static,
{
    let origin = match ctx.dialer.dial(&target).await {
        Ok(origin) => origin,
        Err(e) => {
            warn!("HTTP CONNECT from {} to {} failed: {}", peer, target, e);
            if ctx.config.http.reply_on_dial_failure {
                stream.write_all(BAD_GATEWAY).await?;
                stream.flush().await?;
            }
            return Err(ProxyError::dial(&target, e));
        }
    };

    stream.write_all(CONNECT_ESTABLISHED).await?;
    stream.flush().await?;

    relay(stream, origin, peer, &target).await;
    Ok(())
}

async fn handle_forward<S>(
    stream: S,
    target: TargetAddr,
    request_line: String,
    peer: SocketAddr,
    ctx: &ProxyContext,
) -> Result<()>
where
    S: AsyncBufRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut origin = ctx
        .dialer
        .dial(&target)
        .await
        .map_err(|e| ProxyError::dial(&target, e))?;

    origin.write_all(request_line.as_bytes()).await?;

    relay(stream, origin, peer, &target).await;
    Ok(())
}

async fn relay<S>(stream: S, origin: TcpStream, peer: SocketAddr, target: &TargetAddr)
where
    S: AsyncBufRead + AsyncWrite + Unpin + Send + 'static,
{
    let stats = relay_tcp(stream, origin).await;
    debug!(
        "HTTP tunnel {} -> {} closed: {} bytes up, {} bytes down",
        peer, target, stats.client_to_origin, stats.origin_to_client
    );
}
