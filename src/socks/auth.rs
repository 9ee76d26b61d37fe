//! SOCKS5 authentication negotiation
//!
//! Only the "no authentication required" method is offered. The client's
//! method list is read and discarded.

use super::consts::*;
use crate::error::{ProxyError, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Run the method negotiation on a stream whose version byte is consumed
///
/// # Negotiation Format
///
/// ```text
/// client: +----------+----------+      server: +----+--------+
///         | NMETHODS | METHODS  |              |VER | METHOD |
///         +----------+----------+              +----+--------+
///         |    1     | 1 to 255 |              | 1  |   1    |
///         +----------+----------+              +----+--------+
/// ```
///
/// The reply is always `05 00`.
pub async fn negotiate_auth<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let num_methods = stream
        .read_u8()
        .await
        .map_err(ProxyError::short_read("method count"))?;

    let mut methods = vec![0u8; num_methods as usize];
    stream
        .read_exact(&mut methods)
        .await
        .map_err(ProxyError::short_read("auth methods"))?;

    tracing::trace!("Client offered auth methods: {:?}", methods);

    stream
        .write_all(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NONE])
        .await?;
    stream.flush().await?;

    Ok(())
}
