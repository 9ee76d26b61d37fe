//! Stream relay
//!
//! Joins two byte streams into a Connection Pair: one task per direction,
//! each copying until EOF or error. Whichever direction finishes first
//! shuts its writer and signals its partner, so both streams always close
//! together.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::watch;
use tracing::debug;

/// Byte counts of a finished relay
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    /// Bytes copied from the client to the origin
    pub client_to_origin: u64,
    /// Bytes copied from the origin to the client
    pub origin_to_client: u64,
}

/// Relay data bidirectionally between `client` and `origin`
///
/// Spawns exactly two tasks and waits for both. IO errors in either
/// direction end the relay; they are logged and not surfaced.
pub async fn relay_tcp<A, B>(client: A, origin: B) -> RelayStats
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let (client_read, client_write) = tokio::io::split(client);
    let (origin_read, origin_write) = tokio::io::split(origin);

    let (upstream_done_tx, upstream_done_rx) = watch::channel(false);
    let (downstream_done_tx, downstream_done_rx) = watch::channel(false);

    let upstream = tokio::spawn(copy_half(
        client_read,
        origin_write,
        upstream_done_tx,
        downstream_done_rx,
        "client->origin",
    ));
    let downstream = tokio::spawn(copy_half(
        origin_read,
        client_write,
        downstream_done_tx,
        upstream_done_rx,
        "origin->client",
    ));

    let (up, down) = tokio::join!(upstream, downstream);

    RelayStats {
        client_to_origin: up.unwrap_or_default(),
        origin_to_client: down.unwrap_or_default(),
    }
}

/// Copy one direction until EOF, error, or the partner finishing
async fn copy_half<R, W>(
    mut reader: ReadHalf<R>,
    mut writer: WriteHalf<W>,
    done: watch::Sender<bool>,
    mut partner_done: watch::Receiver<bool>,
    direction: &'static str,
) -> u64
where
    R: AsyncRead,
    W: AsyncWrite,
{
    let mut copied = 0u64;
    let mut buf = vec![0u8; crate::helper::DEFAULT_BUFFER_SIZE];

    loop {
        tokio::select! {
            result = reader.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("{} reached EOF after {} bytes", direction, copied);
                        break;
                    }
                    Ok(n) => {
                        if let Err(e) = writer.write_all(&buf[..n]).await {
                            debug!("{} write error: {}", direction, e);
                            break;
                        }
                        copied += n as u64;
                    }
                    Err(e) => {
                        debug!("{} read error: {}", direction, e);
                        break;
                    }
                }
            }
            _ = partner_done.changed() => {
                debug!("{} closed by partner after {} bytes", direction, copied);
                break;
            }
        }
    }

    let _ = writer.shutdown().await;
    let _ = done.send(true);

    copied
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_relay_tcp_echo() {
        let (mut client_a, server_a) = duplex(1024);
        let (mut client_b, server_b) = duplex(1024);

        let relay_handle = tokio::spawn(relay_tcp(server_a, server_b));

        client_a.write_all(b"hello from a").await.unwrap();
        let mut buf = [0u8; 12];
        client_b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello from a");

        client_b.write_all(b"hello from b").await.unwrap();
        client_a.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello from b");

        drop(client_a);

        let stats = tokio::time::timeout(Duration::from_secs(1), relay_handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.client_to_origin, 12);
        assert_eq!(stats.origin_to_client, 12);
    }

    #[tokio::test]
    async fn test_relay_closes_both_sides() {
        let (client_a, server_a) = duplex(1024);
        let (mut client_b, server_b) = duplex(1024);

        let relay_handle = tokio::spawn(relay_tcp(server_a, server_b));

        // Closing the client must close the origin side as well
        drop(client_a);

        let mut rest = Vec::new();
        let n = tokio::time::timeout(Duration::from_secs(1), client_b.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);

        tokio::time::timeout(Duration::from_secs(1), relay_handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_relay_origin_close_unblocks_client_direction() {
        let (mut client_a, server_a) = duplex(1024);
        let (client_b, server_b) = duplex(1024);

        let relay_handle = tokio::spawn(relay_tcp(server_a, server_b));

        // The client never sends anything; only the origin goes away
        drop(client_b);

        let mut rest = Vec::new();
        tokio::time::timeout(Duration::from_secs(1), client_a.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(1), relay_handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats, RelayStats::default());
    }
}
