//! UDP relay sessions
//!
//! A session is the relay context of one client source address. It owns one
//! connected outbound socket per destination, each drained by its own
//! reverse-read task that wraps replies back into the client's envelope.

use super::packet::UdpPacket;
use crate::helper::MAX_UDP_PACKET;
use crate::transport::bind_udp;
use bytes::Bytes;
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A dedicated socket towards one destination
struct OutboundSocket {
    socket: Arc<UdpSocket>,
    reader: JoinHandle<()>,
}

#[derive(Default)]
struct Destinations {
    /// Local address shared by the session's outbound sockets
    bound_local: Option<SocketAddr>,
    /// Keyed by the destination as the client wrote it, `dest:port`
    sockets: HashMap<String, OutboundSocket>,
}

/// Per-client UDP relay context
pub struct UdpSession {
    source: SocketAddr,
    epoch: Instant,
    last_active_ms: AtomicU64,
    destinations: Mutex<Destinations>,
}

impl UdpSession {
    /// Create a session for the client at `source`
    pub fn new(source: SocketAddr) -> Arc<Self> {
        Arc::new(UdpSession {
            source,
            epoch: Instant::now(),
            last_active_ms: AtomicU64::new(0),
            destinations: Mutex::new(Destinations::default()),
        })
    }

    /// Mark the session active now
    pub fn touch(&self) {
        let now = self.epoch.elapsed().as_millis() as u64;
        self.last_active_ms.fetch_max(now, Ordering::Relaxed);
    }

    /// Time since the last datagram in either direction
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_active_ms.load(Ordering::Relaxed));
        self.epoch.elapsed().saturating_sub(last)
    }

    /// Local address of the first outbound socket, if any was opened
    pub async fn bound_local(&self) -> Option<SocketAddr> {
        self.destinations.lock().await.bound_local
    }

    /// Number of open destination sockets
    pub async fn destination_count(&self) -> usize {
        self.destinations.lock().await.sockets.len()
    }

    /// Get the outbound socket for the packet's destination, opening it on
    /// first use
    ///
    /// A new socket is connected to the resolved destination, reuses the
    /// session's bound local address when the family matches, and gets a
    /// reverse-read task that sends replies to the client through `inbound`.
    ///
    /// Name resolution runs without the destination lock held; the lookup
    /// is repeated under the lock so concurrent first datagrams to one
    /// destination still share a single socket.
    pub async fn socket_for(
        self: &Arc<Self>,
        packet: &UdpPacket,
        inbound: &Arc<UdpSocket>,
        read_timeout: Duration,
    ) -> io::Result<Arc<UdpSocket>> {
        let key = packet.addr.to_string();

        if let Some(socket) = self.existing(&key).await {
            return Ok(socket);
        }

        let remote = packet.addr.resolve().await?;

        let mut destinations = self.destinations.lock().await;
        if let Some(outbound) = destinations.sockets.get(&key) {
            return Ok(outbound.socket.clone());
        }

        let socket = Arc::new(open_outbound(destinations.bound_local, remote).await?);
        let local = socket.local_addr()?;

        if destinations.bound_local.is_none() {
            destinations.bound_local = Some(local);
        }

        debug!(
            "UDP session {}: opened {} -> {} for {}",
            self.source, local, remote, key
        );

        let reader = tokio::spawn(reverse_read(
            Arc::downgrade(self),
            key.clone(),
            socket.clone(),
            inbound.clone(),
            packet.header.clone(),
            read_timeout,
        ));

        destinations.sockets.insert(
            key,
            OutboundSocket {
                socket: socket.clone(),
                reader,
            },
        );

        Ok(socket)
    }

    async fn existing(&self, key: &str) -> Option<Arc<UdpSocket>> {
        let destinations = self.destinations.lock().await;
        destinations
            .sockets
            .get(key)
            .map(|outbound| outbound.socket.clone())
    }

    /// Drop the destination socket for `key` if it is still `socket`
    pub async fn remove_destination(&self, key: &str, socket: &Arc<UdpSocket>) -> bool {
        let mut destinations = self.destinations.lock().await;

        let current = match destinations.sockets.get(key) {
            Some(outbound) => Arc::ptr_eq(&outbound.socket, socket),
            None => false,
        };

        if current {
            if let Some(outbound) = destinations.sockets.remove(key) {
                outbound.reader.abort();
            }
            debug!("UDP session {}: closed socket for {}", self.source, key);
        }

        current
    }

    /// Close every destination socket of this session
    pub async fn close(&self) {
        let mut destinations = self.destinations.lock().await;
        for (_, outbound) in destinations.sockets.drain() {
            outbound.reader.abort();
        }
    }
}

/// Bind and connect an outbound socket towards `remote`
async fn open_outbound(bound_local: Option<SocketAddr>, remote: SocketAddr) -> io::Result<UdpSocket> {
    let local = match bound_local {
        Some(local) if local.is_ipv4() == remote.is_ipv4() => local,
        _ => SocketAddr::new(unspecified_for(&remote), 0),
    };

    let socket = match bind_udp(local, true) {
        Ok(socket) => socket,
        Err(e) if local.port() != 0 => {
            debug!("Cannot share local address {}: {}, using a fresh port", local, e);
            bind_udp(SocketAddr::new(local.ip(), 0), true)?
        }
        Err(e) => return Err(e),
    };

    socket.connect(remote).await?;
    Ok(socket)
}

fn unspecified_for(addr: &SocketAddr) -> IpAddr {
    match addr {
        SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}

/// Forward replies from one destination back to the client
///
/// Ends on a read timeout or error and removes its own socket from the
/// session.
async fn reverse_read(
    session: Weak<UdpSession>,
    key: String,
    outbound: Arc<UdpSocket>,
    inbound: Arc<UdpSocket>,
    header: Bytes,
    read_timeout: Duration,
) {
    let mut buf = vec![0u8; MAX_UDP_PACKET];

    loop {
        let len = match tokio::time::timeout(read_timeout, outbound.recv(&mut buf)).await {
            Ok(Ok(len)) => len,
            Ok(Err(e)) => {
                debug!("UDP reverse read for {} failed: {}", key, e);
                break;
            }
            Err(_) => {
                debug!("UDP reverse read for {} timed out", key);
                break;
            }
        };

        let Some(live) = session.upgrade() else {
            return;
        };

        let reply = UdpPacket::encode_reply(&header, &buf[..len]);
        if let Err(e) = inbound.send_to(&reply, live.source).await {
            warn!("UDP reply to {} failed: {}", live.source, e);
        }
        live.touch();
    }

    if let Some(session) = session.upgrade() {
        // Detach first: removing our own entry would abort this task
        let _ = tokio::spawn(async move {
            session.remove_destination(&key, &outbound).await;
        });
    }
}
