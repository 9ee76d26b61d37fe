//! UDP association manager
//!
//! Owns the shared UDP endpoint advertised in UDP ASSOCIATE replies and the
//! table of per-client sessions. One ingress task reads the endpoint and
//! hands every datagram to its own task, so a slow lookup for one
//! destination never holds up the others. A sweep task evicts idle
//! sessions.

use super::packet::parse_udp_packet;
use super::session::UdpSession;
use crate::config::UdpConfig;
use crate::error::{ProxyError, Result};
use crate::helper::{reserve_ephemeral_port, MAX_UDP_PACKET};
use bytes::Bytes;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Shared UDP endpoint and session table
pub struct UdpManager {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    sessions: Mutex<HashMap<SocketAddr, Arc<UdpSession>>>,
    idle_timeout: Duration,
    sweep_interval: Duration,
    read_timeout: Duration,
}

impl UdpManager {
    /// Bind the shared endpoint described by `config`
    ///
    /// Port 0 reserves an ephemeral port first and falls back to letting the
    /// kernel pick one if the reservation was lost.
    pub async fn bind(config: &UdpConfig) -> io::Result<Self> {
        let ip = config
            .bind_ip()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let socket = if config.port != 0 {
            UdpSocket::bind((ip, config.port)).await?
        } else {
            let port = reserve_ephemeral_port(ip)?;
            match UdpSocket::bind((ip, port)).await {
                Ok(socket) => socket,
                Err(e) => {
                    debug!("Reserved UDP port {} unavailable: {}", port, e);
                    UdpSocket::bind((ip, 0)).await?
                }
            }
        };

        let local_addr = socket.local_addr()?;

        Ok(UdpManager {
            socket: Arc::new(socket),
            local_addr,
            sessions: Mutex::new(HashMap::new()),
            idle_timeout: config.idle_timeout(),
            sweep_interval: config.sweep_interval(),
            read_timeout: config.read_timeout(),
        })
    }

    /// Address of the shared endpoint
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start the ingress loop and the idle sweep
    ///
    /// Both tasks stop when `shutdown_rx` fires.
    pub fn spawn(self: &Arc<Self>, shutdown_rx: broadcast::Receiver<bool>) -> Vec<JoinHandle<()>> {
        info!("UDP relay listening on {}", self.local_addr);

        let sweep_shutdown = shutdown_rx.resubscribe();
        vec![
            tokio::spawn(self.clone().run_ingress(shutdown_rx)),
            tokio::spawn(self.clone().run_sweep(sweep_shutdown)),
        ]
    }

    async fn run_ingress(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<bool>) {
        let mut buf = vec![0u8; MAX_UDP_PACKET];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, source)) => {
                            let manager = self.clone();
                            let datagram = Bytes::copy_from_slice(&buf[..len]);
                            tokio::spawn(async move {
                                if let Err(e) = manager.handle_datagram(source, &datagram).await {
                                    warn!("Dropped UDP datagram from {}: {}", source, e);
                                }
                            });
                        }
                        Err(e) => {
                            // ICMP errors surface here on some platforms
                            debug!("UDP endpoint recv error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("UDP ingress loop stopping");
                    break;
                }
            }
        }
    }

    async fn run_sweep(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.sweep_interval);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let evicted = self.sweep_idle().await;
                    if evicted > 0 {
                        debug!("Evicted {} idle UDP sessions", evicted);
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("UDP sweep stopping");
                    break;
                }
            }
        }
    }

    /// Relay one datagram received on the shared endpoint from `source`
    ///
    /// Malformed datagrams fail with [`ProxyError::UdpPacket`] before any
    /// session state is touched.
    pub async fn handle_datagram(&self, source: SocketAddr, datagram: &[u8]) -> Result<()> {
        let packet = parse_udp_packet(datagram)?;
        let session = self.session_for(source).await;

        let outbound = session
            .socket_for(&packet, &self.socket, self.read_timeout)
            .await
            .map_err(|e| ProxyError::dial(&packet.addr, e))?;

        if let Err(e) = outbound.send(&packet.data).await {
            session
                .remove_destination(&packet.addr.to_string(), &outbound)
                .await;
            return Err(ProxyError::Relay(e));
        }

        session.touch();

        debug!(
            "UDP {} -> {}: {} bytes",
            source,
            packet.addr,
            packet.data.len()
        );

        Ok(())
    }

    async fn session_for(&self, source: SocketAddr) -> Arc<UdpSession> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(source)
            .or_insert_with(|| {
                debug!("New UDP session for {}", source);
                UdpSession::new(source)
            })
            .clone()
    }

    /// Evict every session idle for longer than the threshold
    ///
    /// Returns the number of sessions removed.
    pub async fn sweep_idle(&self) -> usize {
        let evicted: Vec<Arc<UdpSession>> = {
            let mut sessions = self.sessions.lock().await;
            let idle: Vec<SocketAddr> = sessions
                .iter()
                .filter(|(_, session)| session.idle_for() > self.idle_timeout)
                .map(|(source, _)| *source)
                .collect();
            idle.iter().filter_map(|source| sessions.remove(source)).collect()
        };

        for session in &evicted {
            session.close().await;
        }

        evicted.len()
    }

    /// Tear down the session of `source`, if one exists
    pub async fn release(&self, source: SocketAddr) -> bool {
        let session = self.sessions.lock().await.remove(&source);

        match session {
            Some(session) => {
                session.close().await;
                debug!("Released UDP session for {}", source);
                true
            }
            None => false,
        }
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Number of destination sockets held by the session of `source`
    pub async fn destination_count(&self, source: SocketAddr) -> usize {
        let session = self.sessions.lock().await.get(&source).cloned();
        match session {
            Some(session) => session.destination_count().await,
            None => 0,
        }
    }
}
