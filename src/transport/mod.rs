//! Transport module for Mixsocks
//!
//! This module owns every socket the proxy creates: the listening TCP
//! endpoint, the outbound UDP sockets of the relay, and outbound TCP dials
//! through the [`Dialer`] trait.

mod tcp;

pub use tcp::TcpDialer;

use crate::config::ServerConfig;
use crate::socks::TargetAddr;
use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, TcpKeepalive, Type};
use std::fmt::Debug;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, UdpSocket};

/// Listen backlog for the proxy port
const LISTEN_BACKLOG: i32 = 1024;

/// Socket options for dialed connections
#[derive(Debug, Clone)]
pub struct SocketOpts {
    /// Enable TCP_NODELAY
    pub nodelay: bool,
    /// TCP keepalive time
    pub keepalive_secs: Option<u64>,
}

impl Default for SocketOpts {
    fn default() -> Self {
        SocketOpts {
            nodelay: true,
            keepalive_secs: Some(20),
        }
    }
}

impl SocketOpts {
    /// Create socket options from the server config
    pub fn from_server_config(config: &ServerConfig) -> Self {
        SocketOpts {
            nodelay: config.nodelay,
            keepalive_secs: (config.keepalive_secs > 0).then_some(config.keepalive_secs),
        }
    }

    /// Apply socket options to a TCP stream
    pub fn apply(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(self.nodelay)?;

        if let Some(secs) = self.keepalive_secs {
            let socket = socket2::SockRef::from(stream);
            let keepalive = TcpKeepalive::new().with_time(Duration::from_secs(secs));
            socket.set_tcp_keepalive(&keepalive)?;
        }

        Ok(())
    }
}

/// Outbound TCP connector used by every CONNECT path
#[async_trait]
pub trait Dialer: Debug + Send + Sync {
    /// Connect to `target`, resolving domain names at dial time
    async fn dial(&self, target: &TargetAddr) -> io::Result<TcpStream>;
}

/// Bind the proxy's listening socket
///
/// `addr` may name a host (`localhost:1080`); the first resolved address is
/// used. SO_REUSEADDR is always set, SO_REUSEPORT when `reuse_port` is on
/// and the platform has it.
pub async fn bind_listener(addr: &str, reuse_port: bool) -> io::Result<TcpListener> {
    let addr = tokio::net::lookup_host(addr).await?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no address found for {}", addr),
        )
    })?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    set_reuse_port(&socket, reuse_port)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    TcpListener::from_std(socket.into())
}

/// Bind a UDP socket on `local`
///
/// With `shared` set the socket carries SO_REUSEADDR/SO_REUSEPORT so several
/// connected sockets can share one local address.
pub fn bind_udp(local: SocketAddr, shared: bool) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(local), Type::DGRAM, Some(Protocol::UDP))?;
    if shared {
        socket.set_reuse_address(true)?;
        set_reuse_port(&socket, true)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&local.into())?;

    UdpSocket::from_std(socket.into())
}

#[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
fn set_reuse_port(socket: &Socket, enable: bool) -> io::Result<()> {
    if enable {
        socket.set_reuse_port(true)?;
    }
    Ok(())
}

#[cfg(not(all(unix, not(any(target_os = "solaris", target_os = "illumos")))))]
fn set_reuse_port(_socket: &Socket, _enable: bool) -> io::Result<()> {
    Ok(())
}
