//! TCP dialer
//!
//! Provides plain TCP connections to proxy targets.

use super::{Dialer, SocketOpts};
use crate::config::ServerConfig;
use crate::socks::TargetAddr;
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;

/// Dialer for plain TCP connections
#[derive(Debug, Clone)]
pub struct TcpDialer {
    /// Socket options to apply to connections
    socket_opts: SocketOpts,
    /// Connection timeout
    connect_timeout: Duration,
}

impl TcpDialer {
    /// Create a new TCP dialer with default options
    pub fn with_defaults() -> Self {
        TcpDialer {
            socket_opts: SocketOpts::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Create a dialer from the server config
    pub fn from_config(config: &ServerConfig) -> Self {
        TcpDialer {
            socket_opts: SocketOpts::from_server_config(config),
            connect_timeout: config.connect_timeout(),
        }
    }

    /// Set socket options
    pub fn with_socket_opts(mut self, opts: SocketOpts) -> Self {
        self.socket_opts = opts;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, target: &TargetAddr) -> io::Result<TcpStream> {
        let connect = async {
            match target {
                TargetAddr::Ip(addr) => TcpStream::connect(addr).await,
                TargetAddr::Domain(host, port) => TcpStream::connect((host.as_str(), *port)).await,
            }
        };

        let stream = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connection timeout to {}", target),
                )
            })??;

        if let Err(e) = self.socket_opts.apply(&stream) {
            tracing::warn!("Failed to apply socket options: {}", e);
        }

        tracing::debug!("TCP connection established to {}", target);

        Ok(stream)
    }
}
