//! Proxy server
//!
//! Accepts connections on the shared port and hands each one to the
//! handler picked by the dispatcher, one task per connection.

use crate::config::Config;
use crate::dispatch::{sniff, Protocol};
use crate::error::{ProxyError, Result};
use crate::http::handle_http;
use crate::socks::{handle_socks4, handle_socks5, UdpManager};
use crate::transport::{bind_listener, Dialer, TcpDialer};
use anyhow::Context;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// State shared by every connection
pub struct ProxyContext {
    /// Loaded configuration
    pub config: Config,
    /// Outbound connector for CONNECT and forwarded requests
    pub dialer: Arc<dyn Dialer>,
    /// SOCKS5 UDP relay
    pub udp: Arc<UdpManager>,
}

impl ProxyContext {
    /// Build the shared state, binding the UDP relay endpoint
    pub async fn new(config: Config) -> io::Result<Self> {
        let udp = UdpManager::bind(&config.udp).await?;
        let dialer = TcpDialer::from_config(&config.server);

        Ok(ProxyContext {
            config,
            dialer: Arc::new(dialer),
            udp: Arc::new(udp),
        })
    }
}

/// The mixed SOCKS4/SOCKS5/HTTP proxy server
pub struct Server {
    listener: TcpListener,
    ctx: Arc<ProxyContext>,
}

impl Server {
    /// Bind the listening port and the UDP relay endpoint
    ///
    /// The configuration is validated first, so CLI overrides applied after
    /// loading are checked as well.
    pub async fn bind(config: Config) -> anyhow::Result<Self> {
        config.validate().map_err(ProxyError::Config)?;

        let listen_addr = config.server.listen_addr();
        let listener = bind_listener(&listen_addr, config.server.reuse_port)
            .await
            .with_context(|| format!("Failed to listen on {}", listen_addr))?;

        let ctx = ProxyContext::new(config)
            .await
            .with_context(|| "Failed to bind UDP relay endpoint")?;

        Ok(Server {
            listener,
            ctx: Arc::new(ctx),
        })
    }

    /// Address of the TCP listener
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Address of the shared UDP endpoint
    pub fn udp_addr(&self) -> SocketAddr {
        self.ctx.udp.local_addr()
    }

    /// Shared state handed to every connection
    pub fn context(&self) -> Arc<ProxyContext> {
        self.ctx.clone()
    }

    /// Run the accept loop until shutdown
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<bool>) -> anyhow::Result<()> {
        let udp_tasks = self.ctx.udp.spawn(shutdown_rx.resubscribe());

        info!("Proxy listening on {}", self.listener.local_addr()?);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let ctx = self.ctx.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, peer, ctx).await {
                                    match e {
                                        ProxyError::Dial { .. } => debug!("Connection from {} ended: {}", peer, e),
                                        _ => warn!("Connection from {} failed: {}", peer, e),
                                    }
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        for task in udp_tasks {
            let _ = task.await;
        }

        info!("Server stopped");
        Ok(())
    }
}

/// Serve one accepted connection
///
/// Reads the dispatch byte and runs the matching protocol handler to
/// completion.
pub async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    ctx: Arc<ProxyContext>,
) -> Result<()> {
    let protocol = sniff(&mut stream).await?;
    debug!("Connection from {} speaks {}", peer, protocol);

    match protocol {
        Protocol::Socks4 => handle_socks4(BufReader::new(stream), peer, &ctx).await,
        Protocol::Socks5 => handle_socks5(stream, peer, &ctx).await,
        Protocol::Http(first_byte) => {
            handle_http(BufReader::new(stream), first_byte, peer, &ctx).await
        }
    }
}
