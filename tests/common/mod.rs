//! Test utilities for Mixsocks
//!
//! This module provides common test utilities used across integration tests.

#![allow(dead_code)]

use mixsocks::config::Config;
use mixsocks::server::{ProxyContext, Server};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::{broadcast, oneshot};

/// A proxy running in the background
pub struct TestProxy {
    /// TCP listener address
    pub addr: SocketAddr,
    /// Shared UDP relay endpoint
    pub udp_addr: SocketAddr,
    /// State shared with the running server
    pub ctx: Arc<ProxyContext>,
    shutdown_tx: broadcast::Sender<bool>,
}

impl TestProxy {
    /// Connect a fresh client to the proxy
    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Proxy configuration bound to loopback on an OS-assigned port
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config
}

/// Start a proxy with the default test configuration
pub async fn start_proxy() -> TestProxy {
    start_proxy_with(test_config()).await
}

/// Start a proxy with a custom configuration
pub async fn start_proxy_with(config: Config) -> TestProxy {
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let udp_addr = server.udp_addr();
    let ctx = server.context();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(server.run(shutdown_rx));

    TestProxy {
        addr,
        udp_addr,
        ctx,
        shutdown_tx,
    }
}

/// Start a TCP server echoing every connection back
pub async fn start_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    addr
}

/// Start a UDP server echoing every datagram back to its sender
pub async fn start_udp_echo_server() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 65535];
        while let Ok((len, from)) = socket.recv_from(&mut buf).await {
            let _ = socket.send_to(&buf[..len], from).await;
        }
    });

    addr
}

/// Start an HTTP origin that captures the request head and answers once
///
/// The captured bytes (up to the blank line) are delivered on the returned
/// channel.
pub async fn start_http_origin(response: &'static [u8]) -> (SocketAddr, oneshot::Receiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            if socket.read_exact(&mut byte).await.is_err() {
                break;
            }
            head.push(byte[0]);
        }
        let _ = tx.send(head);
        let _ = socket.write_all(response).await;
    });

    (addr, rx)
}

/// An address nothing listens on
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Encode a SOCKS5 UDP envelope for an IPv4 destination
pub fn udp_envelope(dest: SocketAddr, payload: &[u8]) -> Vec<u8> {
    let SocketAddr::V4(dest) = dest else {
        panic!("IPv4 destination expected");
    };
    let mut datagram = vec![0x00, 0x00, 0x00, 0x01];
    datagram.extend_from_slice(&dest.ip().octets());
    datagram.extend_from_slice(&dest.port().to_be_bytes());
    datagram.extend_from_slice(payload);
    datagram
}
