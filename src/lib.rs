//! # Mixsocks - SOCKS4/SOCKS5/HTTP Proxy on One Port
//!
//! Mixsocks is a proxy server that serves SOCKS4/4a, SOCKS5 and HTTP proxy
//! clients from a single listening port. The protocol of every connection
//! is detected from its first byte.
//!
//! ## Features
//!
//! - **Protocol Sniffing**: `0x04` is SOCKS4, `0x05` is SOCKS5, anything else HTTP
//! - **SOCKS4/4a CONNECT**: including domain targets via `0.0.0.x`
//! - **SOCKS5 CONNECT and UDP ASSOCIATE**: no-auth only
//! - **HTTP Proxy**: `CONNECT` tunnels and absolute-URI forwarding
//! - **UDP Relay**: per-client sessions with lazy per-destination sockets
//!   and idle eviction
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mixsocks::config::load_config;
//! use mixsocks::server::Server;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("config.toml")?;
//!     let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     Server::bind(config).await?.run(shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//!                    +-> SOCKS4 handler -+
//! Client -> Listener +-> SOCKS5 handler -+-> Relay -> Target
//!                    +-> HTTP handler ---+
//!
//! UDP client <-> shared UDP endpoint <-> per-destination sockets <-> Target
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod helper;
pub mod http;
pub mod server;
pub mod socks;
pub mod transport;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use error::{ProxyError, Socks5ReplyCode};
pub use server::{ProxyContext, Server};

/// Version of the Mixsocks library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
