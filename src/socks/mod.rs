//! SOCKS module for Mixsocks
//!
//! This module implements the SOCKS4/4a and SOCKS5 protocols on accepted
//! client streams, the stream relay shared by every CONNECT path, and the
//! SOCKS5 UDP relay.

mod auth;
mod command;
mod consts;
mod handler;
mod socks4;
mod tcp_relay;
mod types;
mod udp;

pub use auth::negotiate_auth;
pub use command::{build_reply, parse_request, reply_bytes, Socks5Request};
pub use consts::*;
pub use handler::handle_socks5;
pub use socks4::{handle_socks4, parse_socks4_request, socks4_reply, Socks4Request};
pub use tcp_relay::{relay_tcp, RelayStats};
pub use types::{SocksCommand, TargetAddr};
pub use udp::{association_source, parse_udp_packet, UdpManager, UdpPacket, UdpSession};
