//! SOCKS5 UDP relay
//!
//! Envelope parsing, per-client sessions and the manager that owns the
//! shared UDP endpoint.

mod associate;
mod manager;
mod packet;
mod session;

pub use associate::{association_source, handle_udp_associate};
pub use manager::UdpManager;
pub use packet::{parse_udp_packet, UdpPacket};
pub use session::UdpSession;
