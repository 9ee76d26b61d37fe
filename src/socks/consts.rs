//! SOCKS protocol constants
//!
//! Defines all constants used in the SOCKS4/4a and SOCKS5 implementations.

/// SOCKS4 protocol version
pub const SOCKS4_VERSION: u8 = 0x04;

/// SOCKS4 reply version byte (always null)
pub const SOCKS4_REPLY_VERSION: u8 = 0x00;

/// SOCKS4 CONNECT command
pub const SOCKS4_CMD_CONNECT: u8 = 0x01;

/// SOCKS4 request granted
pub const SOCKS4_REPLY_GRANTED: u8 = 0x5A;
/// SOCKS4 request rejected or failed
pub const SOCKS4_REPLY_REJECTED: u8 = 0x5B;

/// Longest SOCKS4 user id or SOCKS4a domain accepted
pub const SOCKS4_MAX_FIELD_LEN: usize = 255;

/// SOCKS5 protocol version
pub const SOCKS5_VERSION: u8 = 0x05;

// Authentication methods
/// No authentication required
pub const SOCKS5_AUTH_METHOD_NONE: u8 = 0x00;

// Commands
/// TCP CONNECT command
pub const SOCKS5_CMD_TCP_CONNECT: u8 = 0x01;
/// TCP BIND command (not implemented)
pub const SOCKS5_CMD_TCP_BIND: u8 = 0x02;
/// UDP ASSOCIATE command
pub const SOCKS5_CMD_UDP_ASSOCIATE: u8 = 0x03;

// Address types
/// IPv4 address
pub const SOCKS5_ADDR_TYPE_IPV4: u8 = 0x01;
/// Domain name
pub const SOCKS5_ADDR_TYPE_DOMAIN: u8 = 0x03;
/// IPv6 address
pub const SOCKS5_ADDR_TYPE_IPV6: u8 = 0x04;

// Reserved byte
/// Reserved byte value (always 0x00)
pub const SOCKS5_RESERVED: u8 = 0x00;
