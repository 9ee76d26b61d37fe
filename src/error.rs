//! Error types for Mixsocks
//!
//! This module defines the error taxonomy shared by every protocol handler,
//! together with the SOCKS5 reply codes and the mapping from dial failures
//! to those codes.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Result alias used by the protocol handlers
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Main error type for proxy operations
///
/// Every variant is local to one connection or one datagram; none of them
/// stops the listener loop.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Malformed or truncated input
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Unexpected protocol version byte
    #[error("Bad version: {0}")]
    BadVersion(u8),

    /// Valid version but the command is not implemented
    #[error("Unsupported command: {0}")]
    UnsupportedCommand(u8),

    /// The origin could not be reached
    #[error("Dial error to {target}: {source}")]
    Dial {
        /// Target that was dialed
        target: String,
        /// Underlying IO failure
        #[source]
        source: io::Error,
    },

    /// Mid-stream IO failure while relaying
    #[error("Relay error: {0}")]
    Relay(io::Error),

    /// Malformed UDP relay datagram
    #[error("UDP packet error: {0}")]
    UdpPacket(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ProxyError {
    /// Build a protocol error from anything printable
    pub fn protocol(msg: impl Into<String>) -> Self {
        ProxyError::Protocol(msg.into())
    }

    /// Build a dial error for `target`
    pub fn dial(target: impl ToString, source: io::Error) -> Self {
        ProxyError::Dial {
            target: target.to_string(),
            source,
        }
    }

    /// Build a UDP packet error
    pub fn udp_packet(msg: impl Into<String>) -> Self {
        ProxyError::UdpPacket(msg.into())
    }

    /// Turn a failed read of `what` into a protocol error
    ///
    /// Meant for `map_err` on request reads: a short or malformed request
    /// aborts the connection as a protocol violation.
    pub fn short_read(what: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |err| ProxyError::Protocol(format!("failed to read {}: {}", what, err))
    }
}

/// Reply codes for SOCKS5 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Socks5ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
}

impl From<Socks5ReplyCode> for u8 {
    fn from(code: Socks5ReplyCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for Socks5ReplyCode {
    type Error = ProxyError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Socks5ReplyCode::Succeeded),
            0x01 => Ok(Socks5ReplyCode::GeneralFailure),
            0x02 => Ok(Socks5ReplyCode::ConnectionNotAllowed),
            0x03 => Ok(Socks5ReplyCode::NetworkUnreachable),
            0x04 => Ok(Socks5ReplyCode::HostUnreachable),
            0x05 => Ok(Socks5ReplyCode::ConnectionRefused),
            0x06 => Ok(Socks5ReplyCode::TtlExpired),
            0x07 => Ok(Socks5ReplyCode::CommandNotSupported),
            0x08 => Ok(Socks5ReplyCode::AddressTypeNotSupported),
            other => Err(ProxyError::protocol(format!(
                "unassigned SOCKS5 reply code: {:#04x}",
                other
            ))),
        }
    }
}

impl From<&io::Error> for Socks5ReplyCode {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Socks5ReplyCode::ConnectionRefused,
            io::ErrorKind::TimedOut => Socks5ReplyCode::HostUnreachable,
            io::ErrorKind::AddrNotAvailable => Socks5ReplyCode::HostUnreachable,
            io::ErrorKind::PermissionDenied => Socks5ReplyCode::ConnectionNotAllowed,
            _ => Socks5ReplyCode::GeneralFailure,
        }
    }
}

/// How dial failures are turned into SOCKS5 reply codes
///
/// `Coarse` answers every failure with 0x05; `Detailed` distinguishes the
/// failure cause from the IO error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyCodeMapping {
    /// Always reply with 0x05
    #[default]
    Coarse,
    /// Map the IO error kind to 0x01-0x05
    Detailed,
}

impl ReplyCodeMapping {
    /// Reply code to send for a failed dial
    pub fn dial_failure(self, err: &io::Error) -> Socks5ReplyCode {
        match self {
            ReplyCodeMapping::Coarse => Socks5ReplyCode::ConnectionRefused,
            ReplyCodeMapping::Detailed => Socks5ReplyCode::from(err),
        }
    }
}
