//! UDP packet encoding/decoding for SOCKS5
//!
//! Handles the encapsulation format for UDP packets in SOCKS5.

use crate::error::{ProxyError, Result};
use crate::socks::consts::*;
use crate::socks::types::TargetAddr;
use bytes::{BufMut, Bytes, BytesMut};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Fixed part of the envelope: RSV(2) FRAG(1) ATYP(1)
const FIXED_HEADER_LEN: usize = 4;

/// UDP packet structure for SOCKS5
///
/// # UDP Request/Response Format
///
/// ```text
/// +----+------+------+----------+----------+----------+
/// |RSV | FRAG | ATYP | DST.ADDR | DST.PORT |   DATA   |
/// +----+------+------+----------+----------+----------+
/// | 2  |  1   |  1   | Variable |    2     | Variable |
/// +----+------+------+----------+----------+----------+
/// ```
#[derive(Debug, Clone)]
pub struct UdpPacket {
    /// Destination address
    pub addr: TargetAddr,
    /// The raw envelope header, up to and including DST.PORT
    pub header: Bytes,
    /// Packet data
    pub data: Bytes,
}

impl UdpPacket {
    /// Wrap a reply payload in a previously captured header
    pub fn encode_reply(header: &[u8], payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(header.len() + payload.len());
        buf.put_slice(header);
        buf.put_slice(payload);
        buf.freeze()
    }
}

/// Parse a UDP packet from bytes
///
/// Rejects short datagrams, non-zero reserved bytes, fragments and unknown
/// address types.
pub fn parse_udp_packet(datagram: &[u8]) -> Result<UdpPacket> {
    if datagram.len() < FIXED_HEADER_LEN {
        return Err(ProxyError::udp_packet(format!(
            "datagram too short: {} bytes",
            datagram.len()
        )));
    }

    if datagram[0] != 0 || datagram[1] != 0 {
        return Err(ProxyError::udp_packet(format!(
            "invalid RSV field: {:#04x}{:02x}",
            datagram[0], datagram[1]
        )));
    }

    let frag = datagram[2];
    if frag != 0 {
        return Err(ProxyError::udp_packet(format!(
            "fragmented datagram (frag {}) not supported",
            frag
        )));
    }

    let atyp = datagram[3];
    let (addr, addr_len) = parse_address_from_buf(atyp, &datagram[FIXED_HEADER_LEN..])?;

    let header_len = FIXED_HEADER_LEN + addr_len;
    let datagram = Bytes::copy_from_slice(datagram);

    Ok(UdpPacket {
        addr,
        header: datagram.slice(..header_len),
        data: datagram.slice(header_len..),
    })
}

/// Parse address from buffer, returning it with the bytes consumed
fn parse_address_from_buf(atyp: u8, buf: &[u8]) -> Result<(TargetAddr, usize)> {
    match atyp {
        SOCKS5_ADDR_TYPE_IPV4 => {
            if buf.len() < 6 {
                return Err(ProxyError::udp_packet("buffer too short for IPv4 address"));
            }
            let ip = Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]);
            let port = u16::from_be_bytes([buf[4], buf[5]]);
            Ok((TargetAddr::ipv4(ip, port), 6))
        }

        SOCKS5_ADDR_TYPE_DOMAIN => {
            let len = *buf
                .first()
                .ok_or_else(|| ProxyError::udp_packet("buffer too short for domain length"))?
                as usize;

            if len == 0 {
                return Err(ProxyError::udp_packet("empty domain name"));
            }
            if buf.len() < 1 + len + 2 {
                return Err(ProxyError::udp_packet("buffer too short for domain name"));
            }
            let domain = String::from_utf8(buf[1..1 + len].to_vec())
                .map_err(|_| ProxyError::udp_packet("invalid UTF-8 in domain"))?;
            let port = u16::from_be_bytes([buf[1 + len], buf[2 + len]]);
            Ok((TargetAddr::domain(domain, port), 1 + len + 2))
        }

        SOCKS5_ADDR_TYPE_IPV6 => {
            if buf.len() < 18 {
                return Err(ProxyError::udp_packet("buffer too short for IPv6 address"));
            }
            let mut ip_bytes = [0u8; 16];
            ip_bytes.copy_from_slice(&buf[..16]);
            let port = u16::from_be_bytes([buf[16], buf[17]]);
            Ok((TargetAddr::ipv6(Ipv6Addr::from(ip_bytes), port), 18))
        }

        _ => Err(ProxyError::udp_packet(format!(
            "unknown address type: {:#04x}",
            atyp
        ))),
    }
}
