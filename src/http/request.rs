//! HTTP request-line parsing
//!
//! Only the request line is interpreted; headers and bodies are relayed
//! untouched.

use crate::error::{ProxyError, Result};
use crate::socks::TargetAddr;

/// Port used when an absolute URI names none
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// The three tokens of an HTTP request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    /// Request method, e.g. `GET` or `CONNECT`
    pub method: String,
    /// Request target as sent by the client
    pub target: String,
    /// Protocol version, e.g. `HTTP/1.1`
    pub version: String,
}

impl RequestLine {
    /// Split a request line on spaces
    ///
    /// The trailing CRLF is ignored. Fewer than three tokens is a protocol
    /// error.
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.trim_end_matches(['\r', '\n']).split_whitespace();

        match (parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(target), Some(version)) => Ok(RequestLine {
                method: method.to_string(),
                target: target.to_string(),
                version: version.to_string(),
            }),
            _ => Err(ProxyError::protocol(format!(
                "malformed request line: {:?}",
                line.trim_end()
            ))),
        }
    }

    /// Whether this is a CONNECT request
    pub fn is_connect(&self) -> bool {
        self.method == "CONNECT"
    }

    /// The line sent to the origin for a forwarded request
    pub fn origin_form(&self, path: &str) -> String {
        format!("{} {} {}\r\n", self.method, path, self.version)
    }
}

/// Parse a CONNECT target of the form `host:port`
///
/// IPv6 literals are written bracketed, `[::1]:443`.
pub fn parse_authority(authority: &str) -> Result<TargetAddr> {
    let (host, port) = authority
        .rsplit_once(':')
        .filter(|(host, _)| !host.is_empty() && (!host.contains(':') || host.ends_with(']')))
        .ok_or_else(|| ProxyError::protocol(format!("missing port in {:?}", authority)))?;

    let port = port
        .parse::<u16>()
        .map_err(|_| ProxyError::protocol(format!("invalid port in {:?}", authority)))?;

    Ok(TargetAddr::domain(host.to_string(), port))
}

/// Split an absolute URI into the origin to dial and the path to request
///
/// `http://example.com:8080/index.html?q=1` yields `example.com:8080` and
/// `/index.html?q=1`. A missing port defaults to 80, a missing path to `/`.
pub fn parse_absolute_uri(uri: &str) -> Result<(TargetAddr, String)> {
    let (_, rest) = uri
        .split_once("://")
        .ok_or_else(|| ProxyError::protocol(format!("not an absolute URI: {:?}", uri)))?;

    let (authority, path) = match rest.find(['/', '?']) {
        Some(idx) if rest[idx..].starts_with('/') => (&rest[..idx], rest[idx..].to_string()),
        Some(idx) => (&rest[..idx], format!("/{}", &rest[idx..])),
        None => (rest, "/".to_string()),
    };

    // Drop any userinfo
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);

    if authority.is_empty() {
        return Err(ProxyError::protocol(format!("no host in URI: {:?}", uri)));
    }

    let has_port = match authority.rfind(']') {
        Some(bracket) => authority[bracket..].contains(':'),
        None => authority.contains(':'),
    };

    let target = if has_port {
        parse_authority(authority)?
    } else {
        TargetAddr::domain(authority.to_string(), DEFAULT_HTTP_PORT)
    };

    Ok((target, path))
}
