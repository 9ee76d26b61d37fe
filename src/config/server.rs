//! Server configuration types
//!
//! Defines the configuration structures for the mixed proxy listener and
//! its SOCKS, HTTP and UDP sub-systems.

use crate::error::ReplyCodeMapping;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1080
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_keepalive_secs() -> u64 {
    20
}

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// SOCKS4/SOCKS5 configuration
    #[serde(default)]
    pub socks: SocksConfig,

    /// HTTP proxy configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// UDP relay configuration
    #[serde(default)]
    pub udp: UdpConfig,
}

impl Config {
    /// Validate every section
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.http.validate()?;
        self.udp.validate()?;
        Ok(())
    }
}

/// Listener configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Listen host (name or literal IP)
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Set SO_REUSEPORT on the listener where the platform supports it
    #[serde(default = "default_true")]
    pub reuse_port: bool,

    /// Dial timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Enable TCP_NODELAY on dialed streams
    #[serde(default = "default_true")]
    pub nodelay: bool,

    /// TCP keepalive time for dialed streams, in seconds (0 disables)
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            reuse_port: true,
            connect_timeout: default_connect_timeout(),
            nodelay: true,
            keepalive_secs: default_keepalive_secs(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string to bind, with IPv6 literals bracketed
    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Dial timeout as a duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("server.host must not be empty".to_string());
        }
        if self.connect_timeout == 0 {
            return Err("server.connect_timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// SOCKS4/SOCKS5 configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SocksConfig {
    /// How SOCKS5 dial failures map to reply codes
    #[serde(default)]
    pub reply_mapping: ReplyCodeMapping,

    /// Release the UDP session when the ASSOCIATE control connection closes
    #[serde(default = "default_true")]
    pub teardown_udp_on_close: bool,
}

impl Default for SocksConfig {
    fn default() -> Self {
        Self {
            reply_mapping: ReplyCodeMapping::default(),
            teardown_udp_on_close: true,
        }
    }
}

fn default_max_request_line() -> usize {
    1024
}

/// HTTP proxy configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConfig {
    /// Request line cap in bytes; longer lines are truncated
    #[serde(default = "default_max_request_line")]
    pub max_request_line: usize,

    /// Answer a failed CONNECT dial with `502 Bad Gateway`
    #[serde(default = "default_true")]
    pub reply_on_dial_failure: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_request_line: default_max_request_line(),
            reply_on_dial_failure: true,
        }
    }
}

impl HttpConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_request_line == 0 {
            return Err("http.max_request_line must be greater than zero".to_string());
        }
        Ok(())
    }
}

fn default_udp_bind_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_udp_timeout() -> u64 {
    100
}

/// UDP relay configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UdpConfig {
    /// IP the shared UDP endpoint binds to
    #[serde(default = "default_udp_bind_ip")]
    pub bind_ip: String,

    /// Port of the shared UDP endpoint (0 reserves an ephemeral port)
    #[serde(default)]
    pub port: u16,

    /// Idle threshold in seconds after which a session is evicted
    #[serde(default = "default_udp_timeout")]
    pub idle_timeout: u64,

    /// Period of the idle sweep in seconds
    #[serde(default = "default_udp_timeout")]
    pub sweep_interval: u64,

    /// Per-attempt read deadline of a destination socket in seconds
    #[serde(default = "default_udp_timeout")]
    pub read_timeout: u64,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind_ip: default_udp_bind_ip(),
            port: 0,
            idle_timeout: default_udp_timeout(),
            sweep_interval: default_udp_timeout(),
            read_timeout: default_udp_timeout(),
        }
    }
}

impl UdpConfig {
    /// Parsed bind IP
    pub fn bind_ip(&self) -> Result<IpAddr, String> {
        self.bind_ip
            .parse()
            .map_err(|e| format!("invalid udp.bind_ip {:?}: {}", self.bind_ip, e))
    }

    /// Idle threshold as a duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }

    /// Sweep period as a duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }

    /// Reverse-read deadline as a duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        // ASSOCIATE replies advertise the endpoint as an IPv4 address
        if !self.bind_ip()?.is_ipv4() {
            return Err(format!("udp.bind_ip {:?} must be an IPv4 address", self.bind_ip));
        }
        if self.idle_timeout == 0 || self.sweep_interval == 0 || self.read_timeout == 0 {
            return Err("udp timeouts must be greater than zero".to_string());
        }
        Ok(())
    }
}
