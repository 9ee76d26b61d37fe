//! Configuration module for Mixsocks
//!
//! This module provides configuration types and parsing for the proxy.

mod server;

pub use server::{Config, HttpConfig, ServerConfig, SocksConfig, UdpConfig};

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config =
        toml::from_str(content).with_context(|| "Failed to parse configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReplyCodeMapping;
    use std::io::Write;

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config("").unwrap();
        assert_eq!(config.server.port, 1080);
        assert_eq!(config.udp.idle_timeout, 100);
        assert_eq!(config.socks.reply_mapping, ReplyCodeMapping::Coarse);
    }

    #[test]
    fn test_parse_full_config() {
        let config_str = r#"
[server]
host = "0.0.0.0"
port = 7890
reuse_port = false
connect_timeout = 5
nodelay = false
keepalive_secs = 0

[socks]
reply_mapping = "detailed"
teardown_udp_on_close = false

[http]
max_request_line = 4096
reply_on_dial_failure = false

[udp]
bind_ip = "127.0.0.1"
port = 40000
idle_timeout = 30
sweep_interval = 10
read_timeout = 20
"#;

        let config = parse_config(config_str).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 7890);
        assert!(!config.server.reuse_port);
        assert_eq!(config.socks.reply_mapping, ReplyCodeMapping::Detailed);
        assert!(!config.socks.teardown_udp_on_close);
        assert_eq!(config.http.max_request_line, 4096);
        assert!(!config.http.reply_on_dial_failure);
        assert_eq!(config.udp.port, 40000);
        assert_eq!(config.udp.sweep_interval, 10);
    }

    #[test]
    fn test_parse_invalid_config() {
        assert!(parse_config("[server]\nport = \"abc\"").is_err());
        assert!(parse_config("[udp]\nread_timeout = 0").is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 9050").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.port, 9050);
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config("/nonexistent/mixsocks.toml").is_err());
    }
}
