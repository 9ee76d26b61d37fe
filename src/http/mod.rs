//! HTTP proxy module for Mixsocks
//!
//! Handles HTTP proxy requests arriving on the shared port: CONNECT
//! tunnels and plain forwarding of absolute-URI requests.

mod handler;
mod request;

pub use handler::{handle_http, BAD_GATEWAY, CONNECT_ESTABLISHED};
pub use request::{parse_absolute_uri, parse_authority, RequestLine, DEFAULT_HTTP_PORT};
