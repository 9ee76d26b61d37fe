//! SOCKS5 command parsing module
//!
//! Handles parsing SOCKS5 requests and building replies.

mod parser;
mod reply;

pub use parser::{parse_request, Socks5Request};
pub use reply::{build_reply, reply_bytes, send_command_not_supported};
