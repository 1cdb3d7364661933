//! Relays a local STDIN/STDOUT MCP session to a single upstream MCP server spoken to
//! over streamable HTTP.
//!
//! Both wire transports come from `rmcp`; this crate only validates the upstream
//! configuration and forwards traffic between the two sessions.

mod config;
mod error;
mod server;
mod upstream;

pub use crate::config::{DEFAULT_SERVER_NAME, ProxyConfig, TransportKind, UpstreamEndpointConfig};
pub use crate::error::{McpError, ProxyError, Result};
pub use crate::server::{McpProxy, ProxyServer};
