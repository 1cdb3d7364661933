use std::io;

use tracing_subscriber::EnvFilter;

/// Proxy events at info; rmcp reports every session transition at info, so it is held to warn.
const DEFAULT_FILTER: &str = "info,rmcp=warn";

/// Installs the stderr subscriber. STDOUT carries MCP frames and must stay clean.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_from_env())
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(false)
        .try_init();
}

fn filter_from_env() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
