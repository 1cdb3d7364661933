//! Stdio entry point for the CIPP MCP server.

mod bootstrap;
mod cli;
mod diagnostics;
mod error;
mod telemetry;

pub use crate::bootstrap::{
    DEFAULT_DISPLAY_NAME, DEFAULT_UPSTREAM_URL, build_config, create_proxy, run as run_proxy,
};
pub use crate::cli::{run, run_cli};
pub use crate::diagnostics::write_startup_diagnostics;
pub use crate::error::{CliError, ExitStatus};
