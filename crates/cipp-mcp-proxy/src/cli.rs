use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Arg, ArgMatches, Command, value_parser};
use mcp_proxy::ProxyConfig;

use crate::bootstrap::{self, DEFAULT_DISPLAY_NAME};
use crate::diagnostics::emit_startup_diagnostics;
use crate::error::{CliError, ExitStatus};
use crate::telemetry::init_tracing;

const NAME: &str = "cipp-mcp-proxy";

/// Process entry point. The startup diagnostics are written before anything else,
/// including argument parsing, so they appear even when startup fails.
pub fn run() -> ExitCode {
    emit_startup_diagnostics();
    init_tracing();
    match run_cli(std::env::args_os()) {
        Ok(code) => code,
        Err(err) => {
            err.print();
            err.exit_code()
        }
    }
}

/// Parses arguments, builds the proxy and runs it over STDIN/STDOUT until the session ends.
pub fn run_cli<I, S>(args: I) -> Result<ExitCode, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    let matches = build_cli().try_get_matches_from(args)?;
    let config = resolve_config(&matches)?;
    let display_name = matches
        .get_one::<String>("name")
        .ok_or_else(|| CliError::new("missing --name value", ExitStatus::Usage))?;

    let proxy = bootstrap::create_proxy(&config, display_name)?;
    tracing::info!(
        proxy = %proxy.name(),
        upstream = %proxy.upstream_name(),
        url = %proxy.endpoint().url,
        transport = %proxy.endpoint().transport,
        "starting stdio proxy"
    );
    bootstrap::run(proxy)?;
    Ok(ExitCode::SUCCESS)
}

fn resolve_config(matches: &ArgMatches) -> Result<ProxyConfig, CliError> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => Ok(ProxyConfig::from_json_file(path)?),
        None => Ok(bootstrap::build_config()),
    }
}

fn build_cli() -> Command {
    Command::new(NAME)
        .about("Serves a streamable-HTTP MCP server to local clients over STDIN/STDOUT")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("Read upstream servers from a JSON file ({\"mcpServers\": {...}}) instead of the built-in http://localhost:3001/mcp."),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .value_name("NAME")
                .help("Server name reported to the local client and the upstream.")
                .default_value(DEFAULT_DISPLAY_NAME),
        )
}
