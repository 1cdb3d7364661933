use std::fmt;
use std::process::ExitCode;

use clap::error::ErrorKind as ClapErrorKind;
use mcp_proxy::ProxyError;

/// Process exit status, using the sysexits numbering MCP client launchers surface verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    /// Local client hung up, or `--help`/`--version` was printed.
    Ok = 0,
    /// Unrecognised flag or missing flag value.
    Usage = 64,
    /// The `--config` file is not valid JSON.
    Data = 65,
    /// The upstream refused the handshake or dropped the session.
    Unavailable = 69,
    /// The async runtime or a session task failed.
    Software = 70,
    /// STDIN/STDOUT could not be served.
    Io = 71,
    /// The upstream configuration was rejected.
    Config = 78,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Failure carried to the process boundary: the line printed to stderr plus the exit status.
#[derive(Debug)]
pub struct CliError {
    message: String,
    status: ExitStatus,
}

impl CliError {
    pub fn new(message: impl Into<String>, status: ExitStatus) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    pub fn status(&self) -> ExitStatus {
        self.status
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.status.code())
    }

    /// Writes the message after the diagnostics and any log lines already on stderr.
    pub fn print(&self) {
        if !self.message.is_empty() {
            eprintln!("cipp-mcp-proxy: {}", self.message);
        }
    }
}

impl From<ProxyError> for CliError {
    fn from(err: ProxyError) -> Self {
        let status = match &err {
            ProxyError::Config(_) => ExitStatus::Config,
            ProxyError::Serialization(_) => ExitStatus::Data,
            ProxyError::Upstream(_) => ExitStatus::Unavailable,
            ProxyError::Runtime(_) => ExitStatus::Software,
            ProxyError::Downstream(_) | ProxyError::Io(_) => ExitStatus::Io,
        };
        CliError::new(err.to_string(), status)
    }
}

/// Help and version output go to stdout and end the process cleanly; every other parse
/// failure is a usage error.
impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> Self {
        match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                let _ = err.print();
                CliError::new(String::new(), ExitStatus::Ok)
            }
            _ => CliError::new(err.to_string(), ExitStatus::Usage),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}
