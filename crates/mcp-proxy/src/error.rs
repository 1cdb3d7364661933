use std::fmt;

use rmcp::model::ErrorData;
use rmcp::service::ServiceError;
use thiserror::Error;

pub type McpError = ErrorData;

pub type Result<T, E = ProxyError> = std::result::Result<T, E>;

/// Failures raised while configuring, connecting or running the proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("local transport error: {0}")]
    Downstream(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl ProxyError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    pub fn context<T: fmt::Display>(self, ctx: T) -> Self {
        match self {
            ProxyError::Config(msg) => ProxyError::Config(format!("{ctx}: {msg}")),
            ProxyError::Upstream(msg) => ProxyError::Upstream(format!("{ctx}: {msg}")),
            ProxyError::Downstream(msg) => ProxyError::Downstream(format!("{ctx}: {msg}")),
            ProxyError::Serialization(msg) => {
                ProxyError::Serialization(format!("{ctx}: {msg}"))
            }
            ProxyError::Runtime(msg) => ProxyError::Runtime(format!("{ctx}: {msg}")),
            ProxyError::Io(err) => ProxyError::Io(err),
        }
    }
}

/// Converts a failed request against either peer into the error returned to the caller.
///
/// Protocol errors keep their code and message so the local client sees exactly what
/// the upstream answered.
pub(crate) fn to_mcp_error(err: ServiceError) -> McpError {
    match err {
        ServiceError::McpError(error) => error,
        other => ErrorData::internal_error(format!("relayed request failed: {other}"), None),
    }
}

pub(crate) fn not_attached(what: &str) -> McpError {
    ErrorData::internal_error(format!("cannot relay {what}: no local client attached"), None)
}
