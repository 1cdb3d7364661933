use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use url::Url;

use crate::error::{ProxyError, Result};

/// Endpoint name used when a configuration carries a single upstream.
pub const DEFAULT_SERVER_NAME: &str = "default";

/// Wire protocol spoken to an upstream endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    /// MCP streamable HTTP: JSON-RPC over POST with streamed SSE responses.
    #[default]
    #[serde(rename = "streamable-http", alias = "http", alias = "streamable_http")]
    StreamableHttp,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::StreamableHttp => "streamable-http",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single upstream MCP server. Its name is the key under `mcpServers`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamEndpointConfig {
    pub url: String,
    #[serde(default)]
    pub transport: TransportKind,
    /// Extra headers attached to every upstream HTTP request.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Bearer token sent as the `Authorization` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

impl UpstreamEndpointConfig {
    pub fn streamable_http(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            transport: TransportKind::StreamableHttp,
            headers: BTreeMap::new(),
            auth: None,
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        let parsed = Url::parse(&self.url).map_err(|err| {
            ProxyError::config(format!("server `{name}` has invalid url `{}`: {err}", self.url))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProxyError::config(format!(
                "server `{name}` url must use http or https, got {}://",
                parsed.scheme()
            )));
        }
        Ok(())
    }
}

/// Named upstream servers, in the `{"mcpServers": {...}}` layout MCP clients share.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    #[serde(default)]
    pub mcp_servers: BTreeMap<String, UpstreamEndpointConfig>,
}

impl ProxyConfig {
    /// Builds a configuration holding exactly one named endpoint.
    pub fn single(name: impl Into<String>, endpoint: UpstreamEndpointConfig) -> Self {
        let mut mcp_servers = BTreeMap::new();
        mcp_servers.insert(name.into(), endpoint);
        Self { mcp_servers }
    }

    /// Parses a configuration document.
    ///
    /// Malformed JSON is a [`ProxyError::Serialization`]; well-formed JSON with the wrong
    /// shape (unknown transport, missing `url`, stray fields) is a [`ProxyError::Config`].
    pub fn from_json_str(raw: &str) -> Result<Self> {
        match serde_json::from_str(raw) {
            Ok(config) => Ok(config),
            Err(err) if err.classify() == Category::Data => {
                Err(ProxyError::config(err.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ProxyError::config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_json_str(&raw).map_err(|err| err.context(path.display()))
    }

    /// Returns the one configured upstream after validating it.
    ///
    /// Routing across several upstreams is not supported, so anything other than a
    /// single entry is rejected.
    pub fn endpoint(&self) -> Result<(&str, &UpstreamEndpointConfig)> {
        let mut entries = self.mcp_servers.iter();
        let (name, endpoint) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            (None, _) => return Err(ProxyError::config("no MCP servers configured")),
            (Some(_), Some(_)) => {
                let names: Vec<&str> = self.mcp_servers.keys().map(String::as_str).collect();
                return Err(ProxyError::config(format!(
                    "expected exactly one MCP server, found {} ({})",
                    names.len(),
                    names.join(", ")
                )));
            }
        };
        endpoint.validate(name)?;
        Ok((name.as_str(), endpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_client_style_config() {
        let config = ProxyConfig::from_json_str(
            r#"{
                "mcpServers": {
                    "default": {
                        "url": "http://localhost:3001/mcp",
                        "transport": "streamable-http"
                    }
                }
            }"#,
        )
        .expect("parse");

        let (name, endpoint) = config.endpoint().expect("endpoint");
        assert_eq!(name, "default");
        assert_eq!(endpoint.url, "http://localhost:3001/mcp");
        assert_eq!(endpoint.transport, TransportKind::StreamableHttp);
        assert!(endpoint.headers.is_empty());
    }

    #[test]
    fn transport_defaults_and_aliases() {
        for raw in [
            r#"{"mcpServers":{"a":{"url":"http://h/mcp"}}}"#,
            r#"{"mcpServers":{"a":{"url":"http://h/mcp","transport":"http"}}}"#,
            r#"{"mcpServers":{"a":{"url":"http://h/mcp","transport":"streamable_http"}}}"#,
        ] {
            let config = ProxyConfig::from_json_str(raw).expect("parse");
            assert_eq!(
                config.mcp_servers["a"].transport,
                TransportKind::StreamableHttp,
                "{raw}"
            );
        }
    }

    #[test]
    fn rejects_unknown_transport() {
        let err = ProxyConfig::from_json_str(
            r#"{"mcpServers":{"a":{"url":"http://h/mcp","transport":"carrier-pigeon"}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ProxyError::Config(_)));
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        for raw in ["{ not json", r#"{"mcpServers": {"#, ""] {
            let err = ProxyConfig::from_json_str(raw).unwrap_err();
            assert!(matches!(err, ProxyError::Serialization(_)), "{raw}: {err}");
        }
    }

    #[test]
    fn rejects_missing_url() {
        let err =
            ProxyConfig::from_json_str(r#"{"mcpServers":{"a":{"transport":"http"}}}"#).unwrap_err();
        assert!(err.to_string().contains("url"));
    }

    #[test]
    fn endpoint_requires_exactly_one_server() {
        let empty = ProxyConfig::default();
        assert!(matches!(empty.endpoint(), Err(ProxyError::Config(_))));

        let mut two = ProxyConfig::single("a", UpstreamEndpointConfig::streamable_http("http://a"));
        two.mcp_servers.insert(
            "b".to_string(),
            UpstreamEndpointConfig::streamable_http("http://b"),
        );
        let err = two.endpoint().unwrap_err();
        assert!(err.to_string().contains("found 2 (a, b)"));
    }

    #[test]
    fn endpoint_rejects_bad_urls() {
        let relative = ProxyConfig::single("a", UpstreamEndpointConfig::streamable_http("/mcp"));
        assert!(matches!(relative.endpoint(), Err(ProxyError::Config(_))));

        let ws = ProxyConfig::single("a", UpstreamEndpointConfig::streamable_http("ws://h/mcp"));
        let err = ws.endpoint().unwrap_err();
        assert!(err.to_string().contains("ws://"));
    }

    #[test]
    fn loads_from_file_with_path_context() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("proxy.json");
        std::fs::write(&path, "{ not json").expect("write");

        let err = ProxyConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, ProxyError::Serialization(_)));
        assert!(err.to_string().contains("proxy.json"));
    }
}
