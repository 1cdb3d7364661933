use mcp_proxy::{
    DEFAULT_SERVER_NAME, McpProxy, ProxyConfig, ProxyError, Result, UpstreamEndpointConfig,
};

/// Local CIPP-MCP server the proxy forwards to.
pub const DEFAULT_UPSTREAM_URL: &str = "http://localhost:3001/mcp";

/// Name reported to the local client and to the upstream.
pub const DEFAULT_DISPLAY_NAME: &str = "CIPP-MCP Proxy";

/// Built-in configuration: one streamable HTTP upstream named `default`.
pub fn build_config() -> ProxyConfig {
    ProxyConfig::single(
        DEFAULT_SERVER_NAME,
        UpstreamEndpointConfig::streamable_http(DEFAULT_UPSTREAM_URL),
    )
}

pub fn create_proxy(config: &ProxyConfig, display_name: &str) -> Result<McpProxy> {
    McpProxy::from_config(config, display_name)
}

/// Blocks until the local client disconnects or the upstream session ends.
pub fn run(proxy: McpProxy) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| ProxyError::Runtime(format!("failed to start async runtime: {err}")))?;
    runtime.block_on(proxy.run_stdio())
}
