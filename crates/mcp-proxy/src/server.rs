use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, CompleteRequestParams, CompleteResult,
    GetPromptRequestParams, GetPromptResult, ListPromptsResult, ListResourceTemplatesResult,
    ListResourcesResult, ListToolsResult, PaginatedRequestParams, ReadResourceRequestParams,
    ReadResourceResult, ServerInfo, SetLevelRequestParams, SubscribeRequestParams,
    UnsubscribeRequestParams,
};
use rmcp::service::{NotificationContext, Peer, QuitReason, RequestContext, ServiceError};
use rmcp::transport::IntoTransport;
use rmcp::{RoleClient, RoleServer, ServiceExt, transport};
use tracing::{info, warn};

use crate::config::{ProxyConfig, UpstreamEndpointConfig};
use crate::error::{McpError, ProxyError, Result, to_mcp_error};
use crate::upstream::{self, DownstreamPeer, UpstreamBridge, UpstreamFault};

/// Server half of the proxy: answers the local client by forwarding every request to
/// the upstream peer.
#[derive(Clone)]
pub struct ProxyServer {
    name: String,
    upstream: Peer<RoleClient>,
    fault: UpstreamFault,
}

impl ProxyServer {
    pub(crate) fn new(
        name: impl Into<String>,
        upstream: Peer<RoleClient>,
        fault: UpstreamFault,
    ) -> Self {
        Self {
            name: name.into(),
            upstream,
            fault,
        }
    }

    fn relay_failed(&self, err: ServiceError) -> McpError {
        self.fault.observe(&err);
        to_mcp_error(err)
    }
}

impl ServerHandler for ProxyServer {
    async fn list_tools(
        &self,
        request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        self.upstream.list_tools(request).await.map_err(|err| self.relay_failed(err))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.upstream.call_tool(request).await.map_err(|err| self.relay_failed(err))
    }

    async fn list_resources(
        &self,
        request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        self.upstream
            .list_resources(request)
            .await
            .map_err(|err| self.relay_failed(err))
    }

    async fn list_resource_templates(
        &self,
        request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        self.upstream
            .list_resource_templates(request)
            .await
            .map_err(|err| self.relay_failed(err))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        self.upstream
            .read_resource(request)
            .await
            .map_err(|err| self.relay_failed(err))
    }

    async fn subscribe(
        &self,
        request: SubscribeRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<(), McpError> {
        self.upstream.subscribe(request).await.map_err(|err| self.relay_failed(err))
    }

    async fn unsubscribe(
        &self,
        request: UnsubscribeRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<(), McpError> {
        self.upstream
            .unsubscribe(request)
            .await
            .map_err(|err| self.relay_failed(err))
    }

    async fn list_prompts(
        &self,
        request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        self.upstream.list_prompts(request).await.map_err(|err| self.relay_failed(err))
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        self.upstream.get_prompt(request).await.map_err(|err| self.relay_failed(err))
    }

    async fn complete(
        &self,
        request: CompleteRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CompleteResult, McpError> {
        self.upstream.complete(request).await.map_err(|err| self.relay_failed(err))
    }

    async fn set_level(
        &self,
        request: SetLevelRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<(), McpError> {
        self.upstream.set_level(request).await.map_err(|err| self.relay_failed(err))
    }

    async fn on_roots_list_changed(&self, _context: NotificationContext<RoleServer>) {
        if let Err(err) = self.upstream.notify_roots_list_changed().await {
            self.fault.observe(&err);
            warn!("failed to relay roots list change upstream: {err}");
        }
    }

    /// Mirrors the upstream's capabilities and instructions under the proxy's own name.
    fn get_info(&self) -> ServerInfo {
        let mut info = self.upstream.peer_info().cloned().unwrap_or_default();
        info.server_info.name = self.name.clone();
        info
    }
}

/// Runnable proxy handle built from a validated [`ProxyConfig`].
#[derive(Clone, Debug)]
pub struct McpProxy {
    name: String,
    upstream_name: String,
    endpoint: UpstreamEndpointConfig,
}

impl McpProxy {
    /// Validates `config` and captures its single upstream.
    ///
    /// `name` is reported to both peers during their handshakes.
    pub fn from_config(config: &ProxyConfig, name: impl Into<String>) -> Result<Self> {
        let (upstream_name, endpoint) = config.endpoint()?;
        upstream::validate_headers(upstream_name, endpoint)?;
        Ok(Self {
            name: name.into(),
            upstream_name: upstream_name.to_string(),
            endpoint: endpoint.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn upstream_name(&self) -> &str {
        &self.upstream_name
    }

    pub fn endpoint(&self) -> &UpstreamEndpointConfig {
        &self.endpoint
    }

    /// Serves the proxy over STDIN/STDOUT until the local client disconnects.
    pub async fn run_stdio(self) -> Result<()> {
        self.serve(transport::io::stdio()).await
    }

    /// Connects the upstream, then serves `transport` until either side goes away.
    ///
    /// Returns `Ok` when the local client closes the session and an upstream error when
    /// the upstream connection ends or fails first.
    pub async fn serve<T, E, A>(self, transport: T) -> Result<()>
    where
        T: IntoTransport<RoleServer, E, A> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let downstream_peer = DownstreamPeer::default();
        let bridge = UpstreamBridge::new(&self.name, downstream_peer.clone());
        let upstream = upstream::connect(&self.upstream_name, &self.endpoint, bridge).await?;

        let fault = UpstreamFault::new();
        let server = ProxyServer::new(self.name.clone(), upstream.peer().clone(), fault.clone());
        let downstream = match server.serve(transport).await {
            Ok(downstream) => downstream,
            Err(err) => {
                if let Err(cancel_err) = upstream.cancel().await {
                    warn!("failed to close upstream session: {cancel_err}");
                }
                return Err(ProxyError::Downstream(format!(
                    "local handshake failed: {err}"
                )));
            }
        };
        downstream_peer.attach(downstream.peer().clone());
        info!(
            proxy = %self.name,
            upstream = %self.upstream_name,
            url = %self.endpoint.url,
            "proxy running"
        );

        tokio::select! {
            quit = downstream.waiting() => match quit {
                Ok(QuitReason::JoinError(err)) | Err(err) => {
                    Err(ProxyError::Runtime(format!("local session task failed: {err}")))
                }
                Ok(reason) => {
                    info!(?reason, "local client disconnected");
                    Ok(())
                }
            },
            quit = upstream.waiting() => match quit {
                Ok(QuitReason::JoinError(err)) | Err(err) => {
                    Err(ProxyError::Runtime(format!("upstream session task failed: {err}")))
                }
                Ok(reason) => Err(ProxyError::upstream(format!(
                    "session with `{}` ended: {reason:?}",
                    self.upstream_name
                ))),
            },
            reason = fault.lost() => Err(ProxyError::upstream(format!(
                "lost connection to `{}` at {}: {reason}",
                self.upstream_name, self.endpoint.url
            ))),
        }
    }
}
