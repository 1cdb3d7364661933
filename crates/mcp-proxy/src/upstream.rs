use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rmcp::model::{
    ClientCapabilities, ClientInfo, CreateMessageRequestParams, CreateMessageResult,
    Implementation, ListRootsResult, LoggingMessageNotificationParam, ProgressNotificationParam,
    ResourceUpdatedNotificationParam,
};
use rmcp::service::{NotificationContext, Peer, RequestContext, RunningService, ServiceError};
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::{ClientHandler, RoleClient, RoleServer, ServiceExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::UpstreamEndpointConfig;
use crate::error::{McpError, ProxyError, Result, not_attached, to_mcp_error};

/// Late-bound handle to the local client.
///
/// The upstream handshake completes before the local one, so the upstream side holds
/// this slot and reads it whenever it needs to relay something back.
#[derive(Clone, Default)]
pub(crate) struct DownstreamPeer {
    slot: Arc<OnceLock<Peer<RoleServer>>>,
}

impl DownstreamPeer {
    pub(crate) fn attach(&self, peer: Peer<RoleServer>) {
        if self.slot.set(peer).is_err() {
            warn!("local client already attached; ignoring second attachment");
        }
    }

    fn get(&self) -> Option<&Peer<RoleServer>> {
        self.slot.get()
    }
}

/// First transport failure seen on the upstream session.
///
/// rmcp's streamable HTTP client keeps its worker alive after the server goes away, so
/// the session never reports a close on its own. Relayed requests record the failure
/// here and the proxy loop stops on it.
#[derive(Clone)]
pub(crate) struct UpstreamFault {
    tx: watch::Sender<Option<String>>,
}

impl UpstreamFault {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Records `err` if it means the upstream connection itself is gone.
    pub(crate) fn observe(&self, err: &ServiceError) {
        if !matches!(
            err,
            ServiceError::TransportSend(_) | ServiceError::TransportClosed
        ) {
            return;
        }
        let reason = err.to_string();
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            warn!("upstream connection lost: {reason}");
            *slot = Some(reason);
            true
        });
    }

    /// Resolves with the recorded reason once a failure has been observed.
    pub(crate) async fn lost(&self) -> String {
        let mut rx = self.tx.subscribe();
        let observed = rx
            .wait_for(|slot| slot.is_some())
            .await
            .map(|slot| slot.clone());
        match observed {
            Ok(slot) => slot.unwrap_or_default(),
            Err(_) => std::future::pending().await,
        }
    }
}

/// Client half of the proxy: talks to the upstream and relays its server-initiated
/// traffic to the local client.
#[derive(Clone)]
pub(crate) struct UpstreamBridge {
    client_info: ClientInfo,
    downstream: DownstreamPeer,
}

impl UpstreamBridge {
    pub(crate) fn new(name: &str, downstream: DownstreamPeer) -> Self {
        let client_info = ClientInfo {
            capabilities: ClientCapabilities::builder()
                .enable_roots()
                .enable_sampling()
                .build(),
            client_info: Implementation {
                name: name.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::default()
            },
            ..ClientInfo::default()
        };
        Self {
            client_info,
            downstream,
        }
    }
}

impl ClientHandler for UpstreamBridge {
    async fn create_message(
        &self,
        params: CreateMessageRequestParams,
        _context: RequestContext<RoleClient>,
    ) -> Result<CreateMessageResult, McpError> {
        let peer = self
            .downstream
            .get()
            .ok_or_else(|| not_attached("sampling request"))?;
        peer.create_message(params).await.map_err(to_mcp_error)
    }

    async fn list_roots(
        &self,
        _context: RequestContext<RoleClient>,
    ) -> Result<ListRootsResult, McpError> {
        let peer = self
            .downstream
            .get()
            .ok_or_else(|| not_attached("roots request"))?;
        peer.list_roots().await.map_err(to_mcp_error)
    }

    async fn on_progress(
        &self,
        params: ProgressNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        debug!(
            token = ?params.progress_token,
            progress = params.progress,
            total = ?params.total,
            "upstream progress"
        );
    }

    async fn on_logging_message(
        &self,
        params: LoggingMessageNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        debug!(level = ?params.level, logger = ?params.logger, "upstream log message");
        match self.downstream.get() {
            Some(peer) => {
                if let Err(err) = peer.notify_logging_message(params).await {
                    warn!("failed to relay upstream log message: {err}");
                }
            }
            None => debug!("dropping upstream log message: no local client attached"),
        }
    }

    async fn on_resource_updated(
        &self,
        params: ResourceUpdatedNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        let Some(peer) = self.downstream.get() else {
            debug!(uri = %params.uri, "dropping resource update: no local client attached");
            return;
        };
        if let Err(err) = peer.notify_resource_updated(params).await {
            warn!("failed to relay resource update: {err}");
        }
    }

    async fn on_resource_list_changed(&self, _context: NotificationContext<RoleClient>) {
        if let Some(peer) = self.downstream.get()
            && let Err(err) = peer.notify_resource_list_changed().await
        {
            warn!("failed to relay resource list change: {err}");
        }
    }

    async fn on_tool_list_changed(&self, _context: NotificationContext<RoleClient>) {
        if let Some(peer) = self.downstream.get()
            && let Err(err) = peer.notify_tool_list_changed().await
        {
            warn!("failed to relay tool list change: {err}");
        }
    }

    async fn on_prompt_list_changed(&self, _context: NotificationContext<RoleClient>) {
        if let Some(peer) = self.downstream.get()
            && let Err(err) = peer.notify_prompt_list_changed().await
        {
            warn!("failed to relay prompt list change: {err}");
        }
    }

    fn get_info(&self) -> ClientInfo {
        self.client_info.clone()
    }
}

/// Opens the streamable HTTP session and performs the MCP initialize handshake.
pub(crate) async fn connect(
    name: &str,
    endpoint: &UpstreamEndpointConfig,
    bridge: UpstreamBridge,
) -> Result<RunningService<RoleClient, UpstreamBridge>> {
    let mut transport_config = StreamableHttpClientTransportConfig::with_uri(endpoint.url.clone());
    if let Some(token) = endpoint.auth.clone() {
        transport_config = transport_config.auth_header(token);
    }

    let http_client = reqwest::Client::builder()
        .default_headers(build_headers(name, &endpoint.headers)?)
        .build()
        .map_err(|err| ProxyError::config(format!("failed to build http client: {err}")))?;
    let transport = StreamableHttpClientTransport::with_client(http_client, transport_config);

    debug!(server = name, url = %endpoint.url, transport = %endpoint.transport, "connecting upstream");
    let service = bridge.serve(transport).await.map_err(|err| {
        ProxyError::upstream(format!(
            "failed to connect to `{name}` at {}: {err}",
            endpoint.url
        ))
    })?;

    if let Some(info) = service.peer().peer_info() {
        info!(
            server = name,
            upstream = %info.server_info.name,
            upstream_version = %info.server_info.version,
            protocol = ?info.protocol_version,
            "upstream session established"
        );
    }
    Ok(service)
}

fn build_headers(name: &str, headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let header = HeaderName::from_bytes(key.as_bytes()).map_err(|err| {
            ProxyError::config(format!("server `{name}` has invalid header name `{key}`: {err}"))
        })?;
        let value = HeaderValue::from_str(value).map_err(|err| {
            ProxyError::config(format!("server `{name}` has invalid value for header `{key}`: {err}"))
        })?;
        map.insert(header, value);
    }
    Ok(map)
}

pub(crate) fn validate_headers(name: &str, endpoint: &UpstreamEndpointConfig) -> Result<()> {
    build_headers(name, &endpoint.headers).map(|_| ())
}
