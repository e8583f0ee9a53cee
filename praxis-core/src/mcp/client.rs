//! Resilient MCP protocol client
//!
//! Owns one logical connection to an MCP server: the initialize
//! handshake, request/response correlation, server notifications,
//! heartbeat-based silence detection, and bounded reconnection. Every
//! transport-level failure is absorbed here; callers only ever see
//! typed errors.

use super::protocol::{
    classify_inbound, methods, ClientCapabilities, ClientInfo, Inbound, InitializeParams,
    InitializeResult, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RemoteResource,
    RemoteTool, RequestId, ResourceReadResult, ResourceUriParams, ResourcesListResult,
    ToolCallParams, ToolsListResult, PROTOCOL_VERSION,
};
use super::transport::{Connector, Transport};
use crate::error::{PraxisError, Result};
use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reconnect attempts before the client gives up
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Lifecycle of the logical connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and none being attempted
    Disconnected,
    /// Dialing the server
    Connecting,
    /// Transport up, initialize exchange in flight
    Handshaking,
    /// Handshake complete, requests may flow
    Ready,
    /// Connection lost, bounded retries in progress
    Reconnecting,
    /// Retries exhausted; requires an explicit disconnect to reset
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Handshaking => "HANDSHAKING",
            ConnectionState::Ready => "READY",
            ConnectionState::Reconnecting => "RECONNECTING",
            ConnectionState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Settings for one client instance
#[derive(Debug, Clone)]
pub struct McpClientConfig {
    /// Server address, informational once the connector is built
    pub server_url: String,
    /// Name sent in `clientInfo`
    pub client_name: String,
    /// Version sent in `clientInfo`
    pub client_version: String,
    /// Optional bearer token forwarded during the handshake
    pub auth_token: Option<String>,
    /// Per-request reply timeout
    pub read_timeout: Duration,
    /// Fixed delay between reconnect attempts
    pub reconnect_delay: Duration,
    /// Heartbeat period; silence for twice this long drops the connection
    pub heartbeat_interval: Duration,
    /// Protocol revisions the client accepts from the server
    pub supported_protocols: Vec<String>,
}

impl Default for McpClientConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            client_name: "praxis".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            auth_token: None,
            read_timeout: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(30),
            supported_protocols: vec![PROTOCOL_VERSION.to_string()],
        }
    }
}

/// One live transport with its correlation state
struct Connection {
    transport: Arc<dyn Transport>,
    pending: Mutex<HashMap<RequestId, oneshot::Sender<JsonRpcResponse>>>,
    /// Per-connection token baked into correlation ids
    token: String,
    /// Client epoch at creation time; a reconnect loop for this
    /// connection stops once the shared epoch moves past it.
    epoch: u64,
    last_activity: Mutex<Instant>,
    cancel: CancellationToken,
}

impl Connection {
    fn touch(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn idle(&self) -> Duration {
        self.last_activity
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }

    /// Drop every pending waiter; their receivers observe the closed
    /// channel and report a connection error.
    fn fail_pending(&self) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

struct ClientShared {
    config: McpClientConfig,
    connector: Box<dyn Connector>,
    state: Mutex<ConnectionState>,
    connection: RwLock<Option<Arc<Connection>>>,
    next_id: AtomicU64,
    reconnect_attempts: AtomicU32,
    /// Bumped by explicit disconnects; a stale reconnect loop stops
    /// when it observes a newer epoch.
    epoch: AtomicU64,
    /// Serializes connect and reconnect so at most one dial is in flight
    connect_lock: tokio::sync::Mutex<()>,
    tools: RwLock<Vec<RemoteTool>>,
    resources: RwLock<Vec<RemoteResource>>,
    subscriptions: Mutex<HashSet<String>>,
    /// Latest contents per uri, refreshed on `resources/updated`
    resource_contents: RwLock<HashMap<String, ResourceReadResult>>,
}

/// Handle to the shared client; clones are cheap and share state
#[derive(Clone)]
pub struct McpClient {
    shared: Arc<ClientShared>,
}

impl fmt::Debug for McpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpClient")
            .field("server_url", &self.shared.config.server_url)
            .field("state", &self.state())
            .finish()
    }
}

impl McpClient {
    /// Client over the given connector. No connection is made until
    /// [`connect`](Self::connect).
    pub fn new(connector: Box<dyn Connector>, config: McpClientConfig) -> Self {
        Self {
            shared: Arc::new(ClientShared {
                config,
                connector,
                state: Mutex::new(ConnectionState::Disconnected),
                connection: RwLock::new(None),
                next_id: AtomicU64::new(1),
                reconnect_attempts: AtomicU32::new(0),
                epoch: AtomicU64::new(0),
                connect_lock: tokio::sync::Mutex::new(()),
                tools: RwLock::new(Vec::new()),
                resources: RwLock::new(Vec::new()),
                subscriptions: Mutex::new(HashSet::new()),
                resource_contents: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether requests may flow right now
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Reconnect attempts consumed since the last successful connect
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.reconnect_attempts.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: ConnectionState) {
        *self.shared.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn current_connection(&self) -> Option<Arc<Connection>> {
        self.shared
            .connection
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Establish the connection and perform the initialize handshake.
    ///
    /// Idempotent while READY. Refuses once the reconnect budget is
    /// exhausted; an explicit [`disconnect`](Self::disconnect) resets it.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.shared.connect_lock.lock().await;
        if self.state() == ConnectionState::Ready {
            return Ok(());
        }
        if self.reconnect_attempts() >= MAX_RECONNECT_ATTEMPTS {
            return Err(PraxisError::Connection(
                "reconnect attempts exhausted".to_string(),
            ));
        }
        self.connect_locked(false).await
    }

    async fn connect_locked(&self, reconnecting: bool) -> Result<()> {
        self.set_state(ConnectionState::Connecting);
        let transport: Arc<dyn Transport> = match self.shared.connector.connect().await {
            Ok(t) => Arc::from(t),
            Err(err) => {
                self.note_connect_failure(reconnecting);
                return Err(err);
            }
        };

        self.set_state(ConnectionState::Handshaking);
        if let Err(err) = self.handshake(transport.as_ref()).await {
            transport.close().await;
            self.note_connect_failure(reconnecting);
            return Err(err);
        }

        let connection = Arc::new(Connection {
            transport,
            pending: Mutex::new(HashMap::new()),
            token: short_token(),
            epoch: self.shared.epoch.load(Ordering::SeqCst),
            last_activity: Mutex::new(Instant::now()),
            cancel: CancellationToken::new(),
        });
        *self
            .shared
            .connection
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&connection));
        self.shared.reconnect_attempts.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Ready);
        info!(server = %self.shared.config.server_url, "connection ready");

        tokio::spawn(Self::run_worker(
            Arc::clone(&self.shared),
            Arc::clone(&connection),
        ));

        // Discover both catalogs concurrently; failures leave the caches
        // as they were rather than failing the connect.
        let (tools, resources) =
            futures::future::join(self.refresh_tools(), self.refresh_resources()).await;
        if let Err(err) = tools {
            warn!(error = %err, "initial tool discovery failed");
        }
        if let Err(err) = resources {
            warn!(error = %err, "initial resource discovery failed");
        }
        Ok(())
    }

    fn note_connect_failure(&self, reconnecting: bool) {
        let attempts = self.shared.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempts >= MAX_RECONNECT_ATTEMPTS {
            warn!(attempts, "reconnect budget exhausted");
            self.set_state(ConnectionState::Failed);
        } else if reconnecting {
            // The recovery sequence stays in RECONNECTING until it
            // either succeeds or exhausts the budget.
            self.set_state(ConnectionState::Reconnecting);
        } else {
            self.set_state(ConnectionState::Disconnected);
        }
    }

    /// Run the initialize exchange directly on the transport; the reader
    /// worker only starts once the handshake has succeeded.
    async fn handshake(&self, transport: &dyn Transport) -> Result<InitializeResult> {
        let id = RequestId::String(format!("init_{}", short_token()));
        let mut params = serde_json::to_value(InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities {
                tools: Some(json!({ "listChanged": true })),
                resources: Some(json!({ "subscribe": true, "listChanged": true })),
            },
            client_info: ClientInfo {
                name: self.shared.config.client_name.clone(),
                version: self.shared.config.client_version.clone(),
            },
        })?;
        if let (Value::Object(map), Some(token)) =
            (&mut params, self.shared.config.auth_token.as_deref())
        {
            map.insert("authToken".to_string(), json!(token));
        }

        let request = JsonRpcRequest::new(methods::INITIALIZE, Some(params), id.clone());
        transport.send(&serde_json::to_string(&request)?).await?;

        let reply = tokio::time::timeout(self.shared.config.read_timeout, async {
            loop {
                match transport.recv().await? {
                    Some(line) => match classify_inbound(&line) {
                        Ok(Inbound::Response(resp)) if resp.id == id => return Ok(resp),
                        Ok(_) => continue,
                        Err(err) => {
                            debug!(error = %err, "ignoring malformed line during handshake");
                        }
                    },
                    None => {
                        return Err(PraxisError::Connection(
                            "connection closed during handshake".to_string(),
                        ))
                    }
                }
            }
        })
        .await
        .map_err(|_| PraxisError::Handshake("no initialize response".to_string()))??;

        let result: InitializeResult = serde_json::from_value(reply.into_result()?)?;
        if !self
            .shared
            .config
            .supported_protocols
            .iter()
            .any(|p| p == &result.protocol_version)
        {
            return Err(PraxisError::Handshake(format!(
                "unsupported protocol version '{}'",
                result.protocol_version
            )));
        }

        let done = JsonRpcNotification::new(methods::INITIALIZED, None);
        transport.send(&serde_json::to_string(&done)?).await?;
        debug!(protocol = %result.protocol_version, "handshake complete");
        Ok(result)
    }

    /// Tear the connection down and reset the reconnect budget
    pub async fn disconnect(&self) {
        let connection = {
            let mut guard = self
                .shared
                .connection
                .write()
                .unwrap_or_else(|e| e.into_inner());
            guard.take()
        };
        if let Some(connection) = connection {
            connection.cancel.cancel();
            connection.fail_pending();
            connection.transport.close().await;
        }
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        self.shared.reconnect_attempts.store(0, Ordering::SeqCst);
        self.shared
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.set_state(ConnectionState::Disconnected);
        info!(server = %self.shared.config.server_url, "disconnected");
    }

    /// Send one request and wait for its correlated reply
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let connection = self
            .current_connection()
            .ok_or_else(|| PraxisError::Connection("not connected".to_string()))?;

        let n = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let id = RequestId::String(format!("req_{}_{}", n, connection.token));
        let (tx, rx) = oneshot::channel();
        connection
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), tx);

        let request = JsonRpcRequest::new(method, params, id.clone());
        let line = serde_json::to_string(&request)?;
        if let Err(err) = connection.transport.send(&line).await {
            connection
                .pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&id);
            return Err(err);
        }

        match tokio::time::timeout(self.shared.config.read_timeout, rx).await {
            Ok(Ok(response)) => response.into_result(),
            Ok(Err(_)) => Err(PraxisError::Connection(
                "connection closed before the reply arrived".to_string(),
            )),
            Err(_) => {
                connection
                    .pending
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&id);
                Err(PraxisError::request_timeout())
            }
        }
    }

    /// Cached remote tool catalog
    pub fn tools(&self) -> Vec<RemoteTool> {
        self.shared
            .tools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Cached remote resource catalog
    pub fn resources(&self) -> Vec<RemoteResource> {
        self.shared
            .resources
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// URIs with an active change subscription
    pub fn subscriptions(&self) -> Vec<String> {
        self.shared
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Query `tools/list` and replace the cached catalog
    pub async fn refresh_tools(&self) -> Result<Vec<RemoteTool>> {
        let value = self.request(methods::TOOLS_LIST, None).await?;
        let result: ToolsListResult = serde_json::from_value(value)?;
        *self
            .shared
            .tools
            .write()
            .unwrap_or_else(|e| e.into_inner()) = result.tools.clone();
        debug!(count = result.tools.len(), "tool catalog refreshed");
        Ok(result.tools)
    }

    /// Query `resources/list` and replace the cached catalog
    pub async fn refresh_resources(&self) -> Result<Vec<RemoteResource>> {
        let value = self.request(methods::RESOURCES_LIST, None).await?;
        let result: ResourcesListResult = serde_json::from_value(value)?;
        *self
            .shared
            .resources
            .write()
            .unwrap_or_else(|e| e.into_inner()) = result.resources.clone();
        debug!(count = result.resources.len(), "resource catalog refreshed");
        Ok(result.resources)
    }

    /// Invoke a remote tool by name
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        let params = serde_json::to_value(ToolCallParams {
            name: name.to_string(),
            arguments,
        })?;
        self.request(methods::TOOLS_CALL, Some(params)).await
    }

    /// Fetch the contents of a resource and refresh the contents cache
    pub async fn read_resource(&self, uri: &str) -> Result<ResourceReadResult> {
        let params = serde_json::to_value(ResourceUriParams {
            uri: uri.to_string(),
        })?;
        let value = self.request(methods::RESOURCES_READ, Some(params)).await?;
        let contents: ResourceReadResult = serde_json::from_value(value)?;
        self.shared
            .resource_contents
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(uri.to_string(), contents.clone());
        Ok(contents)
    }

    /// Last fetched contents for a uri, if any
    pub fn cached_resource(&self, uri: &str) -> Option<ResourceReadResult> {
        self.shared
            .resource_contents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(uri)
            .cloned()
    }

    /// Subscribe to change notifications for a resource
    pub async fn subscribe_resource(&self, uri: &str) -> Result<()> {
        let params = serde_json::to_value(ResourceUriParams {
            uri: uri.to_string(),
        })?;
        self.request(methods::RESOURCES_SUBSCRIBE, Some(params))
            .await?;
        self.shared
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(uri.to_string());
        Ok(())
    }

    /// Reader and heartbeat loop for one connection. Exits on explicit
    /// disconnect; on connection loss it hands off to the reconnect loop.
    async fn run_worker(shared: Arc<ClientShared>, connection: Arc<Connection>) {
        let mut heartbeat = tokio::time::interval(shared.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately.
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = connection.cancel.cancelled() => {
                    debug!("worker stopped by disconnect");
                    return;
                }
                inbound = connection.transport.recv() => match inbound {
                    Ok(Some(line)) => {
                        connection.touch();
                        Self::handle_inbound(&shared, &connection, &line);
                    }
                    Ok(None) => {
                        warn!("server closed the connection");
                        break;
                    }
                    Err(err) => {
                        warn!(error = %err, "transport read failed");
                        break;
                    }
                },
                _ = heartbeat.tick() => {
                    if connection.idle() >= shared.config.heartbeat_interval * 2 {
                        warn!("no traffic for two heartbeat intervals, dropping connection");
                        break;
                    }
                    let client = McpClient { shared: Arc::clone(&shared) };
                    tokio::spawn(async move {
                        if let Err(err) = client.request(methods::PING, None).await {
                            debug!(error = %err, "heartbeat ping failed");
                        }
                    });
                }
            }
        }

        Self::on_connection_lost(shared, connection).await;
    }

    /// Route one inbound line: correlate responses, dispatch notifications
    fn handle_inbound(shared: &Arc<ClientShared>, connection: &Arc<Connection>, line: &str) {
        match classify_inbound(line) {
            Ok(Inbound::Response(response)) => {
                let waiter = connection
                    .pending
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&response.id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    // Timed-out or superseded request; the reply is dropped.
                    None => debug!(id = %response.id, "unmatched response"),
                }
            }
            Ok(Inbound::Notification(notification)) => {
                Self::handle_notification(shared, notification);
            }
            Err(err) => {
                warn!(error = %err, "dropping malformed inbound message");
            }
        }
    }

    /// Server notifications never block the reader: refreshes run on
    /// their own tasks so the worker keeps correlating replies.
    fn handle_notification(shared: &Arc<ClientShared>, notification: JsonRpcNotification) {
        let client = McpClient {
            shared: Arc::clone(shared),
        };
        match notification.method.as_str() {
            methods::TOOLS_LIST_CHANGED => {
                info!("server tool catalog changed");
                tokio::spawn(async move {
                    if let Err(err) = client.refresh_tools().await {
                        warn!(error = %err, "tool rediscovery failed");
                    }
                });
            }
            methods::RESOURCES_LIST_CHANGED => {
                info!("server resource catalog changed");
                tokio::spawn(async move {
                    if let Err(err) = client.refresh_resources().await {
                        warn!(error = %err, "resource rediscovery failed");
                    }
                });
            }
            methods::RESOURCES_UPDATED => {
                let uri = notification
                    .params
                    .as_ref()
                    .and_then(|p| p.get("uri"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                match uri {
                    Some(uri) => {
                        info!(uri = %uri, "subscribed resource updated");
                        tokio::spawn(async move {
                            if let Err(err) = client.read_resource(&uri).await {
                                warn!(uri = %uri, error = %err, "resource re-read failed");
                            }
                        });
                    }
                    None => warn!("resources/updated without a uri"),
                }
            }
            other => debug!(method = %other, "ignoring notification"),
        }
    }

    /// Reconnect loop after an unexpected connection loss. Boxed to break
    /// the `run_worker` -> `connect_locked` -> `run_worker` future cycle,
    /// which would otherwise leave the spawned future unnameable.
    fn on_connection_lost(
        shared: Arc<ClientShared>,
        connection: Arc<Connection>,
    ) -> BoxFuture<'static, ()> {
        Box::pin(Self::reconnect_after_loss(shared, connection))
    }

    async fn reconnect_after_loss(shared: Arc<ClientShared>, connection: Arc<Connection>) {
        {
            let mut guard = shared.connection.write().unwrap_or_else(|e| e.into_inner());
            match guard.as_ref() {
                Some(current) if Arc::ptr_eq(current, &connection) => {
                    *guard = None;
                }
                // A newer connection already replaced this one.
                _ => return,
            }
        }
        connection.fail_pending();
        connection.transport.close().await;
        if connection.cancel.is_cancelled() {
            return;
        }

        let client = McpClient { shared };
        // The epoch was captured when the connection was created, so a
        // disconnect issued at any point since then is observed here
        // even if it raced with the teardown above.
        let epoch = connection.epoch;
        loop {
            if client.reconnect_attempts() >= MAX_RECONNECT_ATTEMPTS {
                client.set_state(ConnectionState::Failed);
                warn!("giving up on reconnection");
                return;
            }
            client.set_state(ConnectionState::Reconnecting);
            tokio::time::sleep(client.shared.config.reconnect_delay).await;

            let _guard = client.shared.connect_lock.lock().await;
            if client.shared.epoch.load(Ordering::SeqCst) != epoch {
                debug!("reconnect superseded by explicit disconnect");
                // Undo the RECONNECTING set above if nothing else has
                // claimed the state since the disconnect.
                if client.state() == ConnectionState::Reconnecting {
                    client.set_state(ConnectionState::Disconnected);
                }
                return;
            }
            if client.state() == ConnectionState::Ready {
                return;
            }
            match client.connect_locked(true).await {
                Ok(()) => {
                    info!("reconnected");
                    return;
                }
                Err(err) => {
                    warn!(
                        attempt = client.reconnect_attempts(),
                        error = %err,
                        "reconnect attempt failed"
                    );
                }
            }
        }
    }
}

/// Short random token for correlation id uniqueness across connections
fn short_token() -> String {
    let mut token = uuid::Uuid::new_v4().simple().to_string();
    token.truncate(8);
    token
}

#[cfg(test)]
mod client_tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Ready.to_string(), "READY");
        assert_eq!(ConnectionState::Reconnecting.to_string(), "RECONNECTING");
    }

    #[test]
    fn test_config_defaults() {
        let config = McpClientConfig::default();
        assert_eq!(config.read_timeout, Duration::from_secs(30));
        assert_eq!(config.supported_protocols, vec![PROTOCOL_VERSION.to_string()]);
    }

    #[test]
    fn test_short_token_length_and_uniqueness() {
        let a = short_token();
        let b = short_token();
        assert_eq!(a.len(), 8);
        assert_ne!(a, b);
    }
}
