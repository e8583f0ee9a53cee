//! JSON-RPC 2.0 wire types for the Model Context Protocol
//!
//! Serde shapes for requests, responses, and notifications, plus the
//! typed payloads of the MCP methods the client speaks. Field names on
//! the wire are camelCase where the protocol requires it.

use crate::error::{PraxisError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// JSON-RPC protocol version on every envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision offered during the handshake
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Method names the client sends or receives
pub mod methods {
    /// Handshake request
    pub const INITIALIZE: &str = "initialize";
    /// Handshake completion notification
    pub const INITIALIZED: &str = "notifications/initialized";
    /// Remote tool discovery
    pub const TOOLS_LIST: &str = "tools/list";
    /// Remote tool invocation
    pub const TOOLS_CALL: &str = "tools/call";
    /// Remote resource discovery
    pub const RESOURCES_LIST: &str = "resources/list";
    /// Resource content fetch
    pub const RESOURCES_READ: &str = "resources/read";
    /// Resource change subscription
    pub const RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
    /// Server-side tool catalog changed
    pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
    /// Server-side resource catalog changed
    pub const RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";
    /// A subscribed resource changed
    pub const RESOURCES_UPDATED: &str = "notifications/resources/updated";
    /// Liveness probe
    pub const PING: &str = "ping";
}

/// Correlation id of a request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id
    Number(i64),
    /// String id
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

/// Outbound request envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Method name
    pub method: String,
    /// Method parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Correlation id
    pub id: RequestId,
}

impl JsonRpcRequest {
    /// Build a request envelope
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// Error object inside a response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code
    pub code: i32,
    /// Human-readable message
    pub message: String,
    /// Optional structured details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Standard JSON-RPC error codes
pub mod error_codes {
    /// Invalid JSON was received
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameters
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal server error
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Inbound response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Result payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error object on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Correlation id echoed from the request
    pub id: RequestId,
}

impl JsonRpcResponse {
    /// Turn the envelope into a result payload, mapping the error
    /// object into a typed error.
    pub fn into_result(self) -> Result<Value> {
        if let Some(err) = self.error {
            return Err(PraxisError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// Notification envelope (no id, no reply)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Method name
    pub method: String,
    /// Notification parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Build a notification envelope
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// A classified inbound message
#[derive(Debug)]
pub enum Inbound {
    /// Reply to one of our requests
    Response(JsonRpcResponse),
    /// Server-initiated notification
    Notification(JsonRpcNotification),
}

/// Classify one raw line off the wire.
///
/// Messages carrying both a method and an id are server-to-client
/// requests; the client does not serve any, so they are protocol
/// errors, as is anything that parses but fits neither shape.
pub fn classify_inbound(raw: &str) -> Result<Inbound> {
    let value: Value = serde_json::from_str(raw)?;
    let has_method = value.get("method").is_some();
    let has_id = value.get("id").map(|id| !id.is_null()).unwrap_or(false);

    match (has_method, has_id) {
        (false, true) => Ok(Inbound::Response(serde_json::from_value(value)?)),
        (true, false) => Ok(Inbound::Notification(serde_json::from_value(value)?)),
        (true, true) => Err(PraxisError::Protocol(format!(
            "unexpected server-to-client request: {}",
            value.get("method").and_then(Value::as_str).unwrap_or("?")
        ))),
        (false, false) => Err(PraxisError::Protocol(
            "message is neither a response nor a notification".to_string(),
        )),
    }
}

/// Parameters of the `initialize` request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol revision the client speaks
    pub protocol_version: String,
    /// What the client can do
    pub capabilities: ClientCapabilities,
    /// Client identification
    pub client_info: ClientInfo,
}

/// Capabilities advertised by the client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Tool invocation support
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    /// Resource access support
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,
}

/// Client name and version sent during the handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client name
    pub name: String,
    /// Client version
    pub version: String,
}

/// Result of the `initialize` request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol revision the server selected
    pub protocol_version: String,
    /// What the server can do
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Server identification
    #[serde(default)]
    pub server_info: Option<Value>,
}

/// Capabilities advertised by the server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool serving support
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    /// Resource serving support
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,
}

/// A tool exposed by the remote server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTool {
    /// Tool name, unique on the server
    pub name: String,
    /// What the tool does
    #[serde(default)]
    pub description: String,
    /// JSON schema of the call arguments
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
    /// Optional server-supplied annotations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Value>,
}

/// A resource exposed by the remote server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteResource {
    /// Resource URI, unique on the server
    pub uri: String,
    /// Resource name
    #[serde(default)]
    pub name: String,
    /// What the resource contains
    #[serde(default)]
    pub description: String,
    /// Content MIME type
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
    /// Optional server-supplied annotations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Value>,
}

/// Result of `tools/list`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsListResult {
    /// The server's tool catalog
    #[serde(default)]
    pub tools: Vec<RemoteTool>,
}

/// Result of `resources/list`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcesListResult {
    /// The server's resource catalog
    #[serde(default)]
    pub resources: Vec<RemoteResource>,
}

/// Parameters of `tools/call`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallParams {
    /// Name of the remote tool
    pub name: String,
    /// Call arguments matching the tool's input schema
    #[serde(default)]
    pub arguments: Value,
}

/// Parameters of `resources/read` and `resources/subscribe`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUriParams {
    /// Target resource URI
    pub uri: String,
}

/// One content block of a read resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContent {
    /// URI the content belongs to
    pub uri: String,
    /// Content MIME type
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
    /// Text content, when textual
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Base64 content, when binary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

/// Result of `resources/read`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceReadResult {
    /// Content blocks of the resource
    #[serde(default)]
    pub contents: Vec<ResourceContent>,
}

#[cfg(test)]
mod protocol_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_envelope_shape() {
        let request = JsonRpcRequest::new(
            methods::TOOLS_CALL,
            Some(json!({"name": "lookup", "arguments": {}})),
            RequestId::from("req_1"),
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["method"], "tools/call");
        assert_eq!(value["id"], "req_1");
    }

    #[test]
    fn test_params_omitted_when_none() {
        let request = JsonRpcRequest::new(methods::TOOLS_LIST, None, RequestId::Number(7));
        let text = serde_json::to_string(&request).unwrap();
        assert!(!text.contains("params"));
    }

    #[test]
    fn test_classify_response() {
        let raw = r#"{"jsonrpc":"2.0","result":{"tools":[]},"id":"req_3"}"#;
        match classify_inbound(raw).unwrap() {
            Inbound::Response(resp) => {
                assert_eq!(resp.id, RequestId::from("req_3"));
                assert!(resp.error.is_none());
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_notification() {
        let raw = r#"{"jsonrpc":"2.0","method":"notifications/tools/list_changed"}"#;
        match classify_inbound(raw).unwrap() {
            Inbound::Notification(n) => assert_eq!(n.method, methods::TOOLS_LIST_CHANGED),
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_rejects_server_request() {
        let raw = r#"{"jsonrpc":"2.0","method":"sampling/createMessage","id":1}"#;
        let err = classify_inbound(raw).unwrap_err();
        assert!(err.to_string().contains("server-to-client"));
    }

    #[test]
    fn test_classify_rejects_garbage() {
        assert!(classify_inbound("not json").is_err());
        assert!(classify_inbound(r#"{"jsonrpc":"2.0"}"#).is_err());
    }

    #[test]
    fn test_error_response_maps_to_rpc_error() {
        let raw = r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found"},"id":2}"#;
        let Inbound::Response(resp) = classify_inbound(raw).unwrap() else {
            panic!("expected response");
        };
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.to_string(), "Server error -32601: Method not found");
    }

    #[test]
    fn test_initialize_params_are_camel_case() {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities {
                tools: Some(json!({})),
                resources: Some(json!({})),
            },
            client_info: ClientInfo {
                name: "praxis".to_string(),
                version: "0.1.0".to_string(),
            },
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["protocolVersion"], "2024-11-05");
        assert!(value.get("clientInfo").is_some());
    }

    #[test]
    fn test_remote_tool_input_schema_field_name() {
        let raw = json!({
            "name": "search",
            "description": "full text search",
            "inputSchema": {"type": "object"}
        });
        let tool: RemoteTool = serde_json::from_value(raw).unwrap();
        assert_eq!(tool.input_schema["type"], "object");
    }

    #[test]
    fn test_resource_read_result_contents() {
        let raw = json!({
            "contents": [
                {"uri": "doc://a", "mimeType": "text/plain", "text": "hello"}
            ]
        });
        let result: ResourceReadResult = serde_json::from_value(raw).unwrap();
        assert_eq!(result.contents.len(), 1);
        assert_eq!(result.contents[0].text.as_deref(), Some("hello"));
    }
}
