//! Model Context Protocol client stack
//!
//! Wire types, transports, the resilient client, and the tool facade
//! that exposes a remote MCP server through the tool framework.

pub mod client;
pub mod protocol;
pub mod tool;
pub mod transport;

pub use client::{ConnectionState, McpClient, McpClientConfig, MAX_RECONNECT_ATTEMPTS};
pub use protocol::{
    classify_inbound, methods, Inbound, InitializeResult, JsonRpcError, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, RemoteResource, RemoteTool, RequestId, ResourceContent,
    ResourceReadResult, JSONRPC_VERSION, PROTOCOL_VERSION,
};
pub use tool::{metadata_keys, McpTool};
pub use transport::{
    scripted_pair, Connector, ScriptedEndpoint, ScriptedTransport, TcpConnector, TcpTransport,
    Transport,
};
