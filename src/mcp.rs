use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::{
    client_factory::ClientFactory,
    context::{run_in_scope, RequestScope},
    identity::IdentityResolver,
    tools::{call_tool, tool_definitions},
};

pub const JSONRPC_VERSION: &str = "2.0";
pub const SERVER_NAME: &str = "mcp-server-zendesk";
pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";
const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    // None only when the key is absent; "id": null is still a request.
    #[serde(default, deserialize_with = "present_id")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

fn present_id<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn error_code(&self) -> Option<i64> {
        self.error.as_ref().map(|err| err.code)
    }
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Clone)]
pub struct McpServer {
    resolver: IdentityResolver,
    factory: Arc<dyn ClientFactory>,
}

impl McpServer {
    pub fn new(resolver: IdentityResolver, factory: Arc<dyn ClientFactory>) -> Self {
        Self { resolver, factory }
    }

    /// `None` for notifications.
    pub async fn handle_raw(
        &self,
        raw: &[u8],
        identity_hint: Option<&str>,
    ) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_slice(raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "Rejected unparseable MCP message");
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {err}"),
                ));
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request = match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => request,
            Err(err) => {
                return Some(JsonRpcResponse::error(
                    id,
                    INVALID_REQUEST,
                    format!("Invalid request: {err}"),
                ))
            }
        };

        self.handle_request(request, identity_hint).await
    }

    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        identity_hint: Option<&str>,
    ) -> Option<JsonRpcResponse> {
        let identity = self.resolver.resolve(identity_hint);
        run_in_scope(RequestScope::new(identity), self.dispatch(request)).await
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            debug!(method = %request.method, "Received notification");
            return None;
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                id,
                INVALID_REQUEST,
                "jsonrpc must be 2.0",
            ));
        }

        debug!(method = %request.method, "Handling MCP request");

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::ok(id, initialize_result(request.params.as_ref())),
            "ping" => JsonRpcResponse::ok(id, json!({})),
            "tools/list" => JsonRpcResponse::ok(id, json!({ "tools": tool_definitions() })),
            "tools/call" => self.call(id, request.params).await,
            other => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            ),
        };
        Some(response)
    }

    async fn call(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params = match params.map(serde_json::from_value::<ToolCallParams>) {
            Some(Ok(params)) => params,
            Some(Err(err)) => {
                return JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("Invalid tool call parameters: {err}"),
                )
            }
            None => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing tool call parameters")
            }
        };

        info!(tool = %params.name, "Calling tool");
        match call_tool(self.factory.as_ref(), &params.name, params.arguments).await {
            Some(envelope) => {
                info!(tool = %params.name, success = envelope.is_success(), "Tool call finished");
                JsonRpcResponse::ok(id, envelope.to_call_result())
            }
            None => {
                warn!(tool = %params.name, "Unknown tool requested");
                JsonRpcResponse::error(
                    id,
                    INTERNAL_ERROR,
                    format!("Unknown tool: {}", params.name),
                )
            }
        }
    }
}

fn initialize_result(params: Option<&Value>) -> Value {
    let requested = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str);
    let protocol_version = match requested {
        Some(version) if SUPPORTED_PROTOCOL_VERSIONS.contains(&version) => version,
        _ => LATEST_PROTOCOL_VERSION,
    };

    json!({
        "protocolVersion": protocol_version,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}
