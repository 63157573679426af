//! MCP server implementation.
//!
//! This module provides the protocol server that handles tool discovery
//! and execution, plus the stdio transport loop. The SSE transport
//! lives in [`crate::sse_transport`] and reuses [`McpServer::handle_request`].

use crate::error::McpError;
use crate::executor::ToolExecutor;
use crate::protocol::{CallToolParams, JsonRpcRequest, JsonRpcResponse};
use serde_json::{Value, json};
use std::io::{BufRead, Write};

/// The MCP server: a tool executor behind a JSON-RPC method table.
pub struct McpServer {
    executor: ToolExecutor,
}

impl McpServer {
    /// Create a new MCP server around an executor.
    pub fn new(executor: ToolExecutor) -> Self {
        Self { executor }
    }

    /// The executor serving this server's tool calls.
    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    /// Run the server over stdio: one trusted local client, one session
    /// for the process lifetime, strictly sequential requests.
    pub async fn run_stdio(&self) -> Result<(), McpError> {
        tracing::info!("starting MCP server with stdio transport");

        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let mut stdout_lock = stdout.lock();

        for line in stdin.lock().lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = serde_json::from_str(&line)?;
            let response = self.handle_request(request).await;
            let response_json = serde_json::to_string(&response)?;

            writeln!(stdout_lock, "{}", response_json)?;
            stdout_lock.flush()?;
        }

        Ok(())
    }

    /// Handle a JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "initialized" => JsonRpcResponse::success(id, json!({})),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params).await,
            "shutdown" => self.handle_shutdown(id),
            _ => JsonRpcResponse::error(
                id,
                -32601,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {
                "name": "miga-mcp",
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {
                "tools": {}
            }
        });
        JsonRpcResponse::success(id, result)
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools: Vec<_> = self
            .executor
            .registry()
            .list()
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema
                })
            })
            .collect();

        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(id, -32602, format!("Invalid params: {}", e));
                }
            },
            None => return JsonRpcResponse::error(id, -32602, "Missing params"),
        };

        // Unknown tools and handler failures come back as error-flagged
        // results, never as JSON-RPC faults.
        let response = self.executor.call_tool(&params).await;

        match serde_json::to_value(&response) {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => JsonRpcResponse::error(id, -32603, format!("Serialization error: {}", e)),
        }
    }

    fn handle_shutdown(&self, id: Option<Value>) -> JsonRpcResponse {
        tracing::info!("MCP server shutdown requested");
        JsonRpcResponse::success(id, json!(null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;
    use miga_adapter_pg::ConnectionProvider;
    use miga_core::Transport;

    fn test_server() -> McpServer {
        let registry = ToolRegistry::builtin(Transport::Stdio);
        let provider = ConnectionProvider::per_request("MIGA_TEST_DB_URL_UNSET");
        McpServer::new(ToolExecutor::new(registry, provider))
    }

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let response = test_server()
            .handle_request(request("initialize", None))
            .await;

        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "miga-mcp");
    }

    #[tokio::test]
    async fn list_tools_returns_the_catalog() {
        let response = test_server()
            .handle_request(request("tools/list", None))
            .await;

        let result = response.result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 4);
    }

    #[tokio::test]
    async fn unknown_method_is_a_jsonrpc_error() {
        let response = test_server()
            .handle_request(request("approvals/list", None))
            .await;

        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn unknown_tool_is_a_flagged_result_not_a_jsonrpc_error() {
        let response = test_server()
            .handle_request(request(
                "tools/call",
                Some(json!({"name": "nonexistent", "arguments": {}})),
            ))
            .await;

        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], json!(true));
    }

    #[tokio::test]
    async fn missing_params_is_a_jsonrpc_error() {
        let response = test_server()
            .handle_request(request("tools/call", None))
            .await;

        assert_eq!(response.error.unwrap().code, -32602);
    }
}
