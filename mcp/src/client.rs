//! Stateless JSON-RPC 2.0 over HTTP MCP client (§4.6).
//!
//! One `McpClient` is created per request against one connector's URL,
//! `initialize`d, used for `tools/list` and any number of `tools/call`s, then
//! dropped. The session id the server hands back from `initialize` is
//! attached to every subsequent request; it is never persisted or reused
//! across requests.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::McpError;

pub const PROTOCOL_VERSION: &str = "2025-03-26";
const SESSION_HEADER: &str = "Mcp-Session-Id";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

/// A tool discovered via `tools/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct McpToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct ToolsListResult {
    #[serde(default)]
    tools: Vec<McpToolDescriptor>,
}

#[derive(Debug, Deserialize)]
struct ToolCallResultBody {
    #[serde(default)]
    content: Vec<ToolCallContentBlock>,
    #[serde(default, rename = "isError")]
    is_error: bool,
}

#[derive(Debug, Deserialize)]
struct ToolCallContentBlock {
    #[serde(default)]
    #[allow(dead_code)]
    r#type: String,
    #[serde(default)]
    text: String,
}

/// Flattened result of a `tools/call`: text blocks joined with newlines.
pub struct McpToolCallResult {
    pub text: String,
    pub is_error: bool,
}

pub struct McpClient {
    http: reqwest::Client,
    url: String,
    session_id: Option<String>,
    next_id: AtomicU64,
}

impl McpClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            session_id: None,
            next_id: AtomicU64::new(1),
        }
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn send(&self, method: &str, params: Option<Value>, expect_response: bool) -> Result<Option<Value>, McpError> {
        let id = if expect_response {
            Some(self.next_request_id())
        } else {
            None
        };
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let mut req = self
            .http
            .post(&self.url)
            .header("content-type", "application/json")
            .header("accept", "application/json, text/event-stream")
            .json(&body);

        if let Some(session) = &self.session_id {
            req = req.header(SESSION_HEADER, session);
        }

        let resp = req.send().await.map_err(McpError::Http)?;

        if !expect_response {
            // Notifications get no body back; a non-2xx is still a transport error.
            if !resp.status().is_success() {
                return Err(McpError::Transport(format!(
                    "mcp notification {} failed with status {}",
                    method,
                    resp.status()
                )));
            }
            return Ok(None);
        }

        if !resp.status().is_success() {
            return Err(McpError::Transport(format!(
                "mcp request {} failed with status {}",
                method,
                resp.status()
            )));
        }

        let rpc: JsonRpcResponse = resp.json().await.map_err(McpError::Http)?;
        if let Some(err) = rpc.error {
            return Err(McpError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(rpc.result)
    }

    /// `initialize` then `notifications/initialized`. Captures the session id
    /// header if the server sends one; MCP servers that don't use sessions
    /// simply leave `session_id` unset.
    pub async fn initialize(&mut self, client_name: &str, client_version: &str) -> Result<(), McpError> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": client_name, "version": client_version },
        });

        let id = self.next_request_id();
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: Some(id),
            method: "initialize",
            params: Some(params),
        };

        let resp = self
            .http
            .post(&self.url)
            .header("content-type", "application/json")
            .header("accept", "application/json, text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(McpError::Http)?;

        if !resp.status().is_success() {
            return Err(McpError::Transport(format!(
                "mcp initialize failed with status {}",
                resp.status()
            )));
        }

        if let Some(session) = resp
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.session_id = Some(session.to_string());
        }

        let rpc: JsonRpcResponse = resp.json().await.map_err(McpError::Http)?;
        if let Some(err) = rpc.error {
            return Err(McpError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        self.send("notifications/initialized", None, false).await?;
        Ok(())
    }

    pub async fn list_tools(&self) -> Result<Vec<McpToolDescriptor>, McpError> {
        let result = self
            .send("tools/list", None, true)
            .await?
            .unwrap_or(Value::Null);
        let parsed: ToolsListResult = serde_json::from_value(result)?;
        Ok(parsed.tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolCallResult, McpError> {
        let params = serde_json::json!({ "name": name, "arguments": arguments });
        let result = self
            .send("tools/call", Some(params), true)
            .await?
            .unwrap_or(Value::Null);
        let parsed: ToolCallResultBody = serde_json::from_value(result)?;
        let text = parsed
            .content
            .into_iter()
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("\n");
        Ok(McpToolCallResult {
            text,
            is_error: parsed.is_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tools_list_result_parses_empty_default() {
        let parsed: ToolsListResult = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(parsed.tools.is_empty());
    }

    #[test]
    fn tool_call_result_flattens_text_blocks() {
        let v = serde_json::json!({
            "content": [{"type": "text", "text": "answer"}, {"type": "text", "text": "is 42"}]
        });
        let parsed: ToolCallResultBody = serde_json::from_value(v).unwrap();
        let joined = parsed.content.into_iter().map(|b| b.text).collect::<Vec<_>>().join("\n");
        assert_eq!(joined, "answer\nis 42");
    }
}
