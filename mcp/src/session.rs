//! Bundles an initialized `McpClient` with its discovered tools so the engine
//! doesn't thread a client and a tool list through every call site
//! separately (the pattern the much larger multi-tenant orchestrator this
//! was distilled from uses for the same reason).

use openai_protocol::responses::ToolDescriptor;
use serde_json::Value;

use crate::client::{McpClient, McpToolDescriptor};
use crate::error::McpError;

pub struct McpToolSession {
    client: McpClient,
    tools: Vec<McpToolDescriptor>,
}

impl McpToolSession {
    /// Connect to `url`, run the initialize handshake, and discover tools.
    /// Any failure here is an `mcp_error` per §4.10 ("MCP initialize/list
    /// failure") and the caller should fail the request before calling the
    /// backend at all.
    pub async fn connect(http: reqwest::Client, url: impl Into<String>) -> Result<Self, McpError> {
        let mut client = McpClient::new(http, url);
        client.initialize("resp-gateway", env!("CARGO_PKG_VERSION")).await?;
        let tools = client.list_tools().await?;
        Ok(Self { client, tools })
    }

    /// True if `name` is one of this session's discovered tools (i.e. a
    /// server-side MCP tool call the engine should execute itself rather
    /// than surface to the client).
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }

    /// Function-tool descriptors to splice into the backend request, one per
    /// discovered MCP tool, preserving name/description/inputSchema (§4.5).
    pub fn function_tools(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|t| ToolDescriptor::Function {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.input_schema.clone(),
                strict: None,
            })
            .collect()
    }

    pub async fn execute(&self, name: &str, arguments: Value) -> Result<String, McpError> {
        if !self.has_tool(name) {
            return Err(McpError::ToolNotFound(name.to_string()));
        }
        let result = self.client.call_tool(name, arguments).await?;
        Ok(result.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_tools_preserves_schema() {
        let session = McpToolSession {
            client: McpClient::new(reqwest::Client::new(), "http://example.invalid"),
            tools: vec![McpToolDescriptor {
                name: "lookup".into(),
                description: Some("looks things up".into()),
                input_schema: serde_json::json!({"type": "object"}),
            }],
        };
        let tools = session.function_tools();
        assert_eq!(tools.len(), 1);
        match &tools[0] {
            ToolDescriptor::Function { name, parameters, .. } => {
                assert_eq!(name, "lookup");
                assert_eq!(parameters["type"], "object");
            }
            other => panic!("expected function tool, got {other:?}"),
        }
    }

    #[test]
    fn has_tool_checks_discovered_names() {
        let session = McpToolSession {
            client: McpClient::new(reqwest::Client::new(), "http://example.invalid"),
            tools: vec![McpToolDescriptor {
                name: "lookup".into(),
                description: None,
                input_schema: Value::Null,
            }],
        };
        assert!(session.has_tool("lookup"));
        assert!(!session.has_tool("other"));
    }
}
