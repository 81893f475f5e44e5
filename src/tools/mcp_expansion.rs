use std::collections::HashMap;

use gw_mcp::{ConnectorStore, McpError, McpToolSession};
use openai_protocol::responses::ToolDescriptor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolExpansionError {
    #[error("mcp connector not found: {0}")]
    ConnectorNotFound(String),
    #[error(transparent)]
    Mcp(#[from] McpError),
}

impl ToolExpansionError {
    pub fn error_kind(&self) -> &'static str {
        "mcp_error"
    }
}

/// Expand every `mcp` tool descriptor into its discovered tools' `function`
/// equivalents, connecting a fresh session per `server_label` (§4.5).
/// Non-`mcp` entries are returned untouched.
pub async fn expand_mcp_tools(
    tools: &[ToolDescriptor],
    connectors: &dyn ConnectorStore,
    http: reqwest::Client,
) -> Result<(Vec<ToolDescriptor>, HashMap<String, McpToolSession>), ToolExpansionError> {
    let mut expanded = Vec::new();
    let mut sessions = HashMap::new();

    for tool in tools {
        match tool {
            ToolDescriptor::Mcp { server_label } => {
                let connector = connectors
                    .get_connector(server_label)
                    .await
                    .ok_or_else(|| ToolExpansionError::ConnectorNotFound(server_label.clone()))?;

                let session = McpToolSession::connect(http.clone(), connector.url).await?;
                expanded.extend(session.function_tools());
                sessions.insert(server_label.clone(), session);
            }
            other => expanded.push(other.clone()),
        }
    }

    Ok((expanded, sessions))
}
