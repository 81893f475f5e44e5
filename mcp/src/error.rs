use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("mcp connector not found: {0}")]
    ConnectorNotFound(String),

    #[error("mcp transport error: {0}")]
    Transport(String),

    #[error("mcp server returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("mcp tool not found: {0}")]
    ToolNotFound(String),

    #[error("mcp tool execution failed: {0}")]
    ToolExecution(String),

    #[error("mcp response had no session id")]
    MissingSessionId,

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// The `mcp_error` kind surfaced to callers (§7): every MCP-originated
    /// failure maps to the same client-facing error kind, message carries
    /// the detail.
    pub fn error_kind(&self) -> &'static str {
        "mcp_error"
    }
}
