//! The Request Engine (§4.7, §4.8): conversation resolution, history
//! reconstruction, tool expansion, and the agentic backend loop, in both
//! non-streaming and streaming flavors.

pub mod dispatch;
pub mod history;
pub mod non_streaming;
pub mod normalizer;
pub mod streaming;

use std::sync::Arc;

use gw_mcp::ConnectorStore;
use gw_storage::{ConversationStorage, ResponseStorage, VectorSearch};
use openai_protocol::responses::{OutputContentPart, OutputItem};
use thiserror::Error;

use crate::backend::BackendClient;

/// Default agentic-loop bound when a request doesn't set `max_tool_calls`
/// (§2, §5, §8). Mirrors the upstream system this engine generalizes.
pub const DEFAULT_MAX_TOOL_CALLS: i64 = 10;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),
    #[error("{0}")]
    McpError(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// §7 error kind.
    pub fn error_kind(&self) -> &'static str {
        match self {
            EngineError::InvalidRequest(_) => "invalid_request",
            EngineError::ConversationNotFound(_) => "conversation_not_found",
            EngineError::McpError(_) => "mcp_error",
            EngineError::Backend(_) => "llm_error",
            EngineError::Internal(_) => "internal_error",
        }
    }
}

/// Shared, stateless, safe to clone across every request handler (§5: "the
/// engine holds no mutable per-process state").
#[derive(Clone)]
pub struct Engine {
    pub backend: Arc<dyn BackendClient>,
    pub connectors: Arc<dyn ConnectorStore>,
    pub conversations: Arc<dyn ConversationStorage>,
    pub responses: Arc<dyn ResponseStorage>,
    pub vector_search: Arc<dyn VectorSearch>,
    pub http: reqwest::Client,
}

/// A tool call extracted from a backend turn's output items.
#[derive(Debug, Clone)]
pub struct ToolCallInfo {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

/// Pull the (at most one) message's text and every function-call out of a
/// backend turn's output (`parseOutput` in §4.7's pseudocode).
pub fn parse_output(output: &[OutputItem]) -> (Option<String>, Vec<ToolCallInfo>) {
    let mut text = None;
    let mut tool_calls = Vec::new();

    for item in output {
        match item {
            OutputItem::Message { content, .. } => {
                if let Some(OutputContentPart::OutputText { text: t, .. }) = content.first() {
                    text = Some(t.clone());
                }
            }
            OutputItem::FunctionCall {
                call_id,
                name,
                arguments,
                ..
            } => tool_calls.push(ToolCallInfo {
                call_id: call_id.clone(),
                name: name.clone(),
                arguments: arguments.clone(),
            }),
            OutputItem::FunctionCallOutput { .. } => {}
        }
    }

    (text, tool_calls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use openai_protocol::responses::OutputContentPart;

    #[test]
    fn parse_output_extracts_text_and_tool_calls() {
        let output = vec![
            OutputItem::Message {
                id: "msg_1".into(),
                role: Some("assistant".into()),
                status: Some("completed".into()),
                content: vec![OutputContentPart::text("hi")],
            },
            OutputItem::FunctionCall {
                id: "fc_1".into(),
                call_id: "call_1".into(),
                name: "get_weather".into(),
                arguments: "{}".into(),
                status: None,
            },
        ];
        let (text, tool_calls) = parse_output(&output);
        assert_eq!(text.as_deref(), Some("hi"));
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].name, "get_weather");
    }
}
