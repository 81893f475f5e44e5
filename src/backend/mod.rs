//! The backend client abstraction (§4.3): one contract, two implementations.
//! `ResponsesBackendClient` speaks the Responses API directly;
//! `ChatCompletionsAdapter` translates to/from Chat Completions.

pub mod chat_adapter;
pub mod responses_client;
pub mod sse;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use openai_protocol::responses::{Response, ResponsesRequest};
use thiserror::Error;

pub use chat_adapter::ChatCompletionsAdapter;
pub use responses_client::ResponsesBackendClient;

/// One raw SSE event as produced by the backend, before the streaming
/// normalizer (or the Chat adapter's translation layer) touches it.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub event_type: String,
    pub data: Bytes,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend rejected request: {0}")]
    Client(String),
    #[error("backend returned server error: {0}")]
    Server(String),
    #[error("backend transport failure: {0}")]
    Transport(String),
    #[error("backend response could not be parsed: {0}")]
    Unparseable(String),
}

impl BackendError {
    /// §7 error kind this backend failure surfaces as.
    pub fn error_kind(&self) -> &'static str {
        "llm_error"
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn invoke(&self, request: &ResponsesRequest) -> BackendResult<Response>;

    async fn invoke_stream(
        &self,
        request: &ResponsesRequest,
    ) -> BackendResult<BoxStream<'static, BackendResult<StreamEvent>>>;
}
