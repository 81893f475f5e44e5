//! Contracts the engine depends on for conversation and response
//! persistence (§6, §3). Implementations live outside the core; this crate
//! ships an in-memory one (`memory.rs`) suitable for tests and single-node
//! deployments without a durable backend wired in.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use openai_protocol::responses::{InputItem, OutputItem};
use openai_protocol::{common::Usage, ids};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Conversation store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(ids::generate_conversation_id())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewConversation {
    pub id: Option<ConversationId>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: ConversationId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Option<HashMap<String, String>>,
}

impl Conversation {
    pub fn new(new: NewConversation) -> Self {
        let now = Utc::now();
        Self {
            id: new.id.unwrap_or_default(),
            created_at: now,
            updated_at: now,
            metadata: new.metadata,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConversationStorageError {
    #[error("conversation not found")]
    NotFound,
    #[error("storage error: {0}")]
    Storage(String),
}

pub type ConversationResult<T> = Result<T, ConversationStorageError>;

#[async_trait]
pub trait ConversationStorage: Send + Sync {
    async fn create_conversation(&self, new: NewConversation) -> ConversationResult<Conversation>;
    async fn get_conversation(&self, id: &ConversationId) -> ConversationResult<Option<Conversation>>;
    /// Append messages produced by a completed response to the conversation's
    /// durable record. Append-only: never called with fewer items than a
    /// prior call for the same conversation (§3 invariant).
    async fn append_items(&self, id: &ConversationId, items: Vec<InputItem>) -> ConversationResult<()>;
}

// ---------------------------------------------------------------------------
// Response (session) store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponseId(pub String);

impl ResponseId {
    pub fn new() -> Self {
        Self(ids::generate_response_id())
    }
}

impl Default for ResponseId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ResponseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted response, including the rolling chat-message transcript used
/// to reconstruct history for the next turn (§4.7). `output` and `usage`
/// mirror what was returned to the caller; `messages` is engine-internal.
#[derive(Debug, Clone)]
pub struct StoredResponse {
    pub id: ResponseId,
    pub conversation_id: Option<ConversationId>,
    pub previous_response_id: Option<String>,
    pub model: String,
    pub status: String,
    pub input: Value,
    pub messages: Vec<InputItem>,
    pub output: Vec<OutputItem>,
    pub usage: Option<Usage>,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

impl StoredResponse {
    pub fn new(model: impl Into<String>, previous_response_id: Option<String>) -> Self {
        Self {
            id: ResponseId::new(),
            conversation_id: None,
            previous_response_id,
            model: model.into(),
            status: "in_progress".to_string(),
            input: Value::Null,
            messages: Vec::new(),
            output: Vec::new(),
            usage: None,
            created_at: ids::now_seconds(),
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub order: Option<SortOrder>,
    pub after: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Error)]
pub enum ResponseStorageError {
    #[error("response not found")]
    NotFound,
    #[error("storage error: {0}")]
    Storage(String),
}

pub type ResponseResult<T> = Result<T, ResponseStorageError>;

#[async_trait]
pub trait ResponseStorage: Send + Sync {
    async fn save_response(&self, response: StoredResponse) -> ResponseResult<()>;
    async fn get_response(&self, id: &ResponseId) -> ResponseResult<Option<StoredResponse>>;
    /// All responses for a conversation, most-recent first — the engine takes
    /// index 0 as "the most recent response in that conversation" for history
    /// reconstruction (§4.7).
    async fn list_responses(&self, conversation_id: &ConversationId) -> ResponseResult<Vec<StoredResponse>>;
    async fn list_responses_paginated(
        &self,
        conversation_id: Option<&ConversationId>,
        params: ListParams,
    ) -> ResponseResult<(Vec<StoredResponse>, bool)>;
    async fn delete_response(&self, id: &ResponseId) -> ResponseResult<()>;
    async fn get_response_input_items(&self, id: &ResponseId) -> ResponseResult<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_has_conv_prefix() {
        assert!(ConversationId::new().0.starts_with("conv_"));
    }

    #[test]
    fn response_id_has_resp_prefix() {
        assert!(ResponseId::new().0.starts_with("resp_"));
    }

    #[test]
    fn new_stored_response_starts_in_progress() {
        let sr = StoredResponse::new("gpt-5", None);
        assert_eq!(sr.status, "in_progress");
        assert!(sr.completed_at.is_none());
    }
}
