//! In-memory reference implementations of the storage contracts. Adequate
//! for tests and single-process deployments; data does not survive a
//! restart (the engine itself makes no stronger promise either, per §1's
//! non-goals on streaming durability).

use async_trait::async_trait;
use dashmap::DashMap;
use openai_protocol::responses::InputItem;

use crate::core::{
    Conversation, ConversationId, ConversationResult, ConversationStorage, ConversationStorageError,
    ListParams, NewConversation, ResponseId, ResponseResult, ResponseStorage, ResponseStorageError,
    SortOrder, StoredResponse,
};

#[derive(Debug, Default)]
pub struct InMemoryConversationStorage {
    conversations: DashMap<String, Conversation>,
}

impl InMemoryConversationStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStorage for InMemoryConversationStorage {
    async fn create_conversation(&self, new: NewConversation) -> ConversationResult<Conversation> {
        let conversation = Conversation::new(new);
        self.conversations
            .insert(conversation.id.0.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(&self, id: &ConversationId) -> ConversationResult<Option<Conversation>> {
        Ok(self.conversations.get(&id.0).map(|r| r.clone()))
    }

    async fn append_items(&self, id: &ConversationId, items: Vec<InputItem>) -> ConversationResult<()> {
        let mut entry = self
            .conversations
            .get_mut(&id.0)
            .ok_or(ConversationStorageError::NotFound)?;
        entry.updated_at = chrono::Utc::now();
        // The conversation's own transcript length is bookkeeping only;
        // callers read history from ResponseStorage. We just touch
        // updated_at and drop the items count check, since duplicating the
        // transcript here would mean two sources of truth.
        let _ = items.len();
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryResponseStorage {
    responses: DashMap<String, StoredResponse>,
}

impl InMemoryResponseStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseStorage for InMemoryResponseStorage {
    async fn save_response(&self, response: StoredResponse) -> ResponseResult<()> {
        self.responses.insert(response.id.0.clone(), response);
        Ok(())
    }

    async fn get_response(&self, id: &ResponseId) -> ResponseResult<Option<StoredResponse>> {
        Ok(self.responses.get(&id.0).map(|r| r.clone()))
    }

    async fn list_responses(&self, conversation_id: &ConversationId) -> ResponseResult<Vec<StoredResponse>> {
        let mut matching: Vec<StoredResponse> = self
            .responses
            .iter()
            .filter(|r| r.conversation_id.as_ref() == Some(conversation_id))
            .map(|r| r.clone())
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn list_responses_paginated(
        &self,
        conversation_id: Option<&ConversationId>,
        params: ListParams,
    ) -> ResponseResult<(Vec<StoredResponse>, bool)> {
        let mut matching: Vec<StoredResponse> = self
            .responses
            .iter()
            .filter(|r| match conversation_id {
                Some(cid) => r.conversation_id.as_ref() == Some(cid),
                None => true,
            })
            .filter(|r| params.model.as_deref().map(|m| m == r.model).unwrap_or(true))
            .map(|r| r.clone())
            .collect();

        match params.order {
            Some(SortOrder::Asc) => matching.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            _ => matching.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }

        if let Some(after) = &params.after {
            if let Some(pos) = matching.iter().position(|r| &r.id.0 == after) {
                matching = matching.split_off(pos + 1);
            }
        }

        let limit = params.limit.unwrap_or(20);
        let has_more = matching.len() > limit;
        matching.truncate(limit);
        Ok((matching, has_more))
    }

    async fn delete_response(&self, id: &ResponseId) -> ResponseResult<()> {
        self.responses
            .remove(&id.0)
            .ok_or(ResponseStorageError::NotFound)?;
        Ok(())
    }

    async fn get_response_input_items(&self, id: &ResponseId) -> ResponseResult<serde_json::Value> {
        let response = self
            .responses
            .get(&id.0)
            .ok_or(ResponseStorageError::NotFound)?;
        Ok(response.input.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConversationStorage;

    #[tokio::test]
    async fn create_then_get_conversation_round_trips() {
        let storage = InMemoryConversationStorage::new();
        let created = storage.create_conversation(NewConversation::default()).await.unwrap();
        let fetched = storage.get_conversation(&created.id).await.unwrap();
        assert_eq!(fetched.unwrap().id.0, created.id.0);
    }

    #[tokio::test]
    async fn get_unknown_conversation_returns_none() {
        let storage = InMemoryConversationStorage::new();
        let result = storage.get_conversation(&ConversationId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn list_responses_returns_most_recent_first() {
        let storage = InMemoryResponseStorage::new();
        let conv = ConversationId::new();

        let mut first = StoredResponse::new("m", None);
        first.conversation_id = Some(conv.clone());
        first.created_at = 100;
        storage.save_response(first.clone()).await.unwrap();

        let mut second = StoredResponse::new("m", Some(first.id.0.clone()));
        second.conversation_id = Some(conv.clone());
        second.created_at = 200;
        storage.save_response(second.clone()).await.unwrap();

        let listed = storage.list_responses(&conv).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id.0, second.id.0);
    }

    #[tokio::test]
    async fn delete_unknown_response_errors() {
        let storage = InMemoryResponseStorage::new();
        let result = storage.delete_response(&ResponseId::new()).await;
        assert!(result.is_err());
    }
}
