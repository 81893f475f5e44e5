//! Conversation resolution and history reconstruction (§4.7).

use gw_storage::{
    Conversation, ConversationId, ConversationStorage, NewConversation, ResponseId, ResponseStorage,
};
use openai_protocol::responses::{InputItem, MessageContent, MessageItem, ResponseInput, ResponsesRequest};

use super::EngineError;

/// Resolve (or create) the conversation this request belongs to.
///
/// If `request.conversation` is set, the id must already exist — a miss
/// surfaces as `conversation_not_found` (§7). Otherwise a fresh conversation
/// is created so every response has somewhere to record its transcript.
pub async fn resolve_conversation(
    conversations: &dyn ConversationStorage,
    conversation: Option<&str>,
) -> Result<Conversation, EngineError> {
    match conversation {
        Some(id) => {
            let conv_id = ConversationId(id.to_string());
            conversations
                .get_conversation(&conv_id)
                .await
                .map_err(|e| EngineError::Internal(e.to_string()))?
                .ok_or_else(|| EngineError::ConversationNotFound(id.to_string()))
        }
        None => conversations
            .create_conversation(NewConversation::default())
            .await
            .map_err(|e| EngineError::Internal(e.to_string())),
    }
}

fn is_system_message(item: &InputItem) -> bool {
    matches!(item, InputItem::Message(MessageItem { role, .. }) if role == "system")
}

fn system_message(text: String) -> InputItem {
    InputItem::Message(MessageItem {
        item_type: Some("message".to_string()),
        role: "system".to_string(),
        content: MessageContent::Text(text),
        id: None,
        status: None,
    })
}

fn user_message(text: String) -> InputItem {
    InputItem::Message(MessageItem {
        item_type: Some("message".to_string()),
        role: "user".to_string(),
        content: MessageContent::Text(text),
        id: None,
        status: None,
    })
}

/// Rebuild the rolling message transcript for this turn: replay the prior
/// response's transcript (by conversation, falling back to
/// `previous_response_id`), prepend `instructions` as a system message if one
/// isn't already present, then append the caller's new input (§4.7).
pub async fn build_history(
    responses: &dyn ResponseStorage,
    conversation_id: &ConversationId,
    previous_response_id: Option<&str>,
    request: &ResponsesRequest,
) -> Result<Vec<InputItem>, EngineError> {
    let mut messages: Vec<InputItem> = Vec::new();

    let prior = responses
        .list_responses(conversation_id)
        .await
        .map_err(|e| EngineError::Internal(e.to_string()))?
        .into_iter()
        .next();

    if let Some(prior) = prior {
        messages = prior.messages;
    } else if let Some(prev_id) = previous_response_id {
        if let Some(prev) = responses
            .get_response(&ResponseId(prev_id.to_string()))
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?
        {
            messages = prev.messages;
        }
    }

    if !messages.iter().any(is_system_message) {
        if let Some(instructions) = request.instructions.as_ref().filter(|s| !s.is_empty()) {
            messages.insert(0, system_message(instructions.clone()));
        }
    }

    match &request.input {
        ResponseInput::Text(text) => messages.push(user_message(text.clone())),
        ResponseInput::Items(items) => messages.extend(items.clone()),
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gw_storage::{InMemoryConversationStorage, InMemoryResponseStorage, StoredResponse};
    use serde_json::json;

    #[tokio::test]
    async fn unknown_conversation_id_is_not_found() {
        let storage = InMemoryConversationStorage::new();
        let result = resolve_conversation(&storage, Some("conv_missing")).await;
        assert!(matches!(result, Err(EngineError::ConversationNotFound(_))));
    }

    #[tokio::test]
    async fn no_conversation_creates_a_new_one() {
        let storage = InMemoryConversationStorage::new();
        let conv = resolve_conversation(&storage, None).await.unwrap();
        assert!(conv.id.0.starts_with("conv_"));
    }

    #[tokio::test]
    async fn history_prepends_instructions_once() {
        let responses = InMemoryResponseStorage::new();
        let conv_id = ConversationId::new();
        let request: ResponsesRequest = serde_json::from_value(json!({
            "model": "gpt-5",
            "input": "hello",
            "instructions": "be terse",
        }))
        .unwrap();

        let messages = build_history(&responses, &conv_id, None, &request).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert!(is_system_message(&messages[0]));
        assert!(matches!(&messages[1], InputItem::Message(m) if m.role == "user"));
    }

    #[tokio::test]
    async fn history_replays_prior_conversation_transcript() {
        let responses = InMemoryResponseStorage::new();
        let conv_id = ConversationId::new();

        let mut prior = StoredResponse::new("gpt-5", None);
        prior.conversation_id = Some(conv_id.clone());
        prior.messages = vec![system_message("be terse".to_string())];
        responses.save_response(prior).await.unwrap();

        let request: ResponsesRequest = serde_json::from_value(json!({
            "model": "gpt-5",
            "input": "again",
        }))
        .unwrap();

        let messages = build_history(&responses, &conv_id, None, &request).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert!(is_system_message(&messages[0]));
    }
}
