//! Full-stack HTTP test of `/v1/responses`: builds the real axum `Router`
//! over a fake backend and drives it with `tower::ServiceExt::oneshot`
//! (no socket, no running server).

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use gw_mcp::StaticConnectorStore;
use gw_storage::{EmptyVectorSearch, InMemoryConversationStorage, InMemoryResponseStorage, ResponseStorage};
use http_body_util::BodyExt;
use openai_protocol::responses::{
    InputItem, MessageContent, OutputContentPart, OutputItem, Response as WireResponse, ResponsesRequest,
};
use parking_lot::Mutex;
use resp_gateway::backend::{BackendClient, BackendError, BackendResult, StreamEvent};
use resp_gateway::engine::Engine;
use resp_gateway::routers;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Scripts a fixed, ordered sequence of backend turns. `invoke` consumes
/// scripted non-streaming turns FIFO; `invoke_stream` consumes scripted
/// streaming turns FIFO, independently of the non-streaming queue.
struct FakeBackend {
    turns: Mutex<Vec<WireResponse>>,
    stream_turns: Mutex<Vec<Vec<StreamEvent>>>,
}

impl FakeBackend {
    fn text_response(text: &str) -> WireResponse {
        let mut response = WireResponse::new("resp_fake".to_string(), "gpt-5".to_string(), 0);
        response.output = vec![OutputItem::Message {
            id: "msg_1".to_string(),
            role: Some("assistant".to_string()),
            status: Some("completed".to_string()),
            content: vec![OutputContentPart::text(text)],
        }];
        response
    }

    fn single_text_reply(text: &str) -> Self {
        Self::sequential(vec![text])
    }

    /// One scripted text turn per call to `invoke`, consumed in the given
    /// order (first element is returned by the first call).
    fn sequential(replies: Vec<&str>) -> Self {
        Self {
            turns: Mutex::new(replies.into_iter().map(Self::text_response).collect()),
            stream_turns: Mutex::new(Vec::new()),
        }
    }

    fn raw_event(event_type: &str, body: Value) -> StreamEvent {
        StreamEvent {
            event_type: event_type.to_string(),
            data: Bytes::from(serde_json::to_vec(&body).unwrap()),
        }
    }

    /// A single-chunk streaming text turn: one delta, then the backend's own
    /// `response.completed` carrying the final assembled response.
    fn streaming(text: &str) -> Self {
        let mut final_response = WireResponse::new("resp_fake".to_string(), "gpt-5".to_string(), 0);
        final_response.output = vec![OutputItem::Message {
            id: "msg_1".to_string(),
            role: Some("assistant".to_string()),
            status: Some("completed".to_string()),
            content: vec![OutputContentPart::text(text)],
        }];

        let events = vec![
            Self::raw_event(
                "response.output_text.delta",
                json!({ "output_index": 0, "item_id": "msg_1", "delta": text }),
            ),
            Self::raw_event("response.completed", json!({ "response": final_response })),
        ];

        Self {
            turns: Mutex::new(Vec::new()),
            stream_turns: Mutex::new(vec![events]),
        }
    }

    /// First call to `invoke` returns `first_reply`; the subsequent call to
    /// `invoke_stream` returns a single streamed turn for `second_reply`.
    /// Used to drive a non-streaming first turn followed by a streaming
    /// second turn in the same conversation.
    fn non_streaming_then_streaming(first_reply: &str, second_reply: &str) -> Self {
        let mut final_response = WireResponse::new("resp_fake".to_string(), "gpt-5".to_string(), 0);
        final_response.output = vec![OutputItem::Message {
            id: "msg_2".to_string(),
            role: Some("assistant".to_string()),
            status: Some("completed".to_string()),
            content: vec![OutputContentPart::text(second_reply)],
        }];
        let events = vec![
            Self::raw_event(
                "response.output_text.delta",
                json!({ "output_index": 0, "item_id": "msg_2", "delta": second_reply }),
            ),
            Self::raw_event("response.completed", json!({ "response": final_response })),
        ];

        Self {
            turns: Mutex::new(vec![Self::text_response(first_reply)]),
            stream_turns: Mutex::new(vec![events]),
        }
    }
}

#[async_trait]
impl BackendClient for FakeBackend {
    async fn invoke(&self, _request: &ResponsesRequest) -> BackendResult<WireResponse> {
        let mut turns = self.turns.lock();
        if turns.is_empty() {
            return Err(BackendError::Server("no more scripted turns".to_string()));
        }
        Ok(turns.remove(0))
    }

    async fn invoke_stream(
        &self,
        _request: &ResponsesRequest,
    ) -> BackendResult<BoxStream<'static, BackendResult<StreamEvent>>> {
        let mut turns = self.stream_turns.lock();
        if turns.is_empty() {
            return Err(BackendError::Server("no more scripted stream turns".to_string()));
        }
        let events = turns.remove(0).into_iter().map(Ok).collect::<Vec<_>>();
        Ok(Box::pin(stream::iter(events)))
    }
}

fn app_with(backend: FakeBackend) -> axum::Router {
    app_with_storage(backend).0
}

/// Also returns the response store backing the router, so a test can inspect
/// the persisted transcript of a turn directly rather than only its reply.
fn app_with_storage(backend: FakeBackend) -> (axum::Router, Arc<InMemoryResponseStorage>) {
    let responses = Arc::new(InMemoryResponseStorage::new());
    let engine = Engine {
        backend: Arc::new(backend),
        connectors: Arc::new(StaticConnectorStore::new()),
        conversations: Arc::new(InMemoryConversationStorage::new()),
        responses: responses.clone(),
        vector_search: Arc::new(EmptyVectorSearch),
        http: reqwest::Client::new(),
    };
    (routers::build(engine), responses)
}

fn test_app() -> axum::Router {
    app_with(FakeBackend::single_text_reply("hello there"))
}

/// True if any message in the stored transcript is a plain-text item whose
/// content contains `needle` — used to confirm a turn's backend call saw (and
/// re-persisted) an earlier turn's messages.
fn transcript_contains(messages: &[InputItem], needle: &str) -> bool {
    messages.iter().any(|item| match item {
        InputItem::Message(m) => matches!(&m.content, MessageContent::Text(text) if text.contains(needle)),
        _ => false,
    })
}

async fn post_json(app: axum::Router, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/responses")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes: Bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value: Value = serde_json::from_slice(&bytes).unwrap();
    (status, value)
}

/// Posts a `stream: true` request and parses the `text/event-stream` body
/// back into the JSON payload of each `data:` line, skipping SSE keep-alive
/// comment lines.
async fn post_streaming(app: axum::Router, body: Value) -> (StatusCode, Vec<Value>) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/responses")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes: Bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8_lossy(&bytes).into_owned();

    let events = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim())
        .filter(|data| !data.is_empty())
        .map(|data| serde_json::from_str::<Value>(data).unwrap())
        .collect();

    (status, events)
}

#[tokio::test]
async fn non_streaming_happy_path_round_trips_a_completed_response() {
    let (status, body) = post_json(
        test_app(),
        json!({
            "model": "gpt-5",
            "input": "say hi",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["output"][0]["type"], "message");
    assert_eq!(body["output"][0]["content"][0]["text"], "hello there");
}

#[tokio::test]
async fn missing_model_is_rejected_with_400() {
    let (status, body) = post_json(
        test_app(),
        json!({
            "input": "say hi",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_request");
}

#[tokio::test]
async fn empty_input_is_rejected_with_400() {
    let (status, body) = post_json(
        test_app(),
        json!({
            "model": "gpt-5",
            "input": "",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_request");
}

#[tokio::test]
async fn healthz_reports_ok() {
    let response = test_app()
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn streaming_happy_path_emits_the_full_sse_lifecycle() {
    let app = app_with(FakeBackend::streaming("hi there"));
    let (status, events) = post_streaming(
        app,
        json!({
            "model": "gpt-5",
            "input": "say hi",
            "stream": true,
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);

    let event_types: Vec<String> = events
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        event_types,
        vec![
            "response.created",
            "response.in_progress",
            "response.output_item.added",
            "response.content_part.added",
            "response.output_text.delta",
            "response.output_text.done",
            "response.content_part.done",
            "response.output_item.done",
            "response.completed",
        ]
    );

    let completed = events.last().unwrap();
    assert_eq!(completed["response"]["output"][0]["content"][0]["text"], "hi there");
}

#[tokio::test]
async fn second_turn_in_the_same_conversation_replays_the_first_turns_transcript() {
    // Regression test: the non-streaming path builds history before
    // persisting, so the second turn's own stored transcript must include
    // the first turn's user input and assistant reply, not just itself.
    let (app, responses) = app_with_storage(FakeBackend::sequential(vec!["first reply", "second reply"]));

    let (status, first) = post_json(
        app.clone(),
        json!({
            "model": "gpt-5",
            "input": "hello",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let conversation_id = first["conversation"].as_str().unwrap().to_string();
    assert_eq!(first["output"][0]["content"][0]["text"], "first reply");

    let (status, second) = post_json(
        app,
        json!({
            "model": "gpt-5",
            "input": "again?",
            "conversation": conversation_id,
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["output"][0]["content"][0]["text"], "second reply");
    assert_eq!(second["conversation"], conversation_id);

    let second_id = gw_storage::ResponseId(second["id"].as_str().unwrap().to_string());
    let stored = responses.get_response(&second_id).await.unwrap().unwrap();
    assert!(
        transcript_contains(&stored.messages, "hello"),
        "second turn's transcript lost the first turn's user input: {:?}",
        stored.messages
    );
    assert!(
        transcript_contains(&stored.messages, "first reply"),
        "second turn's transcript lost the first turn's assistant reply: {:?}",
        stored.messages
    );
}

#[tokio::test]
async fn second_streaming_turn_in_the_same_conversation_replays_the_first_turns_transcript() {
    // Same regression as above, exercised through the streaming path, which
    // is where the early-persist-before-build-history bug actually lived:
    // `drive()` used to persist its own empty in_progress record before
    // calling `build_history`, and `list_responses` is most-recent-first, so
    // the second turn's history built from its own just-persisted empty
    // record instead of the first turn's completed one.
    let (app, responses) =
        app_with_storage(FakeBackend::non_streaming_then_streaming("first reply", "second streaming reply"));

    let (status, first) = post_json(
        app.clone(),
        json!({
            "model": "gpt-5",
            "input": "hello",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let conversation_id = first["conversation"].as_str().unwrap().to_string();

    let (status, events) = post_streaming(
        app,
        json!({
            "model": "gpt-5",
            "input": "again?",
            "conversation": conversation_id,
            "stream": true,
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let completed = events.last().unwrap();
    assert_eq!(completed["type"], "response.completed");
    assert_eq!(
        completed["response"]["output"][0]["content"][0]["text"],
        "second streaming reply"
    );
    let second_id = gw_storage::ResponseId(completed["response"]["id"].as_str().unwrap().to_string());
    let stored = responses.get_response(&second_id).await.unwrap().unwrap();
    assert!(
        transcript_contains(&stored.messages, "hello"),
        "second streaming turn's transcript lost the first turn's user input: {:?}",
        stored.messages
    );
    assert!(
        transcript_contains(&stored.messages, "first reply"),
        "second streaming turn's transcript lost the first turn's assistant reply: {:?}",
        stored.messages
    );
}
