//! The streaming normalizer (§4.9): reshapes whatever a backend actually
//! emits into the strict `added → delta* → done → item_done` envelope the
//! SDK contract requires, with one content_index per part and a single
//! monotonically increasing `sequence_number` owned by the gateway.

use std::collections::BTreeMap;

use bytes::Bytes;
use openai_protocol::event_types::{ContentPartEvent, FunctionCallEvent, OutputItemEvent, OutputTextEvent, ResponseEvent};
use openai_protocol::responses::Response;
use serde_json::Value;

use crate::backend::StreamEvent;

#[derive(Clone, Default)]
struct TextOutputState {
    item_id: String,
    text: String,
}

/// Per-request normalizer state. One instance lives for the whole streamed
/// response; `reset_indices` clears per-iteration output-index bookkeeping
/// between backend invocations in the agentic loop, since each backend call
/// starts its own `output_index` numbering from zero.
pub struct Normalizer {
    gateway_response_id: String,
    sequence: u64,
    text_outputs: BTreeMap<i64, TextOutputState>,
    function_outputs: BTreeMap<i64, String>,
    final_response: Option<Response>,
}

impl Normalizer {
    pub fn new(gateway_response_id: impl Into<String>) -> Self {
        Self {
            gateway_response_id: gateway_response_id.into(),
            sequence: 0,
            text_outputs: BTreeMap::new(),
            function_outputs: BTreeMap::new(),
            final_response: None,
        }
    }

    fn next_sequence(&mut self) -> u64 {
        let n = self.sequence;
        self.sequence += 1;
        n
    }

    /// Stamp `type`, the gateway's `response_id`, and a fresh
    /// `sequence_number` onto `body`, and wrap it as a wire event. Public so
    /// the engine loop can emit lifecycle events (`response.created`, a
    /// synthesized tool-call `output_item.added/done`, ...) through the same
    /// sequence counter as normalized backend events.
    pub fn emit(&mut self, event_type: &str, mut body: Value) -> StreamEvent {
        if let Some(obj) = body.as_object_mut() {
            obj.insert("type".to_string(), Value::String(event_type.to_string()));
            obj.insert(
                "response_id".to_string(),
                Value::String(self.gateway_response_id.clone()),
            );
            obj.insert("sequence_number".to_string(), Value::from(self.next_sequence()));
        }
        StreamEvent {
            event_type: event_type.to_string(),
            data: Bytes::from(serde_json::to_vec(&body).unwrap_or_default()),
        }
    }

    /// Clear output-index bookkeeping between iterations of the agentic loop.
    /// Callers must have already drained `flush()` for the just-finished
    /// iteration before calling this.
    pub fn reset_indices(&mut self) {
        self.text_outputs.clear();
        self.function_outputs.clear();
    }

    /// Take the `response.completed` payload the normalizer parsed and
    /// swallowed, if the backend sent one this iteration.
    pub fn take_final_response(&mut self) -> Option<Response> {
        self.final_response.take()
    }

    /// Apply the §4.9 per-event-type policy to one raw backend event.
    pub fn normalize(&mut self, event: StreamEvent) -> Vec<StreamEvent> {
        let Ok(body) = serde_json::from_slice::<Value>(&event.data) else {
            // Unparseable backend body: pass the original bytes through
            // unchanged rather than attempting to reinterpret them (§4.10).
            return vec![event];
        };

        match event.event_type.as_str() {
            ResponseEvent::CREATED | "response.queued" | ResponseEvent::IN_PROGRESS => vec![],
            ResponseEvent::COMPLETED => {
                if let Some(response) = body.get("response").cloned() {
                    if let Ok(response) = serde_json::from_value::<Response>(response) {
                        self.final_response = Some(response);
                    }
                }
                vec![]
            }
            ResponseEvent::FAILED => vec![self.emit(ResponseEvent::FAILED, body)],
            OutputItemEvent::ADDED
            | OutputItemEvent::DONE
            | ContentPartEvent::ADDED
            | ContentPartEvent::DONE
            | OutputTextEvent::DONE => vec![],
            OutputTextEvent::DELTA => self.handle_text_delta(body),
            FunctionCallEvent::ARGUMENTS_DELTA => self.handle_function_delta(body),
            other => vec![self.emit(other, body)],
        }
    }

    fn handle_text_delta(&mut self, body: Value) -> Vec<StreamEvent> {
        let output_index = body.get("output_index").and_then(Value::as_i64).unwrap_or(0);
        let item_id = body
            .get("item_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let delta = body
            .get("delta")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut events = Vec::new();
        if !self.text_outputs.contains_key(&output_index) {
            events.push(self.emit(
                OutputItemEvent::ADDED,
                serde_json::json!({
                    "output_index": output_index,
                    "item": {
                        "id": item_id,
                        "type": "message",
                        "role": "assistant",
                        "status": "in_progress",
                        "content": [],
                    },
                }),
            ));
            events.push(self.emit(
                ContentPartEvent::ADDED,
                serde_json::json!({
                    "output_index": output_index,
                    "content_index": 0,
                    "item_id": item_id,
                    "part": { "type": "output_text", "text": "" },
                }),
            ));
            self.text_outputs.insert(
                output_index,
                TextOutputState {
                    item_id: item_id.clone(),
                    text: String::new(),
                },
            );
        }
        if let Some(state) = self.text_outputs.get_mut(&output_index) {
            state.text.push_str(&delta);
        }
        events.push(self.emit(
            OutputTextEvent::DELTA,
            serde_json::json!({
                "output_index": output_index,
                "content_index": 0,
                "item_id": item_id,
                "delta": delta,
            }),
        ));
        events
    }

    fn handle_function_delta(&mut self, body: Value) -> Vec<StreamEvent> {
        let output_index = body.get("output_index").and_then(Value::as_i64).unwrap_or(0);
        let item_id = body
            .get("item_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let delta = body
            .get("delta")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut events = Vec::new();
        if !self.function_outputs.contains_key(&output_index) {
            events.push(self.emit(
                OutputItemEvent::ADDED,
                serde_json::json!({
                    "output_index": output_index,
                    "item": { "id": item_id, "type": "function_call", "status": "in_progress" },
                }),
            ));
            self.function_outputs.insert(output_index, item_id.clone());
        }
        events.push(self.emit(
            FunctionCallEvent::ARGUMENTS_DELTA,
            serde_json::json!({
                "output_index": output_index,
                "item_id": item_id,
                "delta": delta,
            }),
        ));
        events
    }

    /// After the backend stream ends, close out every text output that
    /// accumulated deltas, in order: `output_text.done`, `content_part.done`,
    /// `output_item.done` (§4.9).
    pub fn flush(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let indices: Vec<i64> = self.text_outputs.keys().copied().collect();
        for index in indices {
            let Some(state) = self.text_outputs.get(&index).cloned() else {
                continue;
            };
            events.push(self.emit(
                OutputTextEvent::DONE,
                serde_json::json!({
                    "output_index": index,
                    "content_index": 0,
                    "item_id": state.item_id,
                    "text": state.text,
                }),
            ));
            events.push(self.emit(
                ContentPartEvent::DONE,
                serde_json::json!({
                    "output_index": index,
                    "content_index": 0,
                    "item_id": state.item_id,
                    "part": { "type": "output_text", "text": state.text },
                }),
            ));
            events.push(self.emit(
                OutputItemEvent::DONE,
                serde_json::json!({
                    "output_index": index,
                    "item": {
                        "id": state.item_id,
                        "type": "message",
                        "role": "assistant",
                        "status": "completed",
                        "content": [{ "type": "output_text", "text": state.text }],
                    },
                }),
            ));
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(event_type: &str, body: Value) -> StreamEvent {
        StreamEvent {
            event_type: event_type.to_string(),
            data: Bytes::from(serde_json::to_vec(&body).unwrap()),
        }
    }

    #[test]
    fn lifecycle_events_are_dropped() {
        let mut normalizer = Normalizer::new("resp_gw");
        assert!(normalizer.normalize(raw(ResponseEvent::CREATED, serde_json::json!({}))).is_empty());
        assert!(normalizer
            .normalize(raw(ResponseEvent::IN_PROGRESS, serde_json::json!({})))
            .is_empty());
    }

    #[test]
    fn first_text_delta_emits_added_then_part_then_delta() {
        let mut normalizer = Normalizer::new("resp_gw");
        let events = normalizer.normalize(raw(
            OutputTextEvent::DELTA,
            serde_json::json!({ "output_index": 0, "item_id": "msg_1", "delta": "hi" }),
        ));
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event_type, OutputItemEvent::ADDED);
        assert_eq!(events[1].event_type, ContentPartEvent::ADDED);
        assert_eq!(events[2].event_type, OutputTextEvent::DELTA);
    }

    #[test]
    fn subsequent_text_delta_only_emits_delta() {
        let mut normalizer = Normalizer::new("resp_gw");
        normalizer.normalize(raw(
            OutputTextEvent::DELTA,
            serde_json::json!({ "output_index": 0, "item_id": "msg_1", "delta": "hi" }),
        ));
        let events = normalizer.normalize(raw(
            OutputTextEvent::DELTA,
            serde_json::json!({ "output_index": 0, "item_id": "msg_1", "delta": " there" }),
        ));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, OutputTextEvent::DELTA);
    }

    #[test]
    fn sequence_numbers_increase_monotonically() {
        let mut normalizer = Normalizer::new("resp_gw");
        let events = normalizer.normalize(raw(
            OutputTextEvent::DELTA,
            serde_json::json!({ "output_index": 0, "item_id": "msg_1", "delta": "hi" }),
        ));
        let seqs: Vec<u64> = events
            .iter()
            .map(|e| {
                let v: Value = serde_json::from_slice(&e.data).unwrap();
                v["sequence_number"].as_u64().unwrap()
            })
            .collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn flush_closes_out_accumulated_text() {
        let mut normalizer = Normalizer::new("resp_gw");
        normalizer.normalize(raw(
            OutputTextEvent::DELTA,
            serde_json::json!({ "output_index": 0, "item_id": "msg_1", "delta": "hi" }),
        ));
        let events = normalizer.flush();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event_type, OutputTextEvent::DONE);
        assert_eq!(events[1].event_type, ContentPartEvent::DONE);
        assert_eq!(events[2].event_type, OutputItemEvent::DONE);
    }

    #[test]
    fn completed_event_is_parsed_and_swallowed() {
        let mut normalizer = Normalizer::new("resp_gw");
        let response = Response::new("resp_backend".to_string(), "m".to_string(), 1);
        let events = normalizer.normalize(raw(
            ResponseEvent::COMPLETED,
            serde_json::json!({ "response": response }),
        ));
        assert!(events.is_empty());
        assert!(normalizer.take_final_response().is_some());
    }

    #[test]
    fn response_id_is_rewritten_to_the_gateway_id() {
        let mut normalizer = Normalizer::new("resp_gw");
        let events = normalizer.normalize(raw(
            "response.mcp_call.completed",
            serde_json::json!({ "response_id": "resp_upstream" }),
        ));
        let body: Value = serde_json::from_slice(&events[0].data).unwrap();
        assert_eq!(body["response_id"], "resp_gw");
    }
}
