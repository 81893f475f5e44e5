//! Direct Responses-API backend client: the backend already speaks the
//! wire format we expose, so this client only forces `store=false` (§4.3)
//! and classifies transport/HTTP failures.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use openai_protocol::responses::{Response, ResponsesRequest};
use reqwest::StatusCode;

use super::sse::frames;
use super::{BackendClient, BackendError, BackendResult, StreamEvent};

pub struct ResponsesBackendClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ResponsesBackendClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/responses", self.base_url.trim_end_matches('/'))
    }

    fn forced_store_false(request: &ResponsesRequest) -> ResponsesRequest {
        let mut req = request.clone();
        req.store = Some(false);
        req
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn classify_status(status: StatusCode, body: &str) -> BackendError {
        if status.is_client_error() {
            BackendError::Client(format!("{status}: {body}"))
        } else {
            BackendError::Server(format!("{status}: {body}"))
        }
    }
}

#[async_trait]
impl BackendClient for ResponsesBackendClient {
    async fn invoke(&self, request: &ResponsesRequest) -> BackendResult<Response> {
        let outbound = Self::forced_store_false(request);
        let req = self.apply_auth(
            self.http
                .post(self.endpoint())
                .header("content-type", "application/json")
                .json(&outbound),
        );

        let resp = req
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(Self::classify_status(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| BackendError::Unparseable(e.to_string()))
    }

    async fn invoke_stream(
        &self,
        request: &ResponsesRequest,
    ) -> BackendResult<BoxStream<'static, BackendResult<StreamEvent>>> {
        let mut outbound = Self::forced_store_false(request);
        outbound.stream = Some(true);

        let req = self.apply_auth(
            self.http
                .post(self.endpoint())
                .header("content-type", "application/json")
                .header("accept", "text/event-stream")
                .json(&outbound),
        );

        let resp = req
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }

        let byte_stream = resp
            .bytes_stream()
            .map(|r| r.map_err(|e| BackendError::Transport(e.to_string())));

        let events = frames(byte_stream).map(|frame| {
            frame.map(|f| StreamEvent {
                event_type: f.event.unwrap_or_default(),
                data: Bytes::from(f.data),
            })
        });

        Ok(Box::pin(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_store_false_overrides_caller_value() {
        let req: ResponsesRequest = serde_json::from_value(serde_json::json!({
            "model": "m",
            "input": "hi",
            "store": true
        }))
        .unwrap();
        let outbound = ResponsesBackendClient::forced_store_false(&req);
        assert_eq!(outbound.store, Some(false));
    }

    #[test]
    fn classify_status_distinguishes_client_and_server_errors() {
        assert!(matches!(
            ResponsesBackendClient::classify_status(StatusCode::BAD_REQUEST, "bad"),
            BackendError::Client(_)
        ));
        assert!(matches!(
            ResponsesBackendClient::classify_status(StatusCode::INTERNAL_SERVER_ERROR, "oops"),
            BackendError::Server(_)
        ));
    }
}
