//! Minimal SSE line framing shared by both backend client implementations.
//! Not a general-purpose SSE parser: just enough to split `event:`/`data:`
//! lines on blank-line boundaries, which is all either backend contract
//! (§6) requires.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

/// One parsed SSE frame: the `event:` line (if any) and the concatenated
/// `data:` lines.
#[derive(Debug, Clone, Default)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

struct State<S> {
    stream: S,
    buf: String,
    queue: VecDeque<SseFrame>,
    done: bool,
}

/// Turn a byte stream into a stream of SSE frames, buffering partial lines
/// across chunk boundaries.
pub fn frames<S, E>(bytes_stream: S) -> impl Stream<Item = Result<SseFrame, E>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin + Send + 'static,
    E: Send + 'static,
{
    let initial = State {
        stream: bytes_stream,
        buf: String::new(),
        queue: VecDeque::new(),
        done: false,
    };

    stream::unfold(initial, |mut state| async move {
        loop {
            if let Some(frame) = state.queue.pop_front() {
                return Some((Ok(frame), state));
            }
            if state.done {
                return None;
            }
            match state.stream.next().await {
                Some(Ok(chunk)) => {
                    state.buf.push_str(&String::from_utf8_lossy(&chunk));
                    while let Some(pos) = state.buf.find("\n\n") {
                        let block: String = state.buf.drain(..pos + 2).collect();
                        if let Some(frame) = parse_block(&block) {
                            state.queue.push_back(frame);
                        }
                    }
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.done = true;
                    if !state.buf.trim().is_empty() {
                        if let Some(frame) = parse_block(&state.buf.clone()) {
                            return Some((Ok(frame), state));
                        }
                    }
                    return None;
                }
            }
        }
    })
}

fn parse_block(block: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut data_lines = Vec::new();
    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim().to_string());
        }
    }
    if data_lines.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_block_extracts_event_and_data() {
        let block = "event: response.created\ndata: {\"a\":1}\n\n";
        let frame = parse_block(block).unwrap();
        assert_eq!(frame.event.as_deref(), Some("response.created"));
        assert_eq!(frame.data, "{\"a\":1}");
    }

    #[test]
    fn parse_block_without_event_line() {
        let block = "data: {\"a\":1}\n\n";
        let frame = parse_block(block).unwrap();
        assert_eq!(frame.event, None);
        assert_eq!(frame.data, "{\"a\":1}");
    }

    #[test]
    fn parse_block_with_no_data_returns_none() {
        assert!(parse_block(": keep-alive\n\n").is_none());
    }

    #[tokio::test]
    async fn frames_splits_multiple_blocks_across_chunks() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"event: a\ndata: {\"x\":1}\n\n")),
            Ok(Bytes::from_static(b"data: {\"x\":2}\n\n")),
        ];
        let s = frames(stream::iter(chunks));
        let collected: Vec<_> = s.collect().await;
        assert_eq!(collected.len(), 2);
        assert!(collected[0].as_ref().unwrap().event.as_deref() == Some("a"));
        assert_eq!(collected[1].as_ref().unwrap().data, "{\"x\":2}");
    }
}
