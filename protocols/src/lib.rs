//! Wire types for the Responses API and the Chat Completions API, request
//! validation, SSE event-type constants, and id/clock generation.
//!
//! This crate has no engine logic: it is the frozen vocabulary the gateway
//! and the adapter both speak.

pub mod chat;
pub mod common;
pub mod event_types;
pub mod ids;
pub mod responses;
pub mod validated;

pub use common::{InputTokensDetails, OutputTokensDetails, ResponseError, Usage};
pub use responses::{
    FunctionCallItem, FunctionCallOutputItem, InputContentPart, InputItem, MessageContent,
    MessageItem, OutputContentPart, OutputItem, Response, ResponseInput, ResponseStatus,
    ResponsesRequest, ToolChoice, ToolDescriptor,
};
pub use validated::Normalizable;
