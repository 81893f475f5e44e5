//! Responses API gateway: stateful agentic loop, Chat Completions protocol
//! translation, and SSE normalization in front of a Responses- or
//! Chat-Completions-speaking backend.

pub mod backend;
pub mod config;
pub mod engine;
pub mod observability;
pub mod routers;
pub mod tools;
