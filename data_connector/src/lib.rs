//! Conversation and response storage contracts, plus an in-memory reference
//! implementation. Durable backends (SQL, Redis, ...) are external
//! collaborators the engine only ever sees through these traits.

pub mod core;
pub mod memory;
pub mod vector;

pub use core::{
    Conversation, ConversationId, ConversationStorage, ConversationStorageError, ListParams,
    NewConversation, ResponseId, ResponseStorage, ResponseStorageError, SortOrder, StoredResponse,
};
pub use memory::{InMemoryConversationStorage, InMemoryResponseStorage};
pub use vector::{EmptyVectorSearch, SearchResult, VectorSearch, VectorSearchError};
