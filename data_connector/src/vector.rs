//! Vector search contract consumed by the file-search tool executor (§6).
//! The actual vector store (Milvus, pgvector, ...) lives outside the core;
//! this crate only defines the shape and a stub for tests.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub file_id: String,
    pub chunk_id: String,
    pub content: String,
    pub score: f64,
}

#[derive(Debug, Error)]
pub enum VectorSearchError {
    #[error("vector store not found: {0}")]
    StoreNotFound(String),
    #[error("vector search failed: {0}")]
    Backend(String),
}

#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(
        &self,
        vector_store_id: &str,
        query: &str,
        top_k: u32,
    ) -> Result<Vec<SearchResult>, VectorSearchError>;
}

/// Returns no results for any query. Useful when file_search tools are
/// declared but no vector backend is wired in for a given deployment.
#[derive(Debug, Default)]
pub struct EmptyVectorSearch;

#[async_trait]
impl VectorSearch for EmptyVectorSearch {
    async fn search(
        &self,
        _vector_store_id: &str,
        _query: &str,
        _top_k: u32,
    ) -> Result<Vec<SearchResult>, VectorSearchError> {
        Ok(Vec::new())
    }
}
