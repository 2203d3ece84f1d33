use crate::models::{ChatMessage, Chunk};
use crate::{PipelineError, ServiceError};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    fn model_name(&self) -> &str;

    /// One vector per text, same order as the input.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankHit {
    /// Position of the passage in the request's document list.
    pub index: usize,
    pub relevance_score: f32,
}

#[async_trait]
pub trait RerankService: Send + Sync {
    /// Best-first hits, at most `top_n` of them.
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, ServiceError>;
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, ServiceError>;
}

/// Builds the hosted services a session needs, failing when credentials are missing.
pub trait ServiceFactory {
    fn embedder(&self) -> Result<Arc<dyn EmbeddingService>, PipelineError>;

    fn reranker(&self) -> Result<Arc<dyn RerankService>, PipelineError>;

    fn generator(&self) -> Result<Arc<dyn GenerationService>, PipelineError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

pub trait VectorIndex: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dimensions(&self) -> usize;

    /// The `k` nearest chunks, best first. `k` larger than the index is clamped.
    fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, PipelineError>;
}
