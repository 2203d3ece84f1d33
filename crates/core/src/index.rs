use crate::models::Chunk;
use crate::traits::{EmbeddingService, ScoredChunk, VectorIndex};
use crate::PipelineError;
use tracing::{error, info};

struct IndexedChunk {
    chunk: Chunk,
    vector: Vec<f32>,
    norm: f32,
}

/// Exact cosine-similarity index over one processed document set.
pub struct InMemoryIndex {
    entries: Vec<IndexedChunk>,
    dimensions: usize,
}

impl InMemoryIndex {
    pub fn from_embeddings(
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, PipelineError> {
        if chunks.len() != embeddings.len() {
            return Err(PipelineError::Index(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dimensions = embeddings.first().map(Vec::len).unwrap_or_default();
        if dimensions == 0 && !embeddings.is_empty() {
            return Err(PipelineError::Index("embeddings have zero dimensions".to_string()));
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, vector)| {
                if vector.len() != dimensions {
                    return Err(PipelineError::Index(format!(
                        "embedding dimension {} != {} for chunk {}",
                        vector.len(),
                        dimensions,
                        chunk.chunk_index
                    )));
                }
                let norm = l2_norm(&vector);
                Ok(IndexedChunk {
                    chunk,
                    vector,
                    norm,
                })
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;

        Ok(Self {
            entries,
            dimensions,
        })
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|entry| &entry.chunk)
    }
}

impl VectorIndex for InMemoryIndex {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, PipelineError> {
        if query_vector.len() != self.dimensions {
            return Err(PipelineError::Index(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.dimensions
            )));
        }

        let query_norm = l2_norm(query_vector);
        let mut scored = self
            .entries
            .iter()
            .map(|entry| (entry, cosine(query_vector, query_norm, &entry.vector, entry.norm)))
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| {
            right
                .1
                .total_cmp(&left.1)
                .then(left.0.chunk.chunk_index.cmp(&right.0.chunk.chunk_index))
        });

        Ok(scored
            .into_iter()
            .take(k.min(self.entries.len()))
            .map(|(entry, score)| ScoredChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }
}

fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|value| value * value).sum::<f32>().sqrt()
}

fn cosine(left: &[f32], left_norm: f32, right: &[f32], right_norm: f32) -> f32 {
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    let dot = left
        .iter()
        .zip(right)
        .map(|(a, b)| a * b)
        .sum::<f32>();
    dot / (left_norm * right_norm)
}

/// Embeds every chunk once, in order, and indexes the lot. No partial index
/// is returned when the embedding call fails.
pub async fn build_vector_index(
    chunks: Vec<Chunk>,
    embedder: &dyn EmbeddingService,
) -> Result<InMemoryIndex, PipelineError> {
    if chunks.is_empty() {
        return Err(PipelineError::EmptyInput(
            "no text available for vectorization".to_string(),
        ));
    }

    let texts = chunks
        .iter()
        .map(|chunk| chunk.text.clone())
        .collect::<Vec<_>>();

    let embeddings = embedder.embed_documents(&texts).await.map_err(|source| {
        error!(model = embedder.model_name(), error = %source, "vectorization failed");
        PipelineError::EmbeddingService(source)
    })?;

    let index = InMemoryIndex::from_embeddings(chunks, embeddings)?;
    info!(
        model = embedder.model_name(),
        vectors = index.len(),
        dimensions = index.dimensions(),
        "vector index built"
    );
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServiceError;
    use async_trait::async_trait;

    const VOCABULARY: [&str; 4] = ["paris", "france", "hydraulic", "pump"];

    /// One dimension per vocabulary word the text mentions.
    struct KeywordEmbedder;

    impl KeywordEmbedder {
        fn embed(text: &str) -> Vec<f32> {
            let lowered = text.to_lowercase();
            VOCABULARY
                .iter()
                .map(|word| if lowered.contains(word) { 1.0 } else { 0.0 })
                .collect()
        }
    }

    #[async_trait]
    impl EmbeddingService for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keywords"
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
            Ok(texts.iter().map(|text| Self::embed(text)).collect())
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
            Ok(Self::embed(text))
        }
    }

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            chunk_id: format!("chunk-{index}"),
            chunk_index: index,
            text: text.to_string(),
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingService for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
            Err(ServiceError::Status {
                service: "cohere-embed".to_string(),
                status: 429,
                body: "quota exceeded".to_string(),
            })
        }

        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
            Err(ServiceError::malformed("cohere-embed", "unused"))
        }
    }

    #[test]
    fn search_orders_by_similarity_and_clamps_k() {
        let index = InMemoryIndex::from_embeddings(
            vec![chunk(0, "a"), chunk(1, "b"), chunk(2, "c")],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
        )
        .expect("index should build");

        let hits = index.search(&[1.0, 0.1], 10).expect("search should succeed");
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk.chunk_index, 0);
        assert_eq!(hits[1].chunk.chunk_index, 2);
        assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let built = InMemoryIndex::from_embeddings(
            vec![chunk(0, "a"), chunk(1, "b")],
            vec![vec![1.0, 0.0], vec![1.0]],
        );
        assert!(matches!(built, Err(PipelineError::Index(_))));

        let index = InMemoryIndex::from_embeddings(vec![chunk(0, "a")], vec![vec![1.0, 0.0]])
            .expect("index should build");
        assert!(matches!(index.search(&[1.0], 1), Err(PipelineError::Index(_))));
    }

    #[tokio::test]
    async fn build_embeds_every_chunk_in_order() {
        let chunks = vec![chunk(0, "hydraulic pump"), chunk(1, "Paris is in France")];
        let index = build_vector_index(chunks, &KeywordEmbedder)
            .await
            .expect("index should build");

        assert_eq!(index.len(), 2);
        assert_eq!(index.dimensions(), VOCABULARY.len());
        assert_eq!(
            index.chunks().map(|chunk| chunk.chunk_index).collect::<Vec<_>>(),
            vec![0, 1]
        );
        let hits = index
            .search(&KeywordEmbedder::embed("capital of France"), 1)
            .expect("search should succeed");
        assert_eq!(hits[0].chunk.chunk_index, 1);
    }

    #[tokio::test]
    async fn empty_chunks_and_service_failures_build_nothing() {
        let empty = build_vector_index(Vec::new(), &KeywordEmbedder).await;
        assert!(matches!(empty, Err(PipelineError::EmptyInput(_))));

        let failed = build_vector_index(vec![chunk(0, "text")], &FailingEmbedder).await;
        assert!(matches!(failed, Err(PipelineError::EmbeddingService(_))));
    }
}
