//! Three-stage retrieval: broad vector recall, cross-encoder reranking, then
//! generative extraction of the query-relevant span of each survivor.
//!
//! Every stage either hands a (possibly shorter) list to the next one or fails
//! the whole retrieval. Nothing falls back to an earlier stage's ranking.

use crate::models::{
    ChatMessage, Retrieval, RetrievalOptions, RetrievalStage, RetrievedPassage, StageCounts,
};
use crate::traits::{EmbeddingService, GenerationService, RerankService, VectorIndex};
use crate::PipelineError;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Reply the extraction prompt asks for when a passage has nothing relevant.
pub const NO_OUTPUT: &str = "NO_OUTPUT";

pub struct MultiStageRetriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingService>,
    reranker: Arc<dyn RerankService>,
    compressor: Arc<dyn GenerationService>,
    options: RetrievalOptions,
}

impl MultiStageRetriever {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingService>,
        reranker: Arc<dyn RerankService>,
        compressor: Arc<dyn GenerationService>,
        options: RetrievalOptions,
    ) -> Result<Self, PipelineError> {
        if index.is_empty() {
            return Err(PipelineError::EmptyInput("vector index is empty".to_string()));
        }
        if options.recall_k == 0 || options.rerank_top_n == 0 {
            return Err(PipelineError::InvalidArgument(
                "recall_k and rerank_top_n must be positive".to_string(),
            ));
        }

        Ok(Self {
            index,
            embedder,
            reranker,
            compressor,
            options,
        })
    }

    pub fn options(&self) -> RetrievalOptions {
        self.options
    }

    pub async fn retrieve(&self, query: &str) -> Result<Retrieval, PipelineError> {
        if query.trim().is_empty() {
            return Err(PipelineError::InvalidArgument("query is empty".to_string()));
        }

        let recalled = self.recall(query).await?;
        let recalled_count = recalled.len();

        let reranked = self.rerank(query, recalled).await?;
        let reranked_count = reranked.len();

        let passages = self.compress(query, reranked).await?;
        let counts = StageCounts {
            recalled: recalled_count,
            reranked: reranked_count,
            compressed: passages.len(),
        };
        info!(
            recalled = counts.recalled,
            reranked = counts.reranked,
            compressed = counts.compressed,
            "retrieval complete"
        );

        Ok(Retrieval {
            query: query.to_string(),
            passages,
            counts,
        })
    }

    async fn recall(&self, query: &str) -> Result<Vec<RetrievedPassage>, PipelineError> {
        let query_vector = self.embedder.embed_query(query).await.map_err(|source| {
            error!(error = %source, "query embedding failed");
            PipelineError::EmbeddingService(source)
        })?;

        let hits = self.index.search(&query_vector, self.options.recall_k)?;
        Ok(hits
            .into_iter()
            .map(|hit| RetrievedPassage {
                chunk: hit.chunk,
                score: hit.score,
                stage: RetrievalStage::Recall,
                extracted: None,
            })
            .collect())
    }

    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<RetrievedPassage>,
    ) -> Result<Vec<RetrievedPassage>, PipelineError> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let documents = candidates
            .iter()
            .map(|passage| passage.chunk.text.clone())
            .collect::<Vec<_>>();
        let top_n = self.options.rerank_top_n.min(candidates.len());

        let hits = self
            .reranker
            .rerank(query, &documents, top_n)
            .await
            .map_err(|source| {
                error!(error = %source, "rerank failed, dropping all candidates");
                PipelineError::RerankService(source)
            })?;

        let mut slots = candidates.into_iter().map(Some).collect::<Vec<_>>();
        let mut reranked = Vec::with_capacity(top_n);
        for hit in hits.into_iter().take(top_n) {
            let Some(mut passage) = slots.get_mut(hit.index).and_then(Option::take) else {
                continue;
            };
            passage.score = hit.relevance_score;
            passage.stage = RetrievalStage::Rerank;
            reranked.push(passage);
        }

        Ok(reranked)
    }

    async fn compress(
        &self,
        query: &str,
        passages: Vec<RetrievedPassage>,
    ) -> Result<Vec<RetrievedPassage>, PipelineError> {
        let mut kept = Vec::with_capacity(passages.len());

        for mut passage in passages {
            let messages = extraction_prompt(query, &passage.chunk.text);
            let output = self.compressor.generate(&messages).await.map_err(|source| {
                error!(error = %source, chunk = passage.chunk.chunk_index, "extraction failed");
                PipelineError::GenerationService(source)
            })?;

            match parse_extraction(&output) {
                Some(extracted) => {
                    debug!(
                        chunk = passage.chunk.chunk_index,
                        from = passage.chunk.text.len(),
                        to = extracted.len(),
                        "compressed passage"
                    );
                    passage.extracted = Some(extracted);
                    passage.stage = RetrievalStage::Compression;
                    kept.push(passage);
                }
                None => debug!(chunk = passage.chunk.chunk_index, "passage had nothing relevant"),
            }
        }

        Ok(kept)
    }
}

pub fn extraction_prompt(query: &str, passage: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(format!(
        "Given the following question and context, extract any part of the context \
         *AS IS* that is relevant to answer the question. If none of the context is \
         relevant return {NO_OUTPUT}.\n\n\
         Remember, *DO NOT* edit the extracted parts of the context.\n\n\
         > Question: {query}\n\
         > Context:\n>>>\n{passage}\n>>>\n\
         Extracted relevant parts:"
    ))]
}

fn parse_extraction(output: &str) -> Option<String> {
    let cleaned = output.trim();
    if cleaned.is_empty() || cleaned == NO_OUTPUT {
        None
    } else {
        Some(cleaned.to_string())
    }
}
