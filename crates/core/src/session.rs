use crate::chunking::{build_chunks, validate_options};
use crate::conversation::{Answer, ConversationEngine};
use crate::extractor::{extract_pdf_text, LopdfExtractor, PdfExtractor};
use crate::index::build_vector_index;
use crate::models::{
    ChunkingOptions, ConversationTurn, PdfSource, ProcessingReport, Retrieval, RetrievalOptions,
};
use crate::progress::{ProcessingStage, ProgressObserver};
use crate::retriever::MultiStageRetriever;
use crate::traits::{ServiceFactory, VectorIndex};
use crate::PipelineError;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// One user's state: at most one conversation engine (which owns the vector
/// index and the history). Reprocessing replaces it wholesale; a failed
/// action leaves the previous one in place.
pub struct Session<F: ServiceFactory> {
    id: Uuid,
    factory: F,
    extractor: Box<dyn PdfExtractor>,
    chunking: ChunkingOptions,
    retrieval: RetrievalOptions,
    engine: Option<ConversationEngine>,
}

impl<F: ServiceFactory> Session<F> {
    pub fn new(factory: F) -> Self {
        Self {
            id: Uuid::new_v4(),
            factory,
            extractor: Box::new(LopdfExtractor),
            chunking: ChunkingOptions::default(),
            retrieval: RetrievalOptions::default(),
            engine: None,
        }
    }

    pub fn with_extractor(mut self, extractor: impl PdfExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn with_chunking(mut self, chunking: ChunkingOptions) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn with_retrieval(mut self, retrieval: RetrievalOptions) -> Self {
        self.retrieval = retrieval;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_ready(&self) -> bool {
        self.engine.is_some()
    }

    pub fn history(&self) -> &[ConversationTurn] {
        self.engine
            .as_ref()
            .map(|engine| engine.history().turns())
            .unwrap_or_default()
    }

    /// Drops the engine, and with it the index and the history.
    pub fn reset(&mut self) {
        self.engine = None;
    }

    pub async fn process_documents(
        &mut self,
        sources: &[PdfSource],
        progress: &dyn ProgressObserver,
    ) -> Result<ProcessingReport, PipelineError> {
        match self.build_engine(sources, progress).await {
            Ok((engine, report)) => {
                self.engine = Some(engine);
                progress.stage(ProcessingStage::Complete);
                info!(
                    session = %self.id,
                    chunks = report.chunk_count,
                    skipped = report.warnings.len(),
                    "documents processed"
                );
                Ok(report)
            }
            Err(failure) => {
                error!(
                    session = %self.id,
                    stage = failure.stage(),
                    error = %failure,
                    "document processing failed"
                );
                Err(failure)
            }
        }
    }

    async fn build_engine(
        &self,
        sources: &[PdfSource],
        progress: &dyn ProgressObserver,
    ) -> Result<(ConversationEngine, ProcessingReport), PipelineError> {
        if sources.is_empty() {
            return Err(PipelineError::InvalidArgument(
                "upload at least one PDF".to_string(),
            ));
        }
        validate_options(self.chunking)?;

        progress.stage(ProcessingStage::Extracting);
        let extracted = extract_pdf_text(sources, self.extractor.as_ref());
        for warning in &extracted.warnings {
            progress.warning(warning);
        }
        if extracted.text.trim().is_empty() {
            return Err(PipelineError::EmptyInput(
                "no text extracted; PDFs may be image-based".to_string(),
            ));
        }

        progress.stage(ProcessingStage::Chunking);
        let chunks = build_chunks(&extracted.text, self.chunking)?;
        if chunks.is_empty() {
            return Err(PipelineError::EmptyInput(
                "failed to create text chunks".to_string(),
            ));
        }
        let chunk_count = chunks.len();

        progress.stage(ProcessingStage::Embedding);
        let embedder = self.factory.embedder()?;
        let index = build_vector_index(chunks, embedder.as_ref()).await?;
        let indexed_vectors = index.len();
        let embedding_dimensions = index.dimensions();

        progress.stage(ProcessingStage::ChainSetup);
        let generator = self.factory.generator()?;
        let reranker = self.factory.reranker()?;
        let retriever = MultiStageRetriever::new(
            Arc::new(index),
            embedder,
            reranker,
            Arc::clone(&generator),
            self.retrieval,
        )?;

        let report = ProcessingReport {
            files_received: sources.len(),
            files_read: extracted.files_read,
            warnings: extracted.warnings,
            characters_extracted: extracted.text.chars().count(),
            chunk_count,
            indexed_vectors,
            embedding_dimensions,
        };

        Ok((ConversationEngine::new(retriever, generator), report))
    }

    pub async fn ask(&mut self, question: &str) -> Result<Answer, PipelineError> {
        let engine = self.engine.as_mut().ok_or(PipelineError::NotReady)?;
        engine.answer(question).await.inspect_err(|failure| {
            error!(stage = failure.stage(), error = %failure, "question failed");
        })
    }

    /// Runs retrieval alone, without generating an answer or touching history.
    pub async fn retrieve(&self, query: &str) -> Result<Retrieval, PipelineError> {
        let engine = self.engine.as_ref().ok_or(PipelineError::NotReady)?;
        engine.retriever().retrieve(query).await
    }
}
