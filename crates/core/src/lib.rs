pub mod chunking;
pub mod config;
pub mod conversation;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generation;
mod http;
pub mod index;
pub mod ingest;
pub mod models;
pub mod progress;
pub mod rerank;
pub mod retriever;
pub mod session;
pub mod traits;

pub use chunking::{build_chunks, split_text, validate_options};
pub use config::ServiceConfig;
pub use conversation::{Answer, ConversationEngine, ConversationHistory};
pub use embeddings::CohereEmbedder;
pub use error::{ExtractError, PipelineError, ServiceError};
pub use extractor::{extract_pdf_text, LopdfExtractor, PageText, PdfExtractor};
pub use generation::GroqChat;
pub use index::{build_vector_index, InMemoryIndex};
pub use ingest::{discover_pdf_files, load_pdf_sources, LoadedSources};
pub use models::{
    ChatMessage, Chunk, ChunkingOptions, ConversationTurn, ExtractedText, ExtractionWarning,
    PdfSource, ProcessingReport, Retrieval, RetrievalOptions, RetrievalStage, RetrievedPassage,
    Role, StageCounts,
};
pub use progress::{ProcessingStage, ProgressObserver, RecordingProgress};
pub use rerank::CohereReranker;
pub use retriever::MultiStageRetriever;
pub use session::Session;
pub use traits::{
    EmbeddingService, GenerationService, RerankHit, RerankService, ScoredChunk, ServiceFactory,
    VectorIndex,
};
