use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded PDF: display name plus raw bytes.
#[derive(Debug, Clone)]
pub struct PdfSource {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl PdfSource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionWarning {
    pub file_name: String,
    pub reason: String,
}

impl std::fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error processing {}: {}", self.file_name, self.reason)
    }
}

/// Concatenated text of one processing run, plus the files that were skipped.
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    pub text: String,
    pub files_read: usize,
    pub warnings: Vec<ExtractionWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub chunk_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingOptions {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalOptions {
    /// Candidates pulled from the vector index.
    pub recall_k: usize,
    /// Candidates kept after reranking.
    pub rerank_top_n: usize,
    /// Rewrite follow-up questions into standalone ones before retrieving.
    pub condense_follow_ups: bool,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            recall_k: 20,
            rerank_top_n: 10,
            condense_follow_ups: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetrievalStage {
    Recall,
    Rerank,
    Compression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub chunk: Chunk,
    pub score: f32,
    pub stage: RetrievalStage,
    /// Query-relevant sub-span, set by the compression stage.
    pub extracted: Option<String>,
}

impl RetrievedPassage {
    pub fn text(&self) -> &str {
        self.extracted.as_deref().unwrap_or(&self.chunk.text)
    }
}

/// Passage counts at each narrowing step of one retrieval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub recalled: usize,
    pub reranked: usize,
    pub compressed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retrieval {
    pub query: String,
    pub passages: Vec<RetrievedPassage>,
    pub counts: StageCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub files_received: usize,
    pub files_read: usize,
    pub warnings: Vec<ExtractionWarning>,
    pub characters_extracted: usize,
    pub chunk_count: usize,
    pub indexed_vectors: usize,
    pub embedding_dimensions: usize,
}
