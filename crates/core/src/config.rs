use crate::embeddings::CohereEmbedder;
use crate::generation::GroqChat;
use crate::rerank::CohereReranker;
use crate::traits::{EmbeddingService, GenerationService, RerankService, ServiceFactory};
use crate::PipelineError;
use std::sync::Arc;

pub const COHERE_API_KEY_VAR: &str = "COHERE_API_KEY";
pub const GROQ_API_KEY_VAR: &str = "GROQ_API_KEY";

pub const DEFAULT_COHERE_BASE_URL: &str = "https://api.cohere.com";
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai";
pub const DEFAULT_EMBEDDING_MODEL: &str = "embed-english-v3.0";
pub const DEFAULT_RERANK_MODEL: &str = "rerank-english-v3.0";
pub const DEFAULT_CHAT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_TEMPERATURE: f32 = 0.5;

// Embeddings are needed while the vector store is built; the chat and rerank
// clients only when the retrieval chain is assembled.
const VECTOR_STORE_STAGE: &str = "vector store";
const CHAIN_SETUP_STAGE: &str = "chain setup";

/// Credentials, endpoints and model identifiers for the hosted services.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub cohere_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub cohere_base_url: String,
    pub groq_base_url: String,
    pub embedding_model: String,
    pub rerank_model: String,
    pub chat_model: String,
    pub temperature: f32,
    /// Per-request timeout. `None` leaves requests unbounded.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cohere_api_key: None,
            groq_api_key: None,
            cohere_base_url: DEFAULT_COHERE_BASE_URL.to_string(),
            groq_base_url: DEFAULT_GROQ_BASE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            rerank_model: DEFAULT_RERANK_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            request_timeout_secs: None,
        }
    }
}

impl ServiceConfig {
    /// Defaults plus whatever credentials the environment provides.
    pub fn from_env() -> Self {
        Self {
            cohere_api_key: read_credential(COHERE_API_KEY_VAR),
            groq_api_key: read_credential(GROQ_API_KEY_VAR),
            ..Self::default()
        }
    }

    pub fn with_cohere_api_key(mut self, key: Option<String>) -> Self {
        self.cohere_api_key = key.and_then(non_blank);
        self
    }

    pub fn with_groq_api_key(mut self, key: Option<String>) -> Self {
        self.groq_api_key = key.and_then(non_blank);
        self
    }

    fn cohere_key(&self, stage: &'static str, purpose: &str) -> Result<&str, PipelineError> {
        self.cohere_api_key.as_deref().ok_or_else(|| {
            let message = format!("missing {COHERE_API_KEY_VAR} for {purpose}");
            PipelineError::configuration(stage, message)
        })
    }

    fn groq_key(&self, stage: &'static str) -> Result<&str, PipelineError> {
        self.groq_api_key.as_deref().ok_or_else(|| {
            PipelineError::configuration(stage, format!("missing {GROQ_API_KEY_VAR}"))
        })
    }

    fn http_client(&self, stage: &'static str) -> Result<reqwest::Client, PipelineError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = self.request_timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(secs));
        }
        builder
            .build()
            .map_err(|error| PipelineError::configuration(stage, format!("http client: {error}")))
    }
}

impl ServiceFactory for ServiceConfig {
    fn embedder(&self) -> Result<Arc<dyn EmbeddingService>, PipelineError> {
        let key = self.cohere_key(VECTOR_STORE_STAGE, "embeddings")?;
        let embedder = CohereEmbedder::new(
            self.http_client(VECTOR_STORE_STAGE)?,
            &self.cohere_base_url,
            key,
            &self.embedding_model,
        )
        .map_err(|error| PipelineError::configuration(VECTOR_STORE_STAGE, error.to_string()))?;
        Ok(Arc::new(embedder))
    }

    fn reranker(&self) -> Result<Arc<dyn RerankService>, PipelineError> {
        let key = self.cohere_key(CHAIN_SETUP_STAGE, "reranking")?;
        let reranker = CohereReranker::new(
            self.http_client(CHAIN_SETUP_STAGE)?,
            &self.cohere_base_url,
            key,
            &self.rerank_model,
        )
        .map_err(|error| PipelineError::configuration(CHAIN_SETUP_STAGE, error.to_string()))?;
        Ok(Arc::new(reranker))
    }

    fn generator(&self) -> Result<Arc<dyn GenerationService>, PipelineError> {
        let key = self.groq_key(CHAIN_SETUP_STAGE)?;
        let chat = GroqChat::new(
            self.http_client(CHAIN_SETUP_STAGE)?,
            &self.groq_base_url,
            key,
            &self.chat_model,
            self.temperature,
        )
        .map_err(|error| PipelineError::configuration(CHAIN_SETUP_STAGE, error.to_string()))?;
        Ok(Arc::new(chat))
    }
}

fn read_credential(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(non_blank)
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
