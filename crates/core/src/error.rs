use thiserror::Error;

/// Failure while reading text out of a single PDF. Never aborts a batch; the
/// extractor downgrades it to an [`crate::ExtractionWarning`].
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("pdf parse error: {0}")]
    PdfParse(String),
}

/// Transport-level failure talking to a hosted model service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("{service} returned {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },

    #[error("invalid response from {service}: {details}")]
    MalformedResponse { service: String, details: String },
}

impl ServiceError {
    pub fn malformed(service: &str, details: impl Into<String>) -> Self {
        Self::MalformedResponse {
            service: service.to_string(),
            details: details.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error at {stage} stage: {message}")]
    Configuration {
        stage: &'static str,
        message: String,
    },

    #[error("no usable input: {0}")]
    EmptyInput(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("embedding stage failed: {0}")]
    EmbeddingService(#[source] ServiceError),

    #[error("rerank stage failed: {0}")]
    RerankService(#[source] ServiceError),

    #[error("generation stage failed: {0}")]
    GenerationService(#[source] ServiceError),

    #[error("vector index error: {0}")]
    Index(String),

    #[error("no documents processed yet: process documents first")]
    NotReady,
}

impl PipelineError {
    pub fn configuration(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Configuration {
            stage,
            message: message.into(),
        }
    }

    /// Pipeline stage the failure belongs to, for status lines.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Configuration { stage, .. } => stage,
            Self::EmptyInput(_) => "extraction",
            Self::InvalidChunkConfig(_) => "chunking",
            Self::InvalidArgument(_) => "input",
            Self::EmbeddingService(_) | Self::Index(_) => "vector store",
            Self::RerankService(_) => "rerank",
            Self::GenerationService(_) => "generation",
            Self::NotReady => "session",
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
