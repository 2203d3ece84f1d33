use crate::http::JsonEndpoint;
use crate::traits::EmbeddingService;
use crate::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Cohere accepts at most this many texts per embed call.
const COHERE_MAX_BATCH: usize = 96;

/// Hosted embeddings through Cohere's `/v1/embed`.
pub struct CohereEmbedder {
    endpoint: JsonEndpoint,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [String],
    input_type: &'static str,
    truncate: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

impl CohereEmbedder {
    pub fn new(
        client: Client,
        base_url: &str,
        api_key: &str,
        model: &str,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            endpoint: JsonEndpoint::new("cohere-embed", client, base_url, "v1/embed", api_key)?,
            model: model.to_string(),
        })
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        input_type: &'static str,
    ) -> Result<Vec<Vec<f32>>, ServiceError> {
        let request = EmbedRequest {
            model: &self.model,
            texts,
            input_type,
            truncate: "END",
        };
        let response: EmbedResponse = self.endpoint.post(&request).await?;
        check_embedding_count(self.endpoint.service(), texts.len(), response.embeddings)
    }
}

#[async_trait]
impl EmbeddingService for CohereEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(COHERE_MAX_BATCH) {
            vectors.extend(self.embed_batch(batch, "search_document").await?);
        }
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let texts = [text.to_string()];
        self.embed_batch(&texts, "search_query")
            .await?
            .pop()
            .ok_or_else(|| {
                ServiceError::malformed(self.endpoint.service(), "empty embedding response")
            })
    }
}

fn check_embedding_count(
    service: &str,
    expected: usize,
    embeddings: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>, ServiceError> {
    if embeddings.len() != expected {
        return Err(ServiceError::malformed(
            service,
            format!("expected {expected} embeddings, got {}", embeddings.len()),
        ));
    }
    Ok(embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_response_parses_and_counts_are_checked() {
        let payload = r#"{"id":"x","embeddings":[[0.1,0.2],[0.3,0.4]],"texts":["a","b"]}"#;
        let parsed: EmbedResponse = serde_json::from_str(payload).expect("payload should parse");

        let vectors = check_embedding_count("cohere-embed", 2, parsed.embeddings)
            .expect("count should match");
        assert_eq!(vectors[1], vec![0.3, 0.4]);

        let short = check_embedding_count("cohere-embed", 3, vec![vec![1.0]]);
        assert!(matches!(short, Err(ServiceError::MalformedResponse { .. })));
    }

    #[test]
    fn embed_request_carries_input_type() {
        let texts = vec!["Paris is the capital of France.".to_string()];
        let request = EmbedRequest {
            model: "embed-english-v3.0",
            texts: &texts,
            input_type: "search_query",
            truncate: "END",
        };

        let body = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(body["input_type"], "search_query");
        assert_eq!(body["texts"][0], "Paris is the capital of France.");
    }
}
