use crate::http::JsonEndpoint;
use crate::traits::{RerankHit, RerankService};
use crate::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Cross-encoder reranking through Cohere's `/v1/rerank`.
pub struct CohereReranker {
    endpoint: JsonEndpoint,
    model: String,
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
    return_documents: bool,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    #[serde(default)]
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

impl CohereReranker {
    pub fn new(
        client: Client,
        base_url: &str,
        api_key: &str,
        model: &str,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            endpoint: JsonEndpoint::new("cohere-rerank", client, base_url, "v1/rerank", api_key)?,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl RerankService for CohereReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, ServiceError> {
        if documents.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }

        let request = RerankRequest {
            model: &self.model,
            query,
            documents,
            top_n: top_n.min(documents.len()),
            return_documents: false,
        };
        let response: RerankResponse = self.endpoint.post(&request).await?;
        into_hits(self.endpoint.service(), response, documents.len(), top_n)
    }
}

fn into_hits(
    service: &str,
    response: RerankResponse,
    document_count: usize,
    top_n: usize,
) -> Result<Vec<RerankHit>, ServiceError> {
    let mut hits = Vec::with_capacity(response.results.len());
    for result in response.results {
        if result.index >= document_count {
            return Err(ServiceError::malformed(
                service,
                format!(
                    "result index {} outside {} submitted documents",
                    result.index, document_count
                ),
            ));
        }
        hits.push(RerankHit {
            index: result.index,
            relevance_score: result.relevance_score,
        });
    }

    hits.sort_by(|left, right| right.relevance_score.total_cmp(&left.relevance_score));
    hits.truncate(top_n);
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> RerankResponse {
        serde_json::from_str(json).expect("payload should parse")
    }

    #[test]
    fn results_are_sorted_best_first_and_capped() {
        let parsed = response(
            r#"{"id":"r","results":[
                {"index":2,"relevance_score":0.4},
                {"index":0,"relevance_score":0.9},
                {"index":1,"relevance_score":0.7}
            ],"meta":{}}"#,
        );

        let hits = into_hits("cohere-rerank", parsed, 3, 2).expect("hits should convert");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].index, 0);
        assert_eq!(hits[1].index, 1);
    }

    #[test]
    fn out_of_range_index_is_malformed() {
        let parsed = response(r#"{"results":[{"index":5,"relevance_score":0.4}]}"#);
        let result = into_hits("cohere-rerank", parsed, 3, 3);
        assert!(matches!(result, Err(ServiceError::MalformedResponse { .. })));
    }
}
