use crate::ServiceError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

/// Bearer-authenticated JSON endpoint of a hosted service.
#[derive(Debug, Clone)]
pub(crate) struct JsonEndpoint {
    service: &'static str,
    client: Client,
    url: Url,
    api_key: String,
}

impl JsonEndpoint {
    pub(crate) fn new(
        service: &'static str,
        client: Client,
        base_url: &str,
        path: &str,
        api_key: &str,
    ) -> Result<Self, ServiceError> {
        let base = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };

        Ok(Self {
            service,
            client,
            url: base.join(path.trim_start_matches('/'))?,
            api_key: api_key.to_string(),
        })
    }

    pub(crate) fn service(&self) -> &'static str {
        self.service
    }

    #[cfg(test)]
    pub(crate) fn url(&self) -> &Url {
        &self.url
    }

    pub(crate) async fn post<B, R>(&self, body: &B) -> Result<R, ServiceError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.api_key)
            .header("accept", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                service: self.service.to_string(),
                status: status.as_u16(),
                body: truncate(&body, 512),
            });
        }

        let payload = response.bytes().await?;
        serde_json::from_slice(&payload)
            .map_err(|error| ServiceError::malformed(self.service, error.to_string()))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
