use crate::http::JsonEndpoint;
use crate::models::ChatMessage;
use crate::traits::GenerationService;
use crate::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Chat completions through Groq's OpenAI-compatible API.
pub struct GroqChat {
    endpoint: JsonEndpoint,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl GroqChat {
    pub fn new(
        client: Client,
        base_url: &str,
        api_key: &str,
        model: &str,
        temperature: f32,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            endpoint: JsonEndpoint::new(
                "groq-chat",
                client,
                base_url,
                "v1/chat/completions",
                api_key,
            )?,
            model: model.to_string(),
            temperature,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl GenerationService for GroqChat {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, ServiceError> {
        let request = CompletionRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|message| WireMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                })
                .collect(),
            temperature: self.temperature,
        };

        let response: CompletionResponse = self.endpoint.post(&request).await?;
        first_choice_text(self.endpoint.service(), response)
    }
}

fn first_choice_text(service: &str, response: CompletionResponse) -> Result<String, ServiceError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ServiceError::malformed(service, "completion had no message content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_choice_content_is_returned() {
        let parsed: CompletionResponse = serde_json::from_str(
            r#"{"id":"c","object":"chat.completion","choices":[
                {"index":0,"message":{"role":"assistant","content":"Paris."},"finish_reason":"stop"}
            ],"usage":{"total_tokens":12}}"#,
        )
        .expect("payload should parse");

        assert_eq!(first_choice_text("groq-chat", parsed).expect("content"), "Paris.");
    }

    #[test]
    fn missing_choices_are_malformed() {
        let parsed: CompletionResponse =
            serde_json::from_str(r#"{"choices":[]}"#).expect("payload should parse");
        assert!(matches!(
            first_choice_text("groq-chat", parsed),
            Err(ServiceError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn request_serializes_roles_in_lowercase() {
        let messages = [ChatMessage::system("ctx"), ChatMessage::user("q")];
        let request = CompletionRequest {
            model: "llama-3.3-70b-versatile",
            messages: messages
                .iter()
                .map(|message| WireMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                })
                .collect(),
            temperature: 0.5,
        };

        let value = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "q");
        assert_eq!(value["temperature"], 0.5);
    }
}
