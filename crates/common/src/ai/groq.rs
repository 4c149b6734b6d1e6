//! Groq backend (OpenAI-compatible chat completions)

use super::{error_body, ChatCompletion, ChatMessage, ChatProvider, ChatUsage};
use crate::config::AiConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
const SUMMARY_BUDGET: usize = 10_000;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_completion_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
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

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

pub struct GroqProvider {
    http: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GroqProvider {
    pub fn new(api_key: Option<String>, model: Option<String>, base_url: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("cortex/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to build Groq HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    pub fn from_config(config: &AiConfig) -> Result<Self> {
        Self::new(
            config.groq_api_key.clone(),
            config.groq_model.clone(),
            config.groq_base_url.clone(),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn upstream(message: impl Into<String>) -> AppError {
        AppError::Upstream {
            provider: "Groq".to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for GroqProvider {
    fn name(&self) -> &'static str {
        "groq"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn summary_budget(&self) -> usize {
        SUMMARY_BUDGET
    }

    async fn chat_completion(&self, messages: &[ChatMessage]) -> Result<ChatCompletion> {
        let api_key = self.api_key.as_deref().ok_or(AppError::AiNotConfigured)?;

        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: 0.7,
            max_completion_tokens: 1024,
            top_p: 1.0,
            stream: false,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(Self::upstream(format!("API returned {}: {}", status, body)));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Self::upstream(format!("Malformed response: {}", e)))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let model = body.model.unwrap_or_else(|| self.model.clone());
        let usage = body.usage.map(|u| ChatUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
            model,
        });

        Ok(ChatCompletion { content, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn provider(server: &MockServer) -> GroqProvider {
        GroqProvider::new(Some("gsk_test".into()), None, Some(server.base_url())).unwrap()
    }

    #[test]
    fn test_blank_key_is_unconfigured() {
        let provider = GroqProvider::new(Some("   ".into()), None, None).unwrap();
        assert!(!provider.is_configured());
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer gsk_test")
                    .json_body_partial(r#"{"model":"llama-3.3-70b-versatile","stream":false}"#);
                then.status(200).json_body(json!({
                    "model": "llama-3.3-70b-versatile",
                    "choices": [{"message": {"role": "assistant", "content": "Hello!"}}],
                    "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
                }));
            })
            .await;

        let completion = provider(&server)
            .chat_completion(&[ChatMessage::user("Hi")])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(completion.content, "Hello!");
        let usage = completion.usage.unwrap();
        assert_eq!(usage.total_tokens, 7);
        assert_eq!(usage.model, "llama-3.3-70b-versatile");
    }

    #[tokio::test]
    async fn test_error_status_is_upstream() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(429).body("rate limited");
            })
            .await;

        let err = provider(&server)
            .chat_completion(&[ChatMessage::user("Hi")])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Upstream { .. }));
        assert!(err.to_string().contains("429"));
    }
}
