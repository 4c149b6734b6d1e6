//! Gemini backend (`generateContent`)

use super::{error_body, ChatCompletion, ChatMessage, ChatProvider, ChatUsage};
use crate::config::AiConfig;
use crate::db::models::MessageRole;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const SUMMARY_BUDGET: usize = 12_000;

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}

/// Split system text into `systemInstruction`; assistant turns become `model`
fn build_request(messages: &[ChatMessage]) -> GenerateRequest {
    let mut contents = Vec::with_capacity(messages.len());
    let mut system_instruction = None;

    for message in messages {
        match message.role {
            MessageRole::System => {
                system_instruction = Some(SystemInstruction {
                    parts: vec![Part {
                        text: message.content.clone(),
                    }],
                });
            }
            role => contents.push(Content {
                role: if role == MessageRole::Assistant { "model" } else { "user" },
                parts: vec![Part {
                    text: message.content.clone(),
                }],
            }),
        }
    }

    GenerateRequest {
        contents,
        generation_config: GenerationConfig {
            max_output_tokens: 1024,
            temperature: 0.3,
        },
        system_instruction,
    }
}

pub struct GeminiProvider {
    http: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: Option<String>, model: Option<String>, base_url: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("cortex/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to build Gemini HTTP client: {}", e),
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
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            config.gemini_base_url.clone(),
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn upstream(message: impl Into<String>) -> AppError {
        AppError::Upstream {
            provider: "Gemini".to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn summary_budget(&self) -> usize {
        SUMMARY_BUDGET
    }

    async fn chat_completion(&self, messages: &[ChatMessage]) -> Result<ChatCompletion> {
        let api_key = self.api_key.as_deref().ok_or(AppError::AiNotConfigured)?;

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&build_request(messages))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            let message = match status {
                StatusCode::UNAUTHORIZED => format!(
                    "API key invalid or rejected (401). Create a key in Google AI Studio. Raw: {}",
                    body
                ),
                StatusCode::FORBIDDEN => format!(
                    "API access denied (403). Check key restrictions and region. Raw: {}",
                    body
                ),
                _ => format!("API returned {}: {}", status, body),
            };
            return Err(Self::upstream(message));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Self::upstream(format!("Malformed response: {}", e)))?;

        let content = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .unwrap_or_default();

        let usage = body.usage_metadata.map(|u| ChatUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
            model: self.model.clone(),
        });

        Ok(ChatCompletion { content, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn provider(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new(Some("AIza-test".into()), None, Some(server.base_url())).unwrap()
    }

    #[test]
    fn test_request_maps_roles() {
        let request = build_request(&[
            ChatMessage::system("Be brief."),
            ChatMessage::user("Hi"),
            ChatMessage::new(MessageRole::Assistant, "Hello"),
        ]);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(json["contents"].as_array().unwrap().len(), 2);
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/gemini-2.0-flash:generateContent")
                    .query_param("key", "AIza-test");
                then.status(200).json_body(json!({
                    "candidates": [{"content": {"parts": [{"text": "Sure."}]}}],
                    "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 1, "totalTokenCount": 4}
                }));
            })
            .await;

        let completion = provider(&server)
            .chat_completion(&[ChatMessage::user("Hi")])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(completion.content, "Sure.");
        assert_eq!(completion.usage.unwrap().model, "gemini-2.0-flash");
    }

    #[tokio::test]
    async fn test_forbidden_has_explanation() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(403).body("denied");
            })
            .await;

        let err = provider(&server)
            .chat_completion(&[ChatMessage::user("Hi")])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("access denied (403)"));
    }
}
