//! Ollama backend (local `/api/chat`)

use super::{error_body, ChatCompletion, ChatMessage, ChatProvider, ChatUsage};
use crate::config::AiConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_MODEL: &str = "llama3.2";
const DEFAULT_TIMEOUT_MS: u64 = 120_000;
const SUMMARY_BUDGET: usize = 4_000;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

pub struct OllamaProvider {
    http: Client,
    base_url: Option<String>,
    model: String,
    timeout: Duration,
}

impl OllamaProvider {
    pub fn new(base_url: Option<String>, model: Option<String>, timeout_ms: Option<u64>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("cortex/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to build Ollama HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url: base_url
                .map(|u| u.trim().trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty()),
            model: model
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_millis(
                timeout_ms.filter(|&ms| ms > 0).unwrap_or(DEFAULT_TIMEOUT_MS),
            ),
        })
    }

    pub fn from_config(config: &AiConfig) -> Result<Self> {
        Self::new(
            config.ollama_base_url.clone(),
            config.ollama_model.clone(),
            config.ollama_timeout_ms,
        )
    }

    fn upstream(message: impl Into<String>) -> AppError {
        AppError::Upstream {
            provider: "Ollama".to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    fn summary_budget(&self) -> usize {
        SUMMARY_BUDGET
    }

    async fn chat_completion(&self, messages: &[ChatMessage]) -> Result<ChatCompletion> {
        let base_url = self.base_url.as_deref().ok_or(AppError::AiNotConfigured)?;

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .http
            .post(format!("{}/api/chat", base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Self::upstream(format!(
                        "Timed out after {}s. Try a smaller document or raise the Ollama timeout.",
                        self.timeout.as_secs()
                    ))
                } else {
                    Self::upstream(format!("Failed to reach {}: {}", base_url, e))
                }
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Self::upstream(format!(
                "Model \"{}\" not found. Run: ollama pull {}",
                self.model, self.model
            )));
        }
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(Self::upstream(format!("API returned {}: {}", status, body)));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Self::upstream(format!("Malformed response: {}", e)))?;

        let content = body.message.map(|m| m.content).unwrap_or_default();
        let usage = ChatUsage {
            prompt_tokens: body.prompt_eval_count,
            completion_tokens: body.eval_count,
            total_tokens: body.prompt_eval_count + body.eval_count,
            model: self.model.clone(),
        };

        Ok(ChatCompletion {
            content,
            usage: Some(usage),
        })
    }
}
