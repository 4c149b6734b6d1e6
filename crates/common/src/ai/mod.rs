//! Chat completion providers
//!
//! One contract, [`ChatProvider`], over interchangeable backends:
//! - Groq (OpenAI-compatible cloud API)
//! - Gemini (`generateContent`)
//! - Ollama (local `/api/chat`)
//!
//! [`AiService`] resolves the active backend per call: the configured
//! override if that backend is usable, otherwise the first configured
//! backend in Groq → Gemini → Ollama order.

mod gemini;
mod groq;
mod ollama;

pub use gemini::GeminiProvider;
pub use groq::GroqProvider;
pub use ollama::OllamaProvider;

use crate::config::{AiConfig, AiProviderKind};
use crate::db::models::MessageRole;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// A message sent to a chat backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }
}

/// Token accounting reported by a backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub model: String,
}

/// A backend's reply in the common shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: Option<ChatUsage>,
}

/// Interface implemented by chat completion backends
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Stable lowercase name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Whether the backend has enough configuration to be called
    fn is_configured(&self) -> bool;

    /// Characters of document text sent for summarization
    fn summary_budget(&self) -> usize;

    /// Send the conversation and return the first reply
    async fn chat_completion(&self, messages: &[ChatMessage]) -> Result<ChatCompletion>;
}

/// Take at most `max_chars` characters without splitting a code point
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Prompt used for document summaries
pub fn summary_prompt(text: &str, title: Option<&str>) -> String {
    match title.filter(|t| !t.trim().is_empty()) {
        Some(title) => format!(
            "Summarize the following document titled \"{}\" in 2–4 clear sentences. Focus on the main ideas and key points.\n\n---\n\n{}",
            title, text
        ),
        None => format!(
            "Summarize the following document in 2–4 clear sentences. Focus on the main ideas and key points.\n\n---\n\n{}",
            text
        ),
    }
}

fn kind_name(kind: AiProviderKind) -> &'static str {
    match kind {
        AiProviderKind::Groq => "groq",
        AiProviderKind::Gemini => "gemini",
        AiProviderKind::Ollama => "ollama",
    }
}

/// Backend selection plus summarization on top of [`ChatProvider`]
#[derive(Clone)]
pub struct AiService {
    /// In precedence order
    providers: Vec<Arc<dyn ChatProvider>>,
    preferred: Option<&'static str>,
}

impl AiService {
    /// Create a service over `providers` (in precedence order)
    pub fn new(providers: Vec<Arc<dyn ChatProvider>>, preferred: Option<AiProviderKind>) -> Self {
        Self {
            providers,
            preferred: preferred.map(kind_name),
        }
    }

    /// Build the Groq, Gemini and Ollama backends from configuration
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let providers: Vec<Arc<dyn ChatProvider>> = vec![
            Arc::new(GroqProvider::from_config(config)?),
            Arc::new(GeminiProvider::from_config(config)?),
            Arc::new(OllamaProvider::from_config(config)?),
        ];
        Ok(Self::new(providers, config.provider))
    }

    /// The backend the next call will use, if any
    pub fn active_provider(&self) -> Option<&Arc<dyn ChatProvider>> {
        let preferred = self.preferred.and_then(|name| {
            self.providers
                .iter()
                .find(|p| p.name() == name && p.is_configured())
        });
        preferred.or_else(|| self.providers.iter().find(|p| p.is_configured()))
    }

    /// Whether any backend can be called
    pub fn is_configured(&self) -> bool {
        self.active_provider().is_some()
    }

    /// Chat completion on the active backend
    pub async fn chat_completion(&self, messages: &[ChatMessage]) -> Result<ChatCompletion> {
        let provider = self.active_provider().ok_or(AppError::AiNotConfigured)?;
        let start = Instant::now();

        let result = provider.chat_completion(messages).await;
        crate::metrics::record_ai_call(provider.name(), start.elapsed(), result.is_ok());

        match &result {
            Ok(completion) => tracing::debug!(
                provider = provider.name(),
                chars = completion.content.len(),
                "Chat completion succeeded"
            ),
            Err(e) => tracing::warn!(provider = provider.name(), error = %e, "Chat completion failed"),
        }

        result
    }

    /// Summarize `text` in 2–4 sentences, truncating to the backend's budget
    pub async fn summarize(&self, text: &str, title: Option<&str>) -> Result<String> {
        let provider = self.active_provider().ok_or(AppError::AiNotConfigured)?;
        let truncated = truncate_chars(text, provider.summary_budget());
        let prompt = summary_prompt(truncated, title);

        let completion = self.chat_completion(&[ChatMessage::user(prompt)]).await?;
        Ok(completion.content.trim().to_string())
    }
}

/// Read an error body for inclusion in messages
async fn error_body(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    truncate_chars(&body, 200).to_string()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Scripted backend recording what it was sent
    pub struct ScriptedProvider {
        pub name: &'static str,
        pub configured: bool,
        pub budget: usize,
        pub reply: std::result::Result<String, String>,
        pub seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        pub fn ok(name: &'static str, reply: &str) -> Self {
            Self {
                name,
                configured: true,
                budget: 10,
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn unconfigured(name: &'static str) -> Self {
            Self {
                configured: false,
                ..Self::ok(name, "")
            }
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        fn summary_budget(&self) -> usize {
            self.budget
        }

        async fn chat_completion(&self, messages: &[ChatMessage]) -> Result<ChatCompletion> {
            self.seen.lock().unwrap().push(messages.to_vec());
            match &self.reply {
                Ok(content) => Ok(ChatCompletion {
                    content: content.clone(),
                    usage: None,
                }),
                Err(message) => Err(AppError::Upstream {
                    provider: self.name.to_string(),
                    message: message.clone(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedProvider;
    use super::*;

    #[test]
    fn test_truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_summary_prompt_with_title() {
        let prompt = summary_prompt("body", Some("Graphs"));
        assert!(prompt.starts_with("Summarize the following document titled \"Graphs\" in 2–4"));
        assert!(prompt.ends_with("---\n\nbody"));
    }

    #[test]
    fn test_precedence_without_override() {
        let service = AiService::new(
            vec![
                Arc::new(ScriptedProvider::unconfigured("groq")),
                Arc::new(ScriptedProvider::ok("gemini", "hi")),
                Arc::new(ScriptedProvider::ok("ollama", "hi")),
            ],
            None,
        );
        assert_eq!(service.active_provider().unwrap().name(), "gemini");
    }

    #[test]
    fn test_override_wins_when_configured() {
        let service = AiService::new(
            vec![
                Arc::new(ScriptedProvider::ok("groq", "hi")),
                Arc::new(ScriptedProvider::ok("ollama", "hi")),
            ],
            Some(AiProviderKind::Ollama),
        );
        assert_eq!(service.active_provider().unwrap().name(), "ollama");
    }

    #[test]
    fn test_unusable_override_falls_back() {
        let service = AiService::new(
            vec![
                Arc::new(ScriptedProvider::ok("groq", "hi")),
                Arc::new(ScriptedProvider::unconfigured("gemini")),
            ],
            Some(AiProviderKind::Gemini),
        );
        assert_eq!(service.active_provider().unwrap().name(), "groq");
    }

    #[tokio::test]
    async fn test_unconfigured_service_errors() {
        let service = AiService::new(vec![Arc::new(ScriptedProvider::unconfigured("groq"))], None);
        assert!(!service.is_configured());

        let err = service.summarize("text", None).await.unwrap_err();
        assert!(matches!(err, AppError::AiNotConfigured));
    }

    #[tokio::test]
    async fn test_summarize_truncates_to_budget() {
        let provider = Arc::new(ScriptedProvider::ok("groq", "  A summary.  "));
        let service = AiService::new(vec![provider.clone()], None);

        let summary = service.summarize("0123456789abcdef", Some("Digits")).await.unwrap();
        assert_eq!(summary, "A summary.");

        let seen = provider.seen.lock().unwrap();
        let prompt = &seen[0][0].content;
        assert!(prompt.ends_with("0123456789"));
        assert!(!prompt.contains("abcdef"));
    }
}
