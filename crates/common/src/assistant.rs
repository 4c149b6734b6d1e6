//! Assistant replies for conversations
//!
//! After a user message is stored, the recent history is replayed to the
//! active chat backend behind a fixed system prompt. An unconfigured or
//! failing backend produces no reply; it is never an error for the caller.

use crate::ai::{AiService, ChatMessage};
use crate::db::models::{ConversationMessage, MessageRole};
use crate::db::{NewMessage, Repository};
use crate::errors::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Messages of history sent with each request
pub const HISTORY_WINDOW: u64 = 20;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant for an AI Knowledge Base. Answer the user concisely. If they ask about documents or content, suggest they search or refer to their uploaded documents.";

/// Message persistence needed by [`ReplyGenerator`]
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The last `count` messages, oldest first
    async fn recent_messages(&self, conversation_id: Uuid, count: u64) -> Result<Vec<ConversationMessage>>;

    async fn append_message(&self, conversation_id: Uuid, message: NewMessage) -> Result<ConversationMessage>;
}

#[async_trait]
impl ConversationStore for Repository {
    async fn recent_messages(&self, conversation_id: Uuid, count: u64) -> Result<Vec<ConversationMessage>> {
        Repository::recent_messages(self, conversation_id, count).await
    }

    async fn append_message(&self, conversation_id: Uuid, message: NewMessage) -> Result<ConversationMessage> {
        Repository::append_message(self, conversation_id, message).await
    }
}

/// Produces and stores assistant messages
#[derive(Clone)]
pub struct ReplyGenerator {
    store: Arc<dyn ConversationStore>,
    ai: AiService,
}

impl ReplyGenerator {
    pub fn new(store: Arc<dyn ConversationStore>, ai: AiService) -> Self {
        Self { store, ai }
    }

    /// Reply to the conversation's latest messages.
    ///
    /// Returns `Ok(None)` when no backend is configured or the backend
    /// call fails. Store errors are returned.
    #[tracing::instrument(skip(self))]
    pub async fn reply(&self, conversation_id: Uuid) -> Result<Option<ConversationMessage>> {
        if !self.ai.is_configured() {
            tracing::debug!("No AI provider configured, skipping assistant reply");
            return Ok(None);
        }

        let history = self.store.recent_messages(conversation_id, HISTORY_WINDOW).await?;

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        messages.extend(
            history
                .into_iter()
                .map(|m| ChatMessage::new(m.role, m.content)),
        );

        let completion = match self.ai.chat_completion(&messages).await {
            Ok(completion) => completion,
            Err(e) => {
                tracing::warn!(error = %e, "Assistant reply failed, keeping user message only");
                return Ok(None);
            }
        };

        let metadata = completion
            .usage
            .map(|usage| serde_json::json!({ "usage": usage }));

        let stored = self
            .store
            .append_message(
                conversation_id,
                NewMessage {
                    role: MessageRole::Assistant,
                    content: completion.content,
                    metadata,
                },
            )
            .await?;

        Ok(Some(stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedProvider;
    use crate::ai::ChatProvider;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        messages: Mutex<Vec<ConversationMessage>>,
    }

    impl MemoryStore {
        fn with_history(count: usize) -> Self {
            let store = Self::default();
            for i in 0..count {
                store.push(MessageRole::User, &format!("message {}", i), None);
            }
            store
        }

        fn push(&self, role: MessageRole, content: &str, metadata: Option<serde_json::Value>) -> ConversationMessage {
            let message = ConversationMessage {
                id: Uuid::new_v4(),
                conversation_id: Uuid::nil(),
                role,
                content: content.to_string(),
                metadata,
                created_at: Utc::now().into(),
            };
            self.messages.lock().unwrap().push(message.clone());
            message
        }
    }

    #[async_trait]
    impl ConversationStore for MemoryStore {
        async fn recent_messages(&self, _: Uuid, count: u64) -> Result<Vec<ConversationMessage>> {
            let messages = self.messages.lock().unwrap();
            let skip = messages.len().saturating_sub(count as usize);
            Ok(messages[skip..].to_vec())
        }

        async fn append_message(&self, _: Uuid, message: NewMessage) -> Result<ConversationMessage> {
            Ok(self.push(message.role, &message.content, message.metadata))
        }
    }

    fn generator(store: Arc<MemoryStore>, provider: Arc<ScriptedProvider>) -> ReplyGenerator {
        let providers: Vec<Arc<dyn ChatProvider>> = vec![provider];
        ReplyGenerator::new(store, AiService::new(providers, None))
    }

    #[tokio::test]
    async fn test_no_provider_no_reply() {
        let store = Arc::new(MemoryStore::with_history(1));
        let reply = generator(store.clone(), Arc::new(ScriptedProvider::unconfigured("groq")))
            .reply(Uuid::nil())
            .await
            .unwrap();

        assert!(reply.is_none());
        assert_eq!(store.messages.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reply_uses_bounded_history() {
        let store = Arc::new(MemoryStore::with_history(25));
        let provider = Arc::new(ScriptedProvider::ok("groq", "Here you go."));

        let reply = generator(store.clone(), provider.clone())
            .reply(Uuid::nil())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(reply.role, MessageRole::Assistant);
        assert_eq!(reply.content, "Here you go.");

        let seen = provider.seen.lock().unwrap();
        let sent = &seen[0];
        assert_eq!(sent.len(), HISTORY_WINDOW as usize + 1);
        assert_eq!(sent[0].role, MessageRole::System);
        assert_eq!(sent[0].content, SYSTEM_PROMPT);
        assert_eq!(sent[1].content, "message 5");
        assert_eq!(sent.last().unwrap().content, "message 24");
    }

    #[tokio::test]
    async fn test_provider_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::with_history(1));
        let provider = Arc::new(ScriptedProvider {
            reply: Err("boom".into()),
            ..ScriptedProvider::ok("groq", "")
        });

        let reply = generator(store.clone(), provider).reply(Uuid::nil()).await.unwrap();

        assert!(reply.is_none());
        assert_eq!(store.messages.lock().unwrap().len(), 1);
    }
}
