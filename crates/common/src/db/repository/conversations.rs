use super::Repository;
use crate::db::models::*;
use crate::errors::{AppError, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

/// A message to append
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: MessageRole,
    pub content: String,
    pub metadata: Option<serde_json::Value>,
}

impl Repository {
    // ========================================================================
    // Conversation Operations
    // ========================================================================

    /// Create a conversation
    pub async fn create_conversation(
        &self,
        user_id: Uuid,
        title: Option<String>,
    ) -> Result<Conversation> {
        let now = Utc::now();

        let conversation = ConversationActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            title: Set(title),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        conversation.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Active conversations, most recently updated first
    pub async fn list_conversations(&self, user_id: Uuid, limit: u64) -> Result<Vec<Conversation>> {
        ConversationEntity::find()
            .filter(ConversationColumn::UserId.eq(user_id))
            .filter(ConversationColumn::IsActive.eq(true))
            .order_by_desc(ConversationColumn::UpdatedAt)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find a conversation owned by `user_id`
    pub async fn find_conversation(&self, user_id: Uuid, id: Uuid) -> Result<Option<Conversation>> {
        ConversationEntity::find_by_id(id)
            .filter(ConversationColumn::UserId.eq(user_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn require_conversation(&self, user_id: Uuid, id: Uuid) -> Result<Conversation> {
        self.find_conversation(user_id, id)
            .await?
            .ok_or(AppError::NotFound {
                resource: "Conversation",
            })
    }

    /// Rename a conversation
    pub async fn rename_conversation(
        &self,
        user_id: Uuid,
        id: Uuid,
        title: String,
    ) -> Result<Conversation> {
        let conversation = self.require_conversation(user_id, id).await?;

        let mut active: ConversationActiveModel = conversation.into();
        active.title = Set(Some(title));
        active.updated_at = Set(Utc::now().into());

        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Archive (soft-delete) a conversation
    pub async fn archive_conversation(&self, user_id: Uuid, id: Uuid) -> Result<Conversation> {
        let conversation = self.require_conversation(user_id, id).await?;

        let mut active: ConversationActiveModel = conversation.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().into());

        active.update(self.write_conn()).await.map_err(Into::into)
    }

    // ========================================================================
    // Message Operations
    // ========================================================================

    /// Messages in insertion order, capped at `limit`
    pub async fn list_messages(
        &self,
        conversation_id: Uuid,
        limit: u64,
    ) -> Result<Vec<ConversationMessage>> {
        ConversationMessageEntity::find()
            .filter(ConversationMessageColumn::ConversationId.eq(conversation_id))
            .order_by_asc(ConversationMessageColumn::CreatedAt)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// The last `count` messages, oldest first
    pub async fn recent_messages(
        &self,
        conversation_id: Uuid,
        count: u64,
    ) -> Result<Vec<ConversationMessage>> {
        let mut messages = ConversationMessageEntity::find()
            .filter(ConversationMessageColumn::ConversationId.eq(conversation_id))
            .order_by_desc(ConversationMessageColumn::CreatedAt)
            .limit(count)
            .all(self.read_conn())
            .await?;

        messages.reverse();
        Ok(messages)
    }

    /// Append a message and bump the conversation's `updated_at`
    pub async fn append_message(
        &self,
        conversation_id: Uuid,
        message: NewMessage,
    ) -> Result<ConversationMessage> {
        let now = Utc::now();

        let row = ConversationMessageActiveModel {
            id: Set(Uuid::new_v4()),
            conversation_id: Set(conversation_id),
            role: Set(message.role),
            content: Set(message.content),
            metadata: Set(message.metadata),
            created_at: Set(now.into()),
        }
        .insert(self.write_conn())
        .await?;

        ConversationEntity::update_many()
            .col_expr(
                ConversationColumn::UpdatedAt,
                sea_orm::sea_query::Expr::value(now),
            )
            .filter(ConversationColumn::Id.eq(conversation_id))
            .exec(self.write_conn())
            .await?;

        Ok(row)
    }
}
