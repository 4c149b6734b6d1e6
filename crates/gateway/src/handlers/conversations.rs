//! Conversation handlers

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::extract::{ValidJson, ValidPath, ValidQuery};
use crate::middleware::AuthUser;
use crate::response::ApiResponse;
use cortex_common::{
    db::{
        models::{Conversation, ConversationMessage, MessageRole},
        NewMessage,
    },
    errors::{AppError, Result},
};

pub const DEFAULT_CONVERSATION_LIMIT: u64 = 20;
pub const DEFAULT_MESSAGE_LIMIT: u64 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationRequest {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LimitQuery {
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddMessageRequest {
    pub role: MessageRole,

    #[validate(length(min = 1, message = "Content required"))]
    pub content: String,

    pub sources: Option<Vec<Value>>,

    pub memories_used: Option<Vec<Value>>,

    pub usage: Option<Map<String, Value>>,
}

impl AddMessageRequest {
    /// Optional fields folded into the stored metadata object
    fn metadata(&self) -> Option<Value> {
        let mut metadata = Map::new();
        if let Some(sources) = &self.sources {
            metadata.insert("sources".into(), Value::Array(sources.clone()));
        }
        if let Some(memories) = &self.memories_used {
            metadata.insert("memories_used".into(), Value::Array(memories.clone()));
        }
        if let Some(usage) = &self.usage {
            metadata.insert("usage".into(), Value::Object(usage.clone()));
        }
        (!metadata.is_empty()).then_some(Value::Object(metadata))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RenameRequest {
    pub title: String,
}

#[derive(Serialize)]
pub struct ConversationBody {
    pub conversation: Conversation,
}

#[derive(Serialize)]
pub struct ConversationsBody {
    pub conversations: Vec<Conversation>,
}

#[derive(Serialize)]
pub struct ConversationWithMessages {
    pub conversation: Conversation,
    pub messages: Vec<ConversationMessage>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAdded {
    pub message: ConversationMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_message: Option<ConversationMessage>,
}

async fn require_conversation(state: &AppState, user_id: Uuid, id: Uuid) -> Result<Conversation> {
    state
        .repo
        .find_conversation(user_id, id)
        .await?
        .ok_or(AppError::NotFound { resource: "Conversation" })
}

pub async fn create_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<ConversationBody>>)> {
    // The body is optional
    let request: CreateConversationRequest = if body.is_empty() {
        CreateConversationRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::validation(e.to_string()))?
    };
    let title = request
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let conversation = state.repo.create_conversation(auth.id(), title).await?;
    Ok(ApiResponse::created(
        ConversationBody { conversation },
        "Conversation created",
    ))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidQuery(query): ValidQuery<LimitQuery>,
) -> Result<Json<ApiResponse<ConversationsBody>>> {
    let limit = query.limit.unwrap_or(DEFAULT_CONVERSATION_LIMIT);
    let conversations = state.repo.list_conversations(auth.id(), limit).await?;
    Ok(ApiResponse::ok(ConversationsBody { conversations }))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidQuery(query): ValidQuery<LimitQuery>,
) -> Result<Json<ApiResponse<ConversationWithMessages>>> {
    let conversation = require_conversation(&state, auth.id(), id).await?;
    let messages = state
        .repo
        .list_messages(id, query.limit.unwrap_or(DEFAULT_MESSAGE_LIMIT))
        .await?;

    Ok(ApiResponse::ok(ConversationWithMessages {
        conversation,
        messages,
    }))
}

/// Append a message; user messages also get an assistant reply when a
/// chat backend is available
pub async fn add_message(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(request): ValidJson<AddMessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MessageAdded>>)> {
    if request.content.trim().is_empty() {
        return Err(AppError::Validation {
            message: "Content required".to_string(),
            field: Some("content".to_string()),
        });
    }
    require_conversation(&state, auth.id(), id).await?;

    let metadata = request.metadata();
    let message = state
        .repo
        .append_message(
            id,
            NewMessage {
                role: request.role,
                content: request.content,
                metadata,
            },
        )
        .await?;

    let assistant_message = if message.role == MessageRole::User {
        match state.replies.reply(id).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(conversation_id = %id, error = %e, "Assistant reply failed");
                None
            }
        }
    } else {
        None
    };

    let note = if message.role == MessageRole::User && assistant_message.is_none() {
        "Message added; no assistant reply was generated"
    } else {
        "Message added"
    };

    Ok(ApiResponse::created(
        MessageAdded {
            message,
            assistant_message,
        },
        note,
    ))
}

pub async fn rename_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(request): ValidJson<RenameRequest>,
) -> Result<Json<ApiResponse<ConversationBody>>> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation {
            message: "Title required".to_string(),
            field: Some("title".to_string()),
        });
    }

    let conversation = state
        .repo
        .rename_conversation(auth.id(), id, title.to_string())
        .await?;

    Ok(ApiResponse::with_message(
        ConversationBody { conversation },
        "Title updated",
    ))
}

pub async fn archive_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    state.repo.archive_conversation(auth.id(), id).await?;
    Ok(ApiResponse::with_message((), "Conversation archived"))
}
