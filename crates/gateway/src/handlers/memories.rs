//! Memory handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::extract::{ValidJson, ValidPath, ValidQuery};
use crate::middleware::AuthUser;
use crate::response::ApiResponse;
use cortex_common::{
    db::{
        models::{Memory, MemoryType},
        NewMemory,
    },
    errors::{AppError, Result},
};

pub const DEFAULT_MEMORY_LIMIT: u64 = 50;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMemoryRequest {
    #[serde(rename = "type")]
    pub memory_type: MemoryType,

    pub key: String,

    pub value: String,

    pub source_conversation: Option<Uuid>,

    #[validate(range(min = 0.0, max = 1.0, message = "Confidence must be between 0 and 1"))]
    pub confidence: Option<f64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListMemoriesQuery {
    #[serde(rename = "type")]
    pub memory_type: Option<MemoryType>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u64>,
}

#[derive(Serialize)]
pub struct MemoryBody {
    pub memory: Memory,
}

#[derive(Serialize)]
pub struct MemoriesBody {
    pub memories: Vec<Memory>,
}

pub async fn create_memory(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(request): ValidJson<CreateMemoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MemoryBody>>)> {
    let memory = state
        .repo
        .create_memory(
            auth.id(),
            NewMemory {
                memory_type: request.memory_type,
                key: request.key,
                value: request.value,
                confidence: request.confidence,
                source_conversation_id: request.source_conversation,
            },
        )
        .await?;

    Ok(ApiResponse::created(MemoryBody { memory }, "Memory created"))
}

pub async fn list_memories(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidQuery(query): ValidQuery<ListMemoriesQuery>,
) -> Result<Json<ApiResponse<MemoriesBody>>> {
    let memories = state
        .repo
        .list_memories(
            auth.id(),
            query.memory_type,
            query.limit.unwrap_or(DEFAULT_MEMORY_LIMIT),
        )
        .await?;

    Ok(ApiResponse::ok(MemoriesBody { memories }))
}

pub async fn get_memory(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<ApiResponse<MemoryBody>>> {
    let memory = state
        .repo
        .find_memory(auth.id(), id)
        .await?
        .ok_or(AppError::NotFound { resource: "Memory" })?;

    Ok(ApiResponse::ok(MemoryBody { memory }))
}

pub async fn deactivate_memory(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<ApiResponse<MemoryBody>>> {
    let memory = state.repo.deactivate_memory(auth.id(), id).await?;
    Ok(ApiResponse::with_message(MemoryBody { memory }, "Memory deactivated"))
}
