//! Tag and knowledge-graph handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::extract::{ValidJson, ValidPath};
use crate::middleware::AuthUser;
use crate::response::ApiResponse;
use cortex_common::{
    db::{
        models::{RelationshipType, Tag, TagRelationship},
        TagGraph, TagPatch,
    },
    errors::{AppError, Result},
};

/// Confidence of a relationship created without one
pub const DEFAULT_RELATIONSHIP_CONFIDENCE: f64 = 1.0;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, message = "Name required"))]
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTagRequest {
    #[validate(length(min = 1, message = "Name must not be empty"))]
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRelationshipRequest {
    pub source_tag_id: Uuid,
    pub target_tag_id: Uuid,
    pub relationship: Option<RelationshipType>,
    #[validate(range(min = 0.0, max = 1.0, message = "Confidence must be between 0 and 1"))]
    pub confidence: Option<f64>,
}

#[derive(Serialize)]
pub struct TagBody {
    pub tag: Tag,
}

#[derive(Serialize)]
pub struct TagsBody {
    pub tags: Vec<Tag>,
}

#[derive(Serialize)]
pub struct RelationshipBody {
    pub relationship: TagRelationship,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn name_required() -> AppError {
    AppError::Validation {
        message: "Name required".to_string(),
        field: Some("name".to_string()),
    }
}

/// A present name must still be non-empty once trimmed
fn tag_patch(request: UpdateTagRequest) -> Result<TagPatch> {
    let name = match request.name {
        Some(name) => Some(trimmed(Some(name)).ok_or_else(name_required)?),
        None => None,
    };

    Ok(TagPatch {
        name,
        slug: trimmed(request.slug),
        description: request.description.map(|d| d.trim().to_string()),
    })
}

pub async fn create_tag(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(request): ValidJson<CreateTagRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TagBody>>)> {
    let name = trimmed(Some(request.name)).ok_or_else(name_required)?;

    let tag = state
        .repo
        .upsert_tag(auth.id(), name, trimmed(request.slug), trimmed(request.description))
        .await?;

    Ok(ApiResponse::created(TagBody { tag }, "Tag created"))
}

pub async fn list_tags(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<TagsBody>>> {
    let tags = state.repo.list_tags(auth.id()).await?;
    Ok(ApiResponse::ok(TagsBody { tags }))
}

pub async fn tag_graph(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<TagGraph>>> {
    let graph = state.repo.tag_graph(auth.id()).await?;
    Ok(ApiResponse::ok(graph))
}

pub async fn get_tag(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<ApiResponse<TagBody>>> {
    let tag = state
        .repo
        .find_tag(auth.id(), id)
        .await?
        .ok_or(AppError::NotFound { resource: "Tag" })?;

    Ok(ApiResponse::ok(TagBody { tag }))
}

pub async fn update_tag(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(request): ValidJson<UpdateTagRequest>,
) -> Result<Json<ApiResponse<TagBody>>> {
    let patch = tag_patch(request)?;
    let tag = state.repo.update_tag(auth.id(), id, patch).await?;
    Ok(ApiResponse::with_message(TagBody { tag }, "Tag updated"))
}

pub async fn create_relationship(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(request): ValidJson<CreateRelationshipRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RelationshipBody>>)> {
    let relationship = state
        .repo
        .upsert_relationship(
            auth.id(),
            request.source_tag_id,
            request.target_tag_id,
            request.relationship.unwrap_or_default(),
            request.confidence.unwrap_or(DEFAULT_RELATIONSHIP_CONFIDENCE),
        )
        .await?;

    Ok(ApiResponse::created(
        RelationshipBody { relationship },
        "Relationship created",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(name: Option<&str>) -> UpdateTagRequest {
        UpdateTagRequest {
            name: name.map(String::from),
            slug: None,
            description: Some("  graphs  ".into()),
        }
    }

    #[test]
    fn test_update_name_trimmed() {
        let patch = tag_patch(update(Some("  Rust  "))).unwrap();
        assert_eq!(patch.name.as_deref(), Some("Rust"));
        assert_eq!(patch.description.as_deref(), Some("graphs"));
    }

    #[test]
    fn test_whitespace_name_rejected() {
        let request = update(Some("   "));
        // Passes the length rule, so only trimming catches it
        assert!(request.validate().is_ok());

        let err = tag_patch(request).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(err.to_string(), "Name required");
    }

    #[test]
    fn test_absent_name_left_unchanged() {
        assert!(tag_patch(update(None)).unwrap().name.is_none());
    }
}
