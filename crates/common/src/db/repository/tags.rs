use super::Repository;
use crate::db::models::*;
use crate::errors::{AppError, Result};
use chrono::Utc;
use sea_orm::sea_query::{OnConflict, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, Insert, PaginatorTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::Serialize;
use uuid::Uuid;

/// Partial tag update
#[derive(Debug, Clone, Default)]
pub struct TagPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
}

/// Nodes and edges of a user's knowledge graph
#[derive(Debug, Clone, Serialize)]
pub struct TagGraph {
    pub nodes: Vec<Tag>,
    pub edges: Vec<TagRelationship>,
}

/// URL-safe slug: lowercase, whitespace runs become `-`, anything
/// outside `[a-z0-9-]` is dropped.
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut in_space = false;

    for c in lowered.chars() {
        if c.is_whitespace() {
            if !in_space {
                slug.push('-');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
            slug.push(c);
        }
    }

    slug
}

fn checked_slug(raw: &str) -> Result<String> {
    let slug = slugify(raw);
    if slug.is_empty() {
        return Err(AppError::Validation {
            message: "Tag slug must contain at least one letter or digit".to_string(),
            field: Some("slug".to_string()),
        });
    }
    Ok(slug)
}

fn checked_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::Validation {
            message: "Name required".to_string(),
            field: Some("name".to_string()),
        });
    }
    Ok(name.to_string())
}

/// Insert keyed on the (source, target, type) triple
fn relationship_upsert(edge: TagRelationshipActiveModel) -> Insert<TagRelationshipActiveModel> {
    TagRelationshipEntity::insert(edge).on_conflict(
        OnConflict::columns([
            TagRelationshipColumn::SourceTagId,
            TagRelationshipColumn::TargetTagId,
            TagRelationshipColumn::RelationshipType,
        ])
        .update_column(TagRelationshipColumn::Confidence)
        .to_owned(),
    )
}

impl Repository {
    // ========================================================================
    // Tag Operations
    // ========================================================================

    /// Create a tag, or update name/description if the slug already exists
    pub async fn upsert_tag(
        &self,
        user_id: Uuid,
        name: String,
        slug: Option<String>,
        description: Option<String>,
    ) -> Result<Tag> {
        let slug = checked_slug(slug.as_deref().unwrap_or(&name))?;
        let now = Utc::now();

        let tag = TagActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            name: Set(name),
            slug: Set(slug),
            description: Set(description),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        TagEntity::insert(tag)
            .on_conflict(
                OnConflict::columns([TagColumn::UserId, TagColumn::Slug])
                    .update_columns([TagColumn::Name, TagColumn::Description, TagColumn::UpdatedAt])
                    .to_owned(),
            )
            .exec_with_returning(self.write_conn())
            .await
            .map_err(Into::into)
    }

    /// List a user's tags by name
    pub async fn list_tags(&self, user_id: Uuid) -> Result<Vec<Tag>> {
        TagEntity::find()
            .filter(TagColumn::UserId.eq(user_id))
            .order_by_asc(TagColumn::Name)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find a tag owned by `user_id`
    pub async fn find_tag(&self, user_id: Uuid, id: Uuid) -> Result<Option<Tag>> {
        TagEntity::find_by_id(id)
            .filter(TagColumn::UserId.eq(user_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Apply a partial update to a tag
    pub async fn update_tag(&self, user_id: Uuid, id: Uuid, patch: TagPatch) -> Result<Tag> {
        let name = match patch.name {
            Some(name) => Some(checked_name(&name)?),
            None => None,
        };

        let tag = self
            .find_tag(user_id, id)
            .await?
            .ok_or(AppError::NotFound { resource: "Tag" })?;

        let mut active: TagActiveModel = tag.into();
        if let Some(name) = name {
            active.name = Set(name);
        }
        if let Some(slug) = patch.slug {
            active.slug = Set(checked_slug(&slug)?);
        }
        if let Some(description) = patch.description {
            active.description = Set(Some(description));
        }
        active.updated_at = Set(Utc::now().into());

        active.update(self.write_conn()).await.map_err(Into::into)
    }

    // ========================================================================
    // Tag Graph Operations
    // ========================================================================

    /// Create an edge, or update its confidence if the triple exists
    pub async fn upsert_relationship(
        &self,
        user_id: Uuid,
        source_tag_id: Uuid,
        target_tag_id: Uuid,
        relationship_type: RelationshipType,
        confidence: f64,
    ) -> Result<TagRelationship> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(AppError::Validation {
                message: "Confidence must be between 0 and 1".to_string(),
                field: Some("confidence".to_string()),
            });
        }

        let expected = if source_tag_id == target_tag_id { 1 } else { 2 };
        let owned = TagEntity::find()
            .filter(TagColumn::UserId.eq(user_id))
            .filter(TagColumn::Id.is_in([source_tag_id, target_tag_id]))
            .count(self.read_conn())
            .await?;
        if owned != expected {
            return Err(AppError::NotFound { resource: "Tag" });
        }

        let edge = TagRelationshipActiveModel {
            id: Set(Uuid::new_v4()),
            source_tag_id: Set(source_tag_id),
            target_tag_id: Set(target_tag_id),
            relationship_type: Set(relationship_type),
            confidence: Set(confidence),
            created_at: Set(Utc::now().into()),
        };

        relationship_upsert(edge)
            .exec_with_returning(self.write_conn())
            .await
            .map_err(Into::into)
    }

    /// All of a user's tags plus the edges leaving them
    pub async fn tag_graph(&self, user_id: Uuid) -> Result<TagGraph> {
        let nodes = self.list_tags(user_id).await?;

        let edges = TagRelationshipEntity::find()
            .filter(
                TagRelationshipColumn::SourceTagId.in_subquery(
                    Query::select()
                        .column(TagColumn::Id)
                        .from(TagEntity)
                        .and_where(TagColumn::UserId.eq(user_id))
                        .to_owned(),
                ),
            )
            .order_by_asc(TagRelationshipColumn::CreatedAt)
            .all(self.read_conn())
            .await?;

        Ok(TagGraph { nodes, edges })
    }
}
