use super::Repository;
use crate::db::models::*;
use crate::errors::{AppError, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

/// Default confidence for explicitly created memories
pub const DEFAULT_MEMORY_CONFIDENCE: f64 = 0.9;

/// Fields for a new memory
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub memory_type: MemoryType,
    pub key: String,
    pub value: String,
    pub confidence: Option<f64>,
    pub source_conversation_id: Option<Uuid>,
}

impl NewMemory {
    /// Trim text and clamp confidence into [0, 1]
    fn normalized(self) -> Result<Self> {
        let key = self.key.trim().to_string();
        let value = self.value.trim().to_string();
        if key.is_empty() {
            return Err(AppError::Validation {
                message: "Memory key is required".to_string(),
                field: Some("key".to_string()),
            });
        }
        if value.is_empty() {
            return Err(AppError::Validation {
                message: "Memory value is required".to_string(),
                field: Some("value".to_string()),
            });
        }

        let confidence = self
            .confidence
            .filter(|c| c.is_finite())
            .unwrap_or(DEFAULT_MEMORY_CONFIDENCE)
            .clamp(0.0, 1.0);

        Ok(Self {
            key,
            value,
            confidence: Some(confidence),
            ..self
        })
    }
}

impl Repository {
    // ========================================================================
    // Memory Operations
    // ========================================================================

    /// Store a new active memory
    pub async fn create_memory(&self, user_id: Uuid, new: NewMemory) -> Result<Memory> {
        let new = new.normalized()?;
        let now = Utc::now();

        let memory = MemoryActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            memory_type: Set(new.memory_type),
            key: Set(new.key),
            value: Set(new.value),
            confidence: Set(new.confidence.unwrap_or(DEFAULT_MEMORY_CONFIDENCE)),
            is_active: Set(true),
            source_conversation_id: Set(new.source_conversation_id),
            last_used_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        memory.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Active memories newest first, optionally of one type
    pub async fn list_memories(
        &self,
        user_id: Uuid,
        memory_type: Option<MemoryType>,
        limit: u64,
    ) -> Result<Vec<Memory>> {
        let mut query = MemoryEntity::find()
            .filter(MemoryColumn::UserId.eq(user_id))
            .filter(MemoryColumn::IsActive.eq(true));

        if let Some(memory_type) = memory_type {
            query = query.filter(MemoryColumn::MemoryType.eq(memory_type));
        }

        query
            .order_by_desc(MemoryColumn::CreatedAt)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find a memory owned by `user_id`
    pub async fn find_memory(&self, user_id: Uuid, id: Uuid) -> Result<Option<Memory>> {
        MemoryEntity::find_by_id(id)
            .filter(MemoryColumn::UserId.eq(user_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Deactivate (soft-delete) a memory
    pub async fn deactivate_memory(&self, user_id: Uuid, id: Uuid) -> Result<Memory> {
        let memory = self
            .find_memory(user_id, id)
            .await?
            .ok_or(AppError::NotFound { resource: "Memory" })?;

        let mut active: MemoryActiveModel = memory.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().into());

        active.update(self.write_conn()).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::{empty_repo, mock_repo, sql_log};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn new_memory(value: &str, confidence: Option<f64>) -> NewMemory {
        NewMemory {
            memory_type: MemoryType::Preference,
            key: "tone".into(),
            value: value.into(),
            confidence,
            source_conversation_id: None,
        }
    }

    #[test]
    fn test_confidence_clamped_and_defaulted() {
        assert_eq!(new_memory("x", Some(3.0)).normalized().unwrap().confidence, Some(1.0));
        assert_eq!(new_memory("x", Some(-1.0)).normalized().unwrap().confidence, Some(0.0));
        assert_eq!(
            new_memory("x", None).normalized().unwrap().confidence,
            Some(DEFAULT_MEMORY_CONFIDENCE)
        );
    }

    #[test]
    fn test_value_trimmed() {
        let memory = new_memory("  concise answers  ", None).normalized().unwrap();
        assert_eq!(memory.value, "concise answers");
    }

    #[tokio::test]
    async fn test_blank_value_rejected_before_query() {
        let err = empty_repo()
            .create_memory(Uuid::new_v4(), new_memory("   ", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_foreign_memory_reads_as_missing() {
        let repo = mock_repo(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([Vec::<Memory>::new()]),
        );

        let found = repo.find_memory(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
        assert!(found.is_none());

        let log = sql_log(repo);
        assert!(log[0].contains(r#""memories"."user_id" = "#), "{}", log[0]);
    }

    #[tokio::test]
    async fn test_deactivate_foreign_memory_is_not_found() {
        let repo = mock_repo(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([Vec::<Memory>::new()]),
        );

        let err = repo
            .deactivate_memory(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { resource: "Memory" }));

        let log = sql_log(repo);
        assert_eq!(log.len(), 1);
        assert!(log.iter().all(|sql| !sql.starts_with("UPDATE")));
    }
}
