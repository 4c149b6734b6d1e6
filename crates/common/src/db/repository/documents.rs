use super::Repository;
use crate::db::models::*;
use crate::errors::{AppError, Result};
use chrono::Utc;
use sea_orm::sea_query::{OnConflict, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use uuid::Uuid;

/// Fields for a new PENDING document
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub original_filename: String,
    pub file_type: DocumentType,
    pub storage_path: String,
    pub file_size_bytes: i64,
}

/// Optional list filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    pub tag_id: Option<Uuid>,
}

/// A status write plus the artifacts that accompany it
#[derive(Debug, Clone)]
pub struct DocumentStatusUpdate {
    pub status: DocumentStatus,
    pub summary: Option<String>,
    pub error_message: Option<String>,
    pub related_videos: Option<serde_json::Value>,
}

impl DocumentStatusUpdate {
    pub fn new(status: DocumentStatus) -> Self {
        Self {
            status,
            summary: None,
            error_message: None,
            related_videos: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::new(DocumentStatus::Failed)
        }
    }
}

impl Repository {
    // ========================================================================
    // Document Operations
    // ========================================================================

    /// Create a new document in PENDING state
    pub async fn create_document(&self, user_id: Uuid, new: NewDocument) -> Result<Document> {
        let now = Utc::now();

        let document = DocumentActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            title: Set(new.title),
            original_filename: Set(new.original_filename),
            file_type: Set(new.file_type),
            storage_path: Set(new.storage_path),
            file_size_bytes: Set(new.file_size_bytes),
            status: Set(DocumentStatus::Pending),
            summary: Set(None),
            related_videos: Set(None),
            error_message: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            indexed_at: Set(None),
        };

        document.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find a document owned by `user_id`
    pub async fn find_document(&self, user_id: Uuid, id: Uuid) -> Result<Option<Document>> {
        DocumentEntity::find_by_id(id)
            .filter(DocumentColumn::UserId.eq(user_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List documents newest first; `page` is 1-based
    pub async fn list_documents(
        &self,
        user_id: Uuid,
        filter: DocumentFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<Document>, u64)> {
        let mut query = DocumentEntity::find().filter(DocumentColumn::UserId.eq(user_id));

        if let Some(status) = filter.status {
            query = query.filter(DocumentColumn::Status.eq(status));
        }

        if let Some(tag_id) = filter.tag_id {
            query = query.filter(
                DocumentColumn::Id.in_subquery(
                    Query::select()
                        .column(DocumentTagColumn::DocumentId)
                        .from(DocumentTagEntity)
                        .and_where(DocumentTagColumn::TagId.eq(tag_id))
                        .to_owned(),
                ),
            );
        }

        let paginator = query
            .order_by_desc(DocumentColumn::CreatedAt)
            .paginate(self.read_conn(), limit.max(1));

        let total = paginator.num_items().await?;
        let documents = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((documents, total))
    }

    /// Write a lifecycle step, rejecting transitions the lifecycle forbids.
    ///
    /// The legal prior statuses are part of the UPDATE predicate, so a
    /// concurrent write (an archive racing the processor) can never be
    /// overwritten by a step that was legal only before it.
    pub async fn update_document_status(
        &self,
        user_id: Uuid,
        id: Uuid,
        update: DocumentStatusUpdate,
    ) -> Result<Document> {
        let now = Utc::now();
        let mut changes = DocumentActiveModel {
            status: Set(update.status),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        if let Some(summary) = update.summary {
            changes.summary = Set(Some(summary));
        }
        if let Some(message) = update.error_message {
            changes.error_message = Set(Some(message));
        }
        if let Some(videos) = update.related_videos {
            changes.related_videos = Set(Some(videos));
        }
        if update.status == DocumentStatus::Indexed {
            changes.indexed_at = Set(Some(now.into()));
        }

        let mut written = DocumentEntity::update_many()
            .set(changes)
            .filter(DocumentColumn::Id.eq(id))
            .filter(DocumentColumn::UserId.eq(user_id))
            .filter(DocumentColumn::Status.is_in(update.status.predecessors()))
            .exec_with_returning(self.write_conn())
            .await?;

        if let Some(document) = written.pop() {
            return Ok(document);
        }

        // Nothing matched: tell a missing document from an illegal step
        match self.find_document(user_id, id).await? {
            Some(_) => Err(AppError::Conflict {
                message: "Invalid status transition".to_string(),
            }),
            None => Err(AppError::NotFound { resource: "Document" }),
        }
    }

    /// Soft-delete a document
    pub async fn archive_document(&self, user_id: Uuid, id: Uuid) -> Result<Document> {
        self.update_document_status(
            user_id,
            id,
            DocumentStatusUpdate::new(DocumentStatus::Archived),
        )
        .await
    }

    // ========================================================================
    // Document Tag Operations
    // ========================================================================

    /// Attach a tag to a document; attaching twice is a no-op
    pub async fn attach_tag(&self, user_id: Uuid, document_id: Uuid, tag_id: Uuid) -> Result<()> {
        self.require_document_and_tag(user_id, document_id, tag_id).await?;

        let link = DocumentTagActiveModel {
            document_id: Set(document_id),
            tag_id: Set(tag_id),
            created_at: Set(Utc::now().into()),
        };

        DocumentTagEntity::insert(link)
            .on_conflict(
                OnConflict::columns([DocumentTagColumn::DocumentId, DocumentTagColumn::TagId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.write_conn())
            .await?;

        Ok(())
    }

    /// Detach a tag from a document
    pub async fn detach_tag(&self, user_id: Uuid, document_id: Uuid, tag_id: Uuid) -> Result<()> {
        self.require_document_and_tag(user_id, document_id, tag_id).await?;

        DocumentTagEntity::delete_many()
            .filter(DocumentTagColumn::DocumentId.eq(document_id))
            .filter(DocumentTagColumn::TagId.eq(tag_id))
            .exec(self.write_conn())
            .await?;

        Ok(())
    }

    async fn require_document_and_tag(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        tag_id: Uuid,
    ) -> Result<()> {
        self.find_document(user_id, document_id)
            .await?
            .ok_or(AppError::NotFound { resource: "Document" })?;
        self.find_tag(user_id, tag_id)
            .await?
            .ok_or(AppError::NotFound { resource: "Tag" })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::{empty_repo, mock_repo, sql_log, statements};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn document(user_id: Uuid, status: DocumentStatus) -> Document {
        let now = Utc::now();
        Document {
            id: Uuid::new_v4(),
            user_id,
            title: "Notes".into(),
            original_filename: "notes.txt".into(),
            file_type: DocumentType::Text,
            storage_path: "abc.txt".into(),
            file_size_bytes: 11,
            status,
            summary: None,
            related_videos: None,
            error_message: None,
            created_at: now.into(),
            updated_at: now.into(),
            indexed_at: None,
        }
    }

    fn no_rows() -> Vec<Document> {
        Vec::new()
    }

    #[tokio::test]
    async fn test_create_then_fetch_round_trip() {
        let user_id = Uuid::new_v4();
        let stored = document(user_id, DocumentStatus::Pending);
        let repo = mock_repo(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![stored.clone()], vec![stored.clone()]]),
        );

        let created = repo
            .create_document(
                user_id,
                NewDocument {
                    title: "Notes".into(),
                    original_filename: "notes.txt".into(),
                    file_type: DocumentType::Text,
                    storage_path: "abc.txt".into(),
                    file_size_bytes: 11,
                },
            )
            .await
            .unwrap();
        let fetched = repo.find_document(user_id, created.id).await.unwrap().unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.status, DocumentStatus::Pending);
        assert_eq!(fetched.title, "Notes");
        assert_eq!(fetched.file_size_bytes, 11);

        let log = statements(repo);
        assert_eq!(log.len(), 2);
        assert!(log[0].sql.starts_with(r#"INSERT INTO "documents""#));
        // New rows are always written as PENDING
        let values = format!("{:?}", log[0].values);
        assert!(values.contains("PENDING"), "{}", values);
        assert!(values.contains("notes.txt"), "{}", values);
        assert!(log[1].sql.contains(r#""documents"."user_id" = "#));
    }

    #[tokio::test]
    async fn test_status_write_guards_on_prior_status() {
        let user_id = Uuid::new_v4();
        let mut written = document(user_id, DocumentStatus::Indexed);
        written.summary = Some("Short summary".into());
        let repo = mock_repo(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![written.clone()]]),
        );

        let update = DocumentStatusUpdate {
            summary: Some("Short summary".into()),
            ..DocumentStatusUpdate::new(DocumentStatus::Indexed)
        };
        let updated = repo.update_document_status(user_id, written.id, update).await.unwrap();
        assert_eq!(updated.status, DocumentStatus::Indexed);

        let log = statements(repo);
        assert_eq!(log.len(), 1, "check and write must be one statement");
        let sql = &log[0].sql;
        assert!(sql.starts_with(r#"UPDATE "documents""#), "{}", sql);
        assert!(sql.contains(r#""documents"."user_id" = "#), "{}", sql);
        assert!(sql.contains(r#""documents"."status" IN ("#), "{}", sql);

        // Only CHUNKING may become INDEXED, so an ARCHIVED row never matches
        let values = format!("{:?}", log[0].values);
        assert!(values.contains("CHUNKING"), "{}", values);
        assert!(!values.contains("ARCHIVED"), "{}", values);
    }

    #[tokio::test]
    async fn test_illegal_transition_is_conflict() {
        let user_id = Uuid::new_v4();
        let doc = document(user_id, DocumentStatus::Archived);
        let repo = mock_repo(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([no_rows(), vec![doc.clone()]]),
        );

        let err = repo
            .update_document_status(user_id, doc.id, DocumentStatusUpdate::new(DocumentStatus::Indexed))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict { .. }));
        assert_eq!(err.to_string(), "Invalid status transition");

        let log = sql_log(repo);
        assert!(log[0].starts_with("UPDATE"));
        assert!(log[1].starts_with("SELECT"));
    }

    #[tokio::test]
    async fn test_foreign_document_is_not_found() {
        let repo = mock_repo(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([no_rows(), no_rows()]),
        );

        let err = repo
            .archive_document(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound { resource: "Document" }));
    }

    #[tokio::test]
    async fn test_legal_transition_is_written() {
        let user_id = Uuid::new_v4();
        let written = document(user_id, DocumentStatus::Extracting);
        let repo = mock_repo(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![written.clone()]]),
        );

        let updated = repo
            .update_document_status(user_id, written.id, DocumentStatusUpdate::new(DocumentStatus::Extracting))
            .await
            .unwrap();

        assert_eq!(updated.status, DocumentStatus::Extracting);
    }

    #[tokio::test]
    async fn test_find_document_without_rows() {
        let repo = empty_repo();
        // An exhausted mock errors, so the lookup must reach the store
        assert!(repo.find_document(Uuid::new_v4(), Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_foreign_document_reads_as_missing() {
        let repo = mock_repo(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([no_rows()]),
        );

        assert!(repo.find_document(Uuid::new_v4(), Uuid::new_v4()).await.unwrap().is_none());
    }
}
