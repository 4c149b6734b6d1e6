//! Document processor
//!
//! Drives one uploaded document from PENDING to INDEXED or FAILED:
//! extract text, summarize it, look up related learning videos, store
//! the result. Runs as a detached task after the upload response.

use crate::errors::IngestionError;
use crate::extract::extract_text;
use crate::paths::resolve_upload_path;
use async_trait::async_trait;
use cortex_common::ai::{truncate_chars, AiService};
use cortex_common::db::models::{Document, DocumentStatus};
use cortex_common::db::{DocumentStatusUpdate, Repository};
use cortex_common::errors::{AppError, Result as AppResult};
use cortex_common::metrics::record_document_processed;
use cortex_common::videos::VideoSearch;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Extracted text shorter than this fails the document
pub const MIN_TEXT_LENGTH: usize = 10;

/// Characters of extracted text used when no AI summary is available
pub const FALLBACK_SUMMARY_CHARS: usize = 500;

pub const NOT_ENOUGH_TEXT: &str = "Could not extract enough text from the document.";

/// Document persistence needed by [`DocumentProcessor`]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_document(&self, user_id: Uuid, id: Uuid) -> AppResult<Option<Document>>;

    async fn update_document_status(
        &self,
        user_id: Uuid,
        id: Uuid,
        update: DocumentStatusUpdate,
    ) -> AppResult<Document>;
}

#[async_trait]
impl DocumentStore for Repository {
    async fn find_document(&self, user_id: Uuid, id: Uuid) -> AppResult<Option<Document>> {
        Repository::find_document(self, user_id, id).await
    }

    async fn update_document_status(
        &self,
        user_id: Uuid,
        id: Uuid,
        update: DocumentStatusUpdate,
    ) -> AppResult<Document> {
        Repository::update_document_status(self, user_id, id, update).await
    }
}

/// Naive summary: the first [`FALLBACK_SUMMARY_CHARS`] characters
pub fn fallback_summary(text: &str) -> String {
    let head = truncate_chars(text, FALLBACK_SUMMARY_CHARS);
    if head.len() < text.len() {
        format!("{}…", head)
    } else {
        head.to_string()
    }
}

/// Document processing pipeline
#[derive(Clone)]
pub struct DocumentProcessor {
    store: Arc<dyn DocumentStore>,
    ai: AiService,
    videos: Arc<dyn VideoSearch>,
    upload_dir: PathBuf,
}

impl DocumentProcessor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        ai: AiService,
        videos: Arc<dyn VideoSearch>,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            ai,
            videos,
            upload_dir: upload_dir.into(),
        }
    }

    /// Process a document in the background
    pub fn spawn(&self, document_id: Uuid, user_id: Uuid) -> JoinHandle<()> {
        let processor = self.clone();
        tokio::spawn(async move { processor.run(document_id, user_id).await })
    }

    /// Process a document to a terminal status. Never fails.
    pub async fn run(&self, document_id: Uuid, user_id: Uuid) {
        let start = Instant::now();

        let status = match self.process(document_id, user_id).await {
            Ok(status) => status,
            Err(e) => {
                error!(%document_id, error = %e, "Document processing failed");
                if let Err(update_err) = self
                    .store
                    .update_document_status(user_id, document_id, DocumentStatusUpdate::failed(e.to_string()))
                    .await
                {
                    warn!(%document_id, error = %update_err, "Could not record processing failure");
                }
                DocumentStatus::Failed
            }
        };

        record_document_processed(status.as_str(), start.elapsed());
    }

    /// Run the pipeline and return the terminal status it wrote
    #[instrument(skip(self), fields(document_id = %document_id, user_id = %user_id))]
    pub async fn process(&self, document_id: Uuid, user_id: Uuid) -> Result<DocumentStatus, IngestionError> {
        let document = self
            .store
            .find_document(user_id, document_id)
            .await?
            .ok_or(AppError::NotFound { resource: "Document" })?;

        info!(title = %document.title, "Processing started");

        self.set_status(&document, DocumentStatusUpdate::new(DocumentStatus::Extracting))
            .await?;

        let text = match self.extract(&document).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Extraction failed");
                let message = format!(
                    "Extraction failed: {}. Ensure the file was uploaded via Upload (not just metadata).",
                    e
                );
                self.set_status(&document, DocumentStatusUpdate::failed(message))
                    .await?;
                return Ok(DocumentStatus::Failed);
            }
        };

        if text.chars().count() < MIN_TEXT_LENGTH {
            self.set_status(&document, DocumentStatusUpdate::failed(NOT_ENOUGH_TEXT))
                .await?;
            return Ok(DocumentStatus::Failed);
        }

        // Label only: the text is summarized whole
        self.set_status(&document, DocumentStatusUpdate::new(DocumentStatus::Chunking))
            .await?;

        let summary = self.summarize(&document, &text).await;

        let videos = self.videos.learning_videos(&summary).await;
        let related_videos = if videos.is_empty() {
            None
        } else {
            serde_json::to_value(&videos).ok()
        };

        self.set_status(
            &document,
            DocumentStatusUpdate {
                summary: Some(summary),
                related_videos,
                ..DocumentStatusUpdate::new(DocumentStatus::Indexed)
            },
        )
        .await?;

        info!(title = %document.title, "Document indexed");
        Ok(DocumentStatus::Indexed)
    }

    async fn extract(&self, document: &Document) -> Result<String, IngestionError> {
        let path = resolve_upload_path(&self.upload_dir, &document.storage_path)?;
        extract_text(&path, document.file_type).await
    }

    async fn summarize(&self, document: &Document, text: &str) -> String {
        if !self.ai.is_configured() {
            return fallback_summary(text);
        }
        match self.ai.summarize(text, Some(&document.title)).await {
            Ok(summary) if !summary.is_empty() => summary,
            Ok(_) => fallback_summary(text),
            Err(e) => {
                warn!(error = %e, "Summarization failed, using text excerpt");
                fallback_summary(text)
            }
        }
    }

    async fn set_status(&self, document: &Document, update: DocumentStatusUpdate) -> Result<(), IngestionError> {
        self.store
            .update_document_status(document.user_id, document.id, update)
            .await?;
        Ok(())
    }
}
