//! Document handlers: metadata create, upload, listing, lifecycle, tags

use axum::{
    extract::{multipart::Field, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::extract::{ValidJson, ValidPath, ValidQuery};
use crate::middleware::AuthUser;
use crate::response::{ApiResponse, Paginated};
use cortex_common::{
    db::{
        models::{Document, DocumentStatus, DocumentType, METADATA_ONLY_LOCATOR},
        DocumentFilter, DocumentStatusUpdate, NewDocument,
    },
    errors::{AppError, Result},
};
use cortex_ingestion::storage_name;

pub const DEFAULT_PAGE_SIZE: u64 = 20;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDocumentRequest {
    pub title: String,

    pub original_filename: String,

    pub file_type: DocumentType,

    #[validate(range(min = 0, message = "File size must be non-negative"))]
    pub file_size_bytes: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListDocumentsQuery {
    pub status: Option<DocumentStatus>,

    pub tag_id: Option<Uuid>,

    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<u64>,

    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AttachTagRequest {
    pub tag_id: Uuid,
}

#[derive(Serialize)]
pub struct DocumentBody {
    pub document: Document,
}

fn required(value: &str, field: &str, message: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation {
            message: message.to_string(),
            field: Some(field.to_string()),
        });
    }
    Ok(value.to_string())
}

/// Create a document record without a file; processing is not started
pub async fn create_document(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(request): ValidJson<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DocumentBody>>)> {
    let document = state
        .repo
        .create_document(
            auth.id(),
            NewDocument {
                title: required(&request.title, "title", "Title required")?,
                original_filename: required(
                    &request.original_filename,
                    "original_filename",
                    "Original filename required",
                )?,
                file_type: request.file_type,
                storage_path: METADATA_ONLY_LOCATOR.to_string(),
                file_size_bytes: request.file_size_bytes,
            },
        )
        .await?;

    Ok(ApiResponse::created(DocumentBody { document }, "Document created"))
}

/// Store the multipart `file` field, create a PENDING document and start
/// processing without waiting for it
pub async fn upload_document(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<DocumentBody>>)> {
    let limit = state.config.upload.max_bytes;

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(e, limit))? {
        if field.name() != Some("file") {
            continue;
        }

        let mime = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let file_type =
            DocumentType::from_mime(&mime).ok_or(AppError::UnsupportedMediaType { mime })?;

        let original_filename = field
            .file_name()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "upload".to_string());

        let stored_name = storage_name(&original_filename);
        let size = save_upload(field, &state.config.upload.dir, &stored_name, limit).await?;
        let stored_path = state.config.upload.dir.join(&stored_name);

        let created = state
            .repo
            .create_document(
                auth.id(),
                NewDocument {
                    title: original_filename.clone(),
                    original_filename,
                    file_type,
                    storage_path: stored_name,
                    file_size_bytes: size as i64,
                },
            )
            .await;
        let document = match created {
            Ok(document) => document,
            Err(e) => {
                // No row points at the file, so nothing would ever clean it up
                remove_stored(&stored_path).await;
                return Err(e);
            }
        };

        tracing::info!(
            document_id = %document.id,
            user_id = %auth.id(),
            size,
            "Document uploaded, processing started"
        );
        state.processor.spawn(document.id, auth.id());

        return Ok(ApiResponse::created(
            DocumentBody { document },
            "Document uploaded, processing started",
        ));
    }

    Err(AppError::Validation {
        message: "No file uploaded".to_string(),
        field: Some("file".to_string()),
    })
}

fn multipart_error(e: axum::extract::multipart::MultipartError, limit: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::validation(e.body_text())
    }
}

/// Stream a field to `dir/name`, removing the partial file on failure
async fn save_upload(field: Field<'_>, dir: &Path, name: &str, limit: usize) -> Result<usize> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);

    let result = write_field(field, &path, limit).await;
    if result.is_err() {
        remove_stored(&path).await;
    }
    result
}

async fn remove_stored(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Could not remove stored upload");
    }
}

async fn write_field(mut field: Field<'_>, path: &Path, limit: usize) -> Result<usize> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0usize;

    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
        written += chunk.len();
        if written > limit {
            return Err(AppError::PayloadTooLarge { limit });
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(written)
}

pub async fn list_documents(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidQuery(query): ValidQuery<ListDocumentsQuery>,
) -> Result<Json<ApiResponse<Paginated<Document>>>> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let filter = DocumentFilter {
        status: query.status,
        tag_id: query.tag_id,
    };

    let (documents, total) = state
        .repo
        .list_documents(auth.id(), filter, page, limit)
        .await?;

    Ok(Paginated::new(documents, page, limit, total))
}

pub async fn get_document(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<ApiResponse<DocumentBody>>> {
    let document = state
        .repo
        .find_document(auth.id(), id)
        .await?
        .ok_or(AppError::NotFound { resource: "Document" })?;

    Ok(ApiResponse::ok(DocumentBody { document }))
}

pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(request): ValidJson<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<DocumentBody>>> {
    let update = DocumentStatusUpdate {
        summary: request.summary.map(|s| s.trim().to_string()),
        error_message: request.error_message.map(|m| m.trim().to_string()),
        ..DocumentStatusUpdate::new(request.status)
    };

    let document = state
        .repo
        .update_document_status(auth.id(), id, update)
        .await?;

    Ok(ApiResponse::with_message(DocumentBody { document }, "Status updated"))
}

pub async fn archive_document(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<ApiResponse<DocumentBody>>> {
    let document = state.repo.archive_document(auth.id(), id).await?;
    Ok(ApiResponse::with_message(DocumentBody { document }, "Document archived"))
}

pub async fn attach_tag(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(request): ValidJson<AttachTagRequest>,
) -> Result<Json<ApiResponse<()>>> {
    state.repo.attach_tag(auth.id(), id, request.tag_id).await?;
    Ok(ApiResponse::with_message((), "Tag added to document"))
}

pub async fn detach_tag(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidPath((id, tag_id)): ValidPath<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<()>>> {
    state.repo.detach_tag(auth.id(), id, tag_id).await?;
    Ok(ApiResponse::with_message((), "Tag removed from document"))
}
