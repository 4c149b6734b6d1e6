//! Ingestion error types
//!
//! These never escape the processing task: they are rendered into the
//! document's error message.

use cortex_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("File not found")]
    FileNotFound,

    #[error("Invalid storage path: {0}")]
    UnsafePath(String),

    #[error("{format} extraction not available ({reason})")]
    Unsupported {
        format: &'static str,
        reason: &'static str,
    },

    #[error("PDF parse error: {0}")]
    PdfParse(String),

    #[error("DOCX conversion error: {0}")]
    DocxConvert(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] AppError),
}
