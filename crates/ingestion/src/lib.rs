//! Cortex Ingestion
//!
//! Text extraction and the background document processing pipeline.

pub mod docx;
pub mod errors;
pub mod extract;
pub mod paths;
#[cfg(feature = "pdf")]
pub mod pdf;
pub mod processor;

pub use errors::IngestionError;
pub use extract::{extract_text, MAX_TEXT_LENGTH};
pub use paths::{resolve_upload_path, storage_name};
pub use processor::{DocumentProcessor, DocumentStore};
