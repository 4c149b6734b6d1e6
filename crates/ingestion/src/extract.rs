//! Text extraction dispatch
//!
//! Picks an extractor from the document's declared type. Every result is
//! capped at [`MAX_TEXT_LENGTH`] characters and trimmed.

use crate::docx::extract_text_from_docx;
use crate::errors::IngestionError;
use cortex_common::ai::truncate_chars;
use cortex_common::db::models::DocumentType;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, instrument};

/// Maximum characters kept from any document
pub const MAX_TEXT_LENGTH: usize = 500_000;

/// Extract the text of the file at `path`
#[instrument(skip(path), fields(path = %path.display()))]
pub async fn extract_text(path: &Path, file_type: DocumentType) -> Result<String, IngestionError> {
    let text = match file_type {
        DocumentType::Pdf => extract_pdf(path).await?,
        DocumentType::Docx => {
            ensure_exists(path).await?;
            extract_text_from_docx(path).await?
        }
        DocumentType::Text | DocumentType::Markdown | DocumentType::Code => {
            String::from_utf8_lossy(&read_file(path).await?).into_owned()
        }
    };

    let text = truncate_chars(&text, MAX_TEXT_LENGTH).trim().to_string();
    debug!(chars = text.chars().count(), "Extracted text");
    Ok(text)
}

#[cfg(feature = "pdf")]
async fn extract_pdf(path: &Path) -> Result<String, IngestionError> {
    let bytes = read_file(path).await?;
    tokio::task::spawn_blocking(move || crate::pdf::extract_text_from_pdf(&bytes))
        .await
        .map_err(|e| IngestionError::PdfParse(format!("Extraction task failed: {}", e)))?
}

#[cfg(not(feature = "pdf"))]
async fn extract_pdf(_path: &Path) -> Result<String, IngestionError> {
    Err(IngestionError::Unsupported {
        format: "PDF",
        reason: "built without the pdf feature",
    })
}

async fn read_file(path: &Path) -> Result<Vec<u8>, IngestionError> {
    tokio::fs::read(path).await.map_err(not_found_or_io)
}

async fn ensure_exists(path: &Path) -> Result<(), IngestionError> {
    tokio::fs::metadata(path)
        .await
        .map(|_| ())
        .map_err(not_found_or_io)
}

fn not_found_or_io(e: std::io::Error) -> IngestionError {
    match e.kind() {
        ErrorKind::NotFound => IngestionError::FileNotFound,
        _ => IngestionError::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_text_is_read_and_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "\n  # Heading\n\nBody text.  \n").unwrap();

        let text = extract_text(file.path(), DocumentType::Markdown).await.unwrap();
        assert_eq!(text, "# Heading\n\nBody text.");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"fn main() {}\xff").unwrap();

        let text = extract_text(file.path(), DocumentType::Code).await.unwrap();
        assert!(text.starts_with("fn main() {}"));
        assert!(text.ends_with('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_text_is_capped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all("é".repeat(MAX_TEXT_LENGTH + 10).as_bytes()).unwrap();

        let text = extract_text(file.path(), DocumentType::Text).await.unwrap();
        assert_eq!(text.chars().count(), MAX_TEXT_LENGTH);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.txt");

        for file_type in [DocumentType::Text, DocumentType::Pdf, DocumentType::Docx] {
            let err = extract_text(&missing, file_type).await.unwrap_err();
            assert!(matches!(err, IngestionError::FileNotFound), "{:?}", file_type);
        }
    }
}
