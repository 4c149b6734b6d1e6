//! Upload directory layout
//!
//! Files live flat under one directory, named `{uuid}{.ext}`. Client
//! filenames never become storage paths.

use crate::errors::IngestionError;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// Longest extension carried over from the original filename
const MAX_EXTENSION_LEN: usize = 10;

/// Storage basename for a new upload
pub fn storage_name(original_filename: &str) -> String {
    let extension = Path::new(original_filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            e.chars()
                .filter(char::is_ascii_alphanumeric)
                .take(MAX_EXTENSION_LEN)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|e| !e.is_empty());

    match extension {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    }
}

/// Resolve a stored locator to a file directly under `root`.
///
/// Only the basename is used; locators containing `..` are rejected.
pub fn resolve_upload_path(root: &Path, locator: &str) -> Result<PathBuf, IngestionError> {
    let path = Path::new(locator);

    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(IngestionError::UnsafePath(locator.to_string()));
    }

    let name = path
        .file_name()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| IngestionError::UnsafePath(locator.to_string()))?;

    Ok(root.join(name))
}
