//! DOCX extraction through pandoc
//!
//! pandoc is looked up once per process. When it is missing every DOCX
//! document fails with an "unsupported" error instead of the service
//! refusing to start.

use crate::errors::IngestionError;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Upper bound for one conversion
const CONVERT_TIMEOUT: Duration = Duration::from_secs(60);

static PANDOC_AVAILABLE: OnceCell<bool> = OnceCell::const_new();

async fn pandoc_available() -> bool {
    *PANDOC_AVAILABLE
        .get_or_init(|| async {
            match Command::new("pandoc").arg("--version").output().await {
                Ok(output) if output.status.success() => true,
                Ok(output) => {
                    warn!(status = %output.status, "pandoc check failed, DOCX extraction disabled");
                    false
                }
                Err(e) => {
                    warn!(error = %e, "pandoc not found, DOCX extraction disabled");
                    false
                }
            }
        })
        .await
}

/// Convert a DOCX file to plain text
pub async fn extract_text_from_docx(path: &Path) -> Result<String, IngestionError> {
    if !pandoc_available().await {
        return Err(IngestionError::Unsupported {
            format: "DOCX",
            reason: "pandoc is not installed",
        });
    }

    debug!(path = %path.display(), "Converting DOCX with pandoc");

    let output = tokio::time::timeout(
        CONVERT_TIMEOUT,
        Command::new("pandoc")
            .args(["-f", "docx", "-t", "plain", "--wrap=none"])
            .arg(path)
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| {
        IngestionError::DocxConvert(format!(
            "pandoc timed out after {}s",
            CONVERT_TIMEOUT.as_secs()
        ))
    })??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(IngestionError::DocxConvert(format!(
            "pandoc exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
