//! PDF text extraction module
//!
//! Extracts text content from PDF bytes using lopdf. Pages lopdf cannot
//! decode fall back to a scan of the raw content stream.

use crate::errors::IngestionError;
use tracing::{debug, warn};

/// Extract text content from an in-memory PDF
pub fn extract_text_from_pdf(bytes: &[u8]) -> Result<String, IngestionError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| IngestionError::PdfParse(format!("Failed to load PDF: {}", e)))?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut text = String::new();
    for (&page_num, &page_id) in pages.iter() {
        let page_text = match doc.extract_text(&[page_num]) {
            Ok(t) => t,
            Err(e) => {
                warn!(page = page_num, error = %e, "Text decoding failed, scanning content stream");
                match doc.get_page_content(page_id) {
                    Ok(content) => scan_content_stream(&content),
                    Err(e) => {
                        warn!(page = page_num, error = %e, "Failed to read page content, skipping");
                        continue;
                    }
                }
            }
        };
        text.push_str(&page_text);
        text.push('\n');
    }

    Ok(clean_text(&text))
}

/// Collect strings shown by `Tj`, `TJ`, `'` and `"` inside BT/ET blocks
fn scan_content_stream(content: &[u8]) -> String {
    let content = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;

    for line in content.lines().map(str::trim) {
        match line {
            "BT" => in_text_block = true,
            "ET" => {
                in_text_block = false;
                text.push(' ');
            }
            _ if in_text_block => text.push_str(&shown_strings(line)),
            _ => {}
        }
    }

    text
}

/// Literal strings of one text-showing operator line
fn shown_strings(line: &str) -> String {
    let shows_text = ["Tj", "TJ", "'", "\""].iter().any(|op| line.ends_with(op));
    if !shows_text {
        return String::new();
    }

    let mut out = String::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut escaped = false;

    for ch in line.chars() {
        if depth > 0 && escaped {
            current.push('\\');
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if depth > 0 => escaped = true,
            '(' => {
                if depth > 0 {
                    current.push(ch);
                }
                depth += 1;
            }
            ')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    out.push_str(&decode_pdf_string(&current));
                    current.clear();
                } else {
                    current.push(ch);
                }
            }
            _ if depth > 0 => current.push(ch),
            _ => {}
        }
    }

    out
}

/// Decode PDF string escapes
fn decode_pdf_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some(c) => result.push(c),
            None => {}
        }
    }

    result
}

/// Collapse whitespace and drop byte-order marks and NULs
fn clean_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(['\u{FEFF}', '\0'], "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("Hello   World\n\n\u{FEFF}Test"), "Hello World Test");
    }

    #[test]
    fn test_decode_pdf_string() {
        assert_eq!(decode_pdf_string("Hello\\nWorld"), "Hello\nWorld");
        assert_eq!(decode_pdf_string("Test\\(paren\\)"), "Test(paren)");
    }

    #[test]
    fn test_scan_content_stream() {
        let stream = b"BT\n/F1 12 Tf\n(Hello) Tj\nET\nBT\n[(Wor) -20 (ld)] TJ\nET\n";
        assert_eq!(scan_content_stream(stream).trim(), "Hello World");
    }

    #[test]
    fn test_escaped_parens_survive() {
        assert_eq!(shown_strings(r"(a \(b\) c) Tj"), "a (b) c");
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let err = extract_text_from_pdf(b"not a pdf").unwrap_err();
        assert!(matches!(err, IngestionError::PdfParse(_)));
    }
}
