//! Document extraction — PDF bytes to whitespace-normalized plain text.

use std::sync::Arc;

use async_trait::async_trait;

use crate::documents::{DocumentStore, StorageError};
use crate::evaluation::pipeline::StageError;

/// Extraction boundary: document reference in, plain text out. Fails with
/// `NotFound` when the reference does not resolve and `Parse` when the bytes
/// cannot be converted to text.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, doc_ref: &str) -> Result<String, StageError>;
}

/// Extractor backed by a document store and `pdf-extract`.
pub struct PdfExtractor {
    docs: Arc<dyn DocumentStore>,
}

impl PdfExtractor {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self { docs }
    }
}

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    async fn extract(&self, doc_ref: &str) -> Result<String, StageError> {
        let bytes = self.docs.resolve(doc_ref).await.map_err(|e| match e {
            StorageError::NotFound(doc) => StageError::NotFound(format!("document {doc}")),
            StorageError::Io(msg) => StageError::NotFound(msg),
        })?;
        let text = extract_pdf_text(bytes).await?;
        Ok(normalize_whitespace(&text))
    }
}

/// PDF parsing is CPU-bound, so it runs on the blocking pool.
async fn extract_pdf_text(bytes: Vec<u8>) -> Result<String, StageError> {
    tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| StageError::Parse(format!("failed to parse PDF content: {e}")))
    })
    .await
    .map_err(|e| StageError::Parse(format!("extraction task failed: {e}")))?
}

/// Collapses line-ending variants and runs of blank lines so the same
/// document always yields the same prompt text.
pub fn normalize_whitespace(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len());
    let mut blank_run = 0usize;
    for line in unified.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim_end_matches('\n').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::FsDocumentStore;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_collapses_line_endings() {
        assert_eq!(normalize_whitespace("a\r\nb\rc\nd"), "a\nb\nc\nd");
    }

    #[test]
    fn test_normalize_collapses_blank_runs() {
        assert_eq!(normalize_whitespace("a\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_normalize_trims_trailing_space() {
        assert_eq!(normalize_whitespace("a  \nb\t\n\n"), "a\nb");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_whitespace("x\r\n\r\n\r\ny ");
        assert_eq!(normalize_whitespace(&once), once);
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let dir = TempDir::new().unwrap();
        let extractor = PdfExtractor::new(Arc::new(FsDocumentStore::new(dir.path())));

        let err = extractor.extract("cv-missing.pdf").await.unwrap_err();
        assert!(matches!(err, StageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_corrupt_bytes_are_parse_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("cv-bad.pdf"), b"this is not a pdf").unwrap();
        let extractor = PdfExtractor::new(Arc::new(FsDocumentStore::new(dir.path())));

        let err = extractor.extract("cv-bad.pdf").await.unwrap_err();
        assert!(matches!(err, StageError::Parse(_)));
    }
}
