//! Document store — key → bytes resolution for uploaded candidate files.
//!
//! References are bare file names handed out at upload time; anything that
//! looks like a path is rejected so a ref can never escape the upload root.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Io(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Resolves a document reference to its raw bytes.
    async fn resolve(&self, doc_ref: &str) -> Result<Vec<u8>, StorageError>;
}

/// Filesystem-backed document store rooted at the upload directory.
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the upload directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::Io(format!("{}: {e}", self.root.display())))
    }

    /// Stores uploaded bytes under a generated name like `cv-<uuid>.pdf`
    /// and returns the name as the document reference.
    pub async fn save(&self, field: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let name = format!("{field}-{}.pdf", Uuid::new_v4());
        let path = self.root.join(&name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError::Io(format!("{}: {e}", path.display())))?;
        Ok(name)
    }

    fn resolve_path(&self, doc_ref: &str) -> Result<PathBuf, StorageError> {
        // A valid ref is a single plain file name, nothing path-like.
        let mut components = Path::new(doc_ref).components();
        match (components.next(), components.next()) {
            (Some(std::path::Component::Normal(_)), None) => Ok(self.root.join(doc_ref)),
            _ => Err(StorageError::NotFound(doc_ref.to_string())),
        }
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn resolve(&self, doc_ref: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve_path(doc_ref)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(doc_ref.to_string()))
            }
            Err(e) => Err(StorageError::Io(format!("{}: {e}", path.display()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_then_resolve_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FsDocumentStore::new(dir.path());

        let doc_ref = store.save("cv", b"%PDF-1.4 fake").await.unwrap();
        assert!(doc_ref.starts_with("cv-"));
        assert!(doc_ref.ends_with(".pdf"));

        let bytes = store.resolve(&doc_ref).await.unwrap();
        assert_eq!(bytes, b"%PDF-1.4 fake");
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FsDocumentStore::new(dir.path());

        let err = store.resolve("cv-nope.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FsDocumentStore::new(dir.path());

        for bad in ["../etc/passwd", "a/b.pdf", "", "/abs.pdf", ".."] {
            let err = store.resolve(bad).await.unwrap_err();
            assert!(matches!(err, StorageError::NotFound(_)), "ref {bad:?}");
        }
    }
}
