//! Persistence for finished documents.
//!
//! [`FileDocumentStore`] writes one JSON file per document under the data
//! directory; [`MemoryDocumentStore`] backs dry runs and tests.

use crate::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, info};

/// Bytes of the SHA-256 digest kept in a document id.
const ID_BYTES: usize = 12;

static ID_NONCE: AtomicU64 = AtomicU64::new(0);

/// A finished document ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    /// Site the document describes
    pub url: String,
    /// Document title
    pub title: String,
    /// Serialized document body
    pub content: serde_json::Value,
    /// Owner, if the caller has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// What the store returns after a create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    /// Store-assigned identifier
    pub id: String,
    /// Site the document describes
    pub url: String,
    /// Document title
    pub title: String,
    /// Owner, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Write-once document persistence.
///
/// The pipeline creates exactly one document per successful run and never
/// reads it back, updates or deletes it.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a new document and return its identifier and metadata.
    async fn create_document(&self, document: NewDocument) -> Result<StoredDocument>;
}

/// Derive a URL-safe id from the document URL and creation time.
fn document_id(url: &str, created_at: DateTime<Utc>) -> String {
    let nonce = ID_NONCE.fetch_add(1, Ordering::Relaxed);
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(created_at.to_rfc3339().as_bytes());
    hasher.update(nonce.to_le_bytes());
    let digest = hasher.finalize();
    URL_SAFE_NO_PAD.encode(&digest[..ID_BYTES])
}

fn stored(document: &NewDocument) -> StoredDocument {
    let created_at = Utc::now();
    StoredDocument {
        id: document_id(&document.url, created_at),
        url: document.url.clone(),
        title: document.title.clone(),
        user_id: document.user_id.clone(),
        created_at,
    }
}

/// On-disk layout of one document file.
#[derive(Debug, Serialize, Deserialize)]
struct DocumentFile {
    #[serde(flatten)]
    meta: StoredDocument,
    content: serde_json::Value,
}

/// Stores each document as `<id>.json` under a documents directory.
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    root_dir: PathBuf,
}

impl FileDocumentStore {
    /// Create a store rooted at `data_dir/documents`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root_dir: data_dir.join("documents"),
        }
    }

    /// Directory documents are written to.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Path a document with `id` is written to.
    pub fn document_path(&self, id: &str) -> PathBuf {
        self.root_dir.join(format!("{id}.json"))
    }
}

#[async_trait::async_trait]
impl DocumentStore for FileDocumentStore {
    async fn create_document(&self, document: NewDocument) -> Result<StoredDocument> {
        fs::create_dir_all(&self.root_dir)
            .await
            .map_err(|e| Error::Storage(format!("Failed to create documents directory: {e}")))?;

        let meta = stored(&document);
        let path = self.document_path(&meta.id);
        if fs::try_exists(&path).await.unwrap_or(false) {
            return Err(Error::Storage(format!(
                "Document '{}' already exists",
                meta.id
            )));
        }

        let file = DocumentFile {
            meta,
            content: document.content,
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::Storage(format!("Failed to serialize document: {e}")))?;

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write document: {e}")))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to commit document: {e}")))?;

        info!(id = %file.meta.id, path = %path.display(), "Document stored");
        Ok(file.meta)
    }
}

/// Keeps documents in memory. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<Vec<(StoredDocument, serde_json::Value)>>,
}

impl MemoryDocumentStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of stored documents in creation order.
    pub fn documents(&self) -> Result<Vec<(StoredDocument, serde_json::Value)>> {
        self.documents
            .lock()
            .map(|docs| docs.clone())
            .map_err(|_| Error::Storage("document store lock poisoned".into()))
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create_document(&self, document: NewDocument) -> Result<StoredDocument> {
        let meta = stored(&document);
        self.documents
            .lock()
            .map_err(|_| Error::Storage("document store lock poisoned".into()))?
            .push((meta.clone(), document.content));
        debug!(id = %meta.id, "Document kept in memory");
        Ok(meta)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::disallowed_macros,
    clippy::unnecessary_wraps
)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn new_document() -> NewDocument {
        NewDocument {
            url: "https://acme.io".into(),
            title: "Acme Documentation".into(),
            content: json!({ "title": "Acme Documentation", "sections": [] }),
            user_id: Some("user-1".into()),
        }
    }

    #[tokio::test]
    async fn test_file_store_writes_document() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileDocumentStore::new(temp_dir.path());

        let stored = store.create_document(new_document()).await.unwrap();
        assert_eq!(stored.url, "https://acme.io");
        assert_eq!(stored.user_id.as_deref(), Some("user-1"));

        let path = store.document_path(&stored.id);
        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["id"], stored.id.as_str());
        assert_eq!(value["userId"], "user-1");
        assert_eq!(value["content"]["title"], "Acme Documentation");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_ids_are_unique_and_url_safe() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileDocumentStore::new(temp_dir.path());

        let a = store.create_document(new_document()).await.unwrap();
        let b = store.create_document(new_document()).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.len(), 16);
        assert!(
            a.id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );

        let files = std::fs::read_dir(store.root_dir()).unwrap().count();
        assert_eq!(files, 2);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryDocumentStore::new();
        let stored = store.create_document(new_document()).await.unwrap();
        let docs = store.documents().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].0, stored);
        assert_eq!(docs[0].1["sections"], json!([]));
    }
}
