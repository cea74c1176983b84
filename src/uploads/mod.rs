//! Inbound file persistence and outbound attachment preparation.
//!
//! Uploaded documents land under a managed storage root using the
//! attachment's reported name, sanitized to its final path component so an
//! attacker-chosen name can never escape the root. Same-name uploads are
//! last-writer-wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::fs;

use crate::transport::{OutboundAttachment, OCTET_STREAM};

/// Errors from the upload store
#[derive(Error, Debug, Clone)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("unusable file name: {0:?}")]
    InvalidName(String),
}

/// One persisted upload.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Sanitized file name
    pub name: String,
    /// Absolute path inside the storage root
    pub stored_path: PathBuf,
    /// When the bytes were written
    pub stored_at: DateTime<Utc>,
}

/// Store for inbound document attachments.
pub struct UploadStore {
    root: PathBuf,
    /// Received uploads by sanitized name (last writer wins)
    entries: RwLock<HashMap<String, StoredUpload>>,
}

impl UploadStore {
    /// Open the store, creating the storage root if absent. Idempotent.
    pub async fn new(root: PathBuf) -> Result<Self, UploadError> {
        fs::create_dir_all(&root)
            .await
            .map_err(|e| UploadError::Io(format!("failed to create storage root: {e}")))?;
        Ok(Self {
            root,
            entries: RwLock::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist one inbound document under the storage root.
    pub async fn receive(&self, name: &str, bytes: &[u8]) -> Result<StoredUpload, UploadError> {
        let name = sanitize_name(name)?;
        let stored_path = self.root.join(&name);

        fs::write(&stored_path, bytes)
            .await
            .map_err(|e| UploadError::Io(format!("failed to write {name}: {e}")))?;

        let upload = StoredUpload {
            name: name.clone(),
            stored_path,
            stored_at: Utc::now(),
        };
        self.entries.write().insert(name, upload.clone());
        Ok(upload)
    }

    /// Snapshot of everything received so far.
    pub fn list(&self) -> Vec<StoredUpload> {
        self.entries.read().values().cloned().collect()
    }
}

/// Reduce an attachment's reported name to a safe final path component.
///
/// Directory components (either separator style) are stripped; names that
/// reduce to nothing or to a dot-only component are rejected.
fn sanitize_name(name: &str) -> Result<String, UploadError> {
    let stripped = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim()
        .to_string();
    if stripped.is_empty() || stripped.chars().all(|c| c == '.') {
        return Err(UploadError::InvalidName(name.to_string()));
    }
    Ok(stripped)
}

/// Build an outbound attachment descriptor for a local path.
///
/// Fails if the path does not exist at call time; a file deleted between
/// this check and the transport's read is an accepted race.
pub fn prepare_outbound(path: &Path) -> Result<OutboundAttachment, UploadError> {
    if !path.exists() {
        return Err(UploadError::NotFound(path.display().to_string()));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    Ok(OutboundAttachment {
        name,
        source_path: path.to_path_buf(),
        mime_type: OCTET_STREAM.to_string(),
    })
}
