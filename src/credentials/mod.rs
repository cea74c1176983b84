//! Credential storage module
//!
//! The transport issues opaque credential material that must survive
//! restarts; this module persists it. The on-disk format here is a small
//! JSON envelope with a base64 blob; the transport defines what the blob
//! contains.

use std::fs;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::Credentials;

/// Credential store errors
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("malformed credential file: {0}")]
    Malformed(String),
}

/// Capability interface for credential persistence.
///
/// The session manager guarantees `persist` completes before any reconnect
/// attempt observes the update.
pub trait CredentialStore: Send + Sync {
    /// Load the persisted credentials, or `None` for a fresh session.
    fn load(&self) -> Result<Option<Credentials>, CredentialError>;

    /// Durably persist new credential material.
    fn persist(&self, credentials: &Credentials) -> Result<(), CredentialError>;
}

/// On-disk envelope for the credential blob.
#[derive(Debug, Serialize, Deserialize)]
struct CredentialFile {
    version: u32,
    blob: String,
}

/// File-backed credential store.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, CredentialError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| CredentialError::Io(e.to_string()))?;
        let file: CredentialFile =
            serde_json::from_str(&raw).map_err(|e| CredentialError::Malformed(e.to_string()))?;
        let blob = BASE64
            .decode(file.blob.as_bytes())
            .map_err(|e| CredentialError::Malformed(e.to_string()))?;
        Ok(Some(Credentials(blob)))
    }

    fn persist(&self, credentials: &Credentials) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| CredentialError::Io(e.to_string()))?;
        }
        let file = CredentialFile {
            version: 1,
            blob: BASE64.encode(&credentials.0),
        };
        let raw =
            serde_json::to_string_pretty(&file).map_err(|e| CredentialError::Io(e.to_string()))?;
        // Write-then-rename so a partial write never replaces the old blob.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw).map_err(|e| CredentialError::Io(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| CredentialError::Io(e.to_string()))?;
        Ok(())
    }
}

/// In-memory credential store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the store with credentials.
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            slot: Mutex::new(Some(credentials)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, CredentialError> {
        Ok(self.slot.lock().clone())
    }

    fn persist(&self, credentials: &Credentials) -> Result<(), CredentialError> {
        *self.slot.lock() = Some(credentials.clone());
        Ok(())
    }
}
