//! Credential material and its persistence.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ChatwireError;
use crate::Result;

/// File name used inside the credential folder.
pub const CREDENTIALS_FILE: &str = "creds.json";

/// Opaque authentication material.
///
/// The client never interprets the blob beyond [`Credentials::is_registered`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(Value);

impl Credentials {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Credentials for a profile that has never paired.
    pub fn fresh() -> Self {
        Self(Value::Object(Default::default()))
    }

    /// Whether a pairing has completed for this blob.
    pub fn is_registered(&self) -> bool {
        self.0
            .get("registered")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::fresh()
    }
}

/// Loads and re-persists credentials for one local profile.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the stored credentials, or fresh ones if none exist yet.
    async fn load(&self) -> Result<Credentials>;

    /// Persist updated credentials.
    async fn persist(&self, credentials: &Credentials) -> Result<()>;

    /// Where the credentials live, for operator-facing messages.
    fn location(&self) -> String;
}

/// Stores credentials as JSON inside a profile folder.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    folder: PathBuf,
}

impl FileCredentialStore {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn file_path(&self) -> PathBuf {
        self.folder.join(CREDENTIALS_FILE)
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Credentials> {
        let path = self.file_path();
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
                    ChatwireError::Credentials(format!("{}: {}", path.display(), e))
                })?;
                debug!("Loaded credentials from {}", path.display());
                Ok(Credentials::new(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No credentials at {}, starting fresh", path.display());
                Ok(Credentials::fresh())
            }
            Err(e) => Err(ChatwireError::Credentials(format!(
                "{}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn persist(&self, credentials: &Credentials) -> Result<()> {
        tokio::fs::create_dir_all(&self.folder).await?;

        let path = self.file_path();
        let tmp = self.folder.join(format!("{CREDENTIALS_FILE}.tmp"));
        let bytes = serde_json::to_vec_pretty(credentials)?;

        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Persisted credentials to {}", path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.folder.display().to_string()
    }
}
