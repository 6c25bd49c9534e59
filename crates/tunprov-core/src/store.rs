// # Credential Store Implementations
//
// This module provides implementations of the CredentialStore trait:
// the real filesystem view used in production, and an in-memory view for
// tests and snapshot/diff experiments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::warn;

use crate::Error;
use crate::traits::CredentialStore;

/// Filesystem-backed credential store
///
/// A missing or unreadable directory yields an empty listing with a warning,
/// never an error: candidate directories routinely do not exist (fresh
/// containers, no home directory).
#[derive(Debug, Default, Clone, Copy)]
pub struct OsCredentialStore;

impl OsCredentialStore {
    /// Create the filesystem-backed store
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CredentialStore for OsCredentialStore {
    async fn list_json_files(
        &self,
        dir: &Path,
    ) -> Result<Vec<(PathBuf, DateTime<Utc>)>, Error> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                warn!("cannot inspect directory \"{}\": {}", dir.display(), err);
                return Ok(Vec::new());
            }
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_json = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            if !is_json {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!("cannot stat \"{}\": {}", path.display(), err);
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().map(DateTime::<Utc>::from)?;
            files.push((path, modified));
        }

        Ok(files)
    }

    async fn read_to_string(&self, path: &Path) -> Result<String, Error> {
        Ok(fs::read_to_string(path).await?)
    }

    async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }
}

/// In-memory credential store
///
/// Holds a flat path -> (content, mtime) map. Used by the contract tests to
/// drive snapshot diffing without real file I/O, and handy for dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    inner: Arc<RwLock<HashMap<PathBuf, (String, DateTime<Utc>)>>>,
}

impl MemoryCredentialStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a file with the given modification time
    pub async fn put_file(
        &self,
        path: impl Into<PathBuf>,
        content: impl Into<String>,
        modified: DateTime<Utc>,
    ) {
        let mut guard = self.inner.write().await;
        guard.insert(path.into(), (content.into(), modified));
    }

    /// Advance a file's modification time without changing its content
    pub async fn touch(&self, path: &Path, modified: DateTime<Utc>) {
        let mut guard = self.inner.write().await;
        if let Some(entry) = guard.get_mut(path) {
            entry.1 = modified;
        }
    }

    /// Number of stored files
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether the store holds no files
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn list_json_files(
        &self,
        dir: &Path,
    ) -> Result<Vec<(PathBuf, DateTime<Utc>)>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .iter()
            .filter(|(path, _)| {
                path.parent() == Some(dir)
                    && path
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            })
            .map(|(path, (_, modified))| (path.clone(), *modified))
            .collect())
    }

    async fn read_to_string(&self, path: &Path) -> Result<String, Error> {
        let guard = self.inner.read().await;
        guard
            .get(path)
            .map(|(content, _)| content.clone())
            .ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no such file: {}", path.display()),
                ))
            })
    }

    async fn exists(&self, path: &Path) -> bool {
        self.inner.read().await.contains_key(path)
    }
}
