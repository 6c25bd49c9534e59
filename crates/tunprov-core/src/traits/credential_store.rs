// # Credential Store Trait
//
// Read-only filesystem access used by credential discovery.
//
// The external tool writes its credential file to an undisclosed location;
// discovery observes candidate directories before and after creation and
// diffs the two views. Hiding the filesystem behind this trait keeps the
// tolerance window and ranking policy testable with a virtual filesystem.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::Error;

/// Read-only view over the directories credential discovery inspects
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// List regular `.json` files directly inside `dir` with their
    /// last-modified timestamps. A missing directory is an empty listing,
    /// not an error.
    async fn list_json_files(&self, dir: &Path)
    -> Result<Vec<(PathBuf, DateTime<Utc>)>, Error>;

    /// Read a candidate file as UTF-8 text
    async fn read_to_string(&self, path: &Path) -> Result<String, Error>;

    /// Whether `path` currently exists
    async fn exists(&self, path: &Path) -> bool;
}
