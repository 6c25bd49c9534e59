//! Two-phase filesystem snapshots
//!
//! The external tool writes its credential file as an unannounced side
//! effect of tunnel creation. To observe that side effect, the candidate
//! directories are snapshotted immediately before and after the creation
//! command, and the two views are diffed. A small tolerance absorbs
//! filesystem timestamp granularity.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::traits::CredentialStore;

/// Modification-time slack below which a file does not count as rewritten
const MTIME_TOLERANCE_SECS: i64 = 1;

/// Point-in-time view of the candidate directories: absolute path ->
/// last-modified timestamp
#[derive(Debug, Clone, Default)]
pub struct CredentialSnapshot {
    files: HashMap<PathBuf, DateTime<Utc>>,
}

impl CredentialSnapshot {
    /// Capture a snapshot over the given directories.
    ///
    /// A directory that cannot be listed is skipped with a warning; a
    /// snapshot is best-effort by design.
    pub async fn capture(store: &dyn CredentialStore, dirs: &[PathBuf]) -> Self {
        let mut files = HashMap::new();
        for dir in dirs {
            match store.list_json_files(dir).await {
                Ok(listed) => files.extend(listed),
                Err(err) => {
                    warn!("cannot inspect directory \"{}\": {}", dir.display(), err);
                }
            }
        }
        Self { files }
    }

    /// Files that are new, or whose modification time advanced beyond the
    /// tolerance, relative to `before`. Ranked most-recently-modified first;
    /// ties break on path for determinism.
    pub fn changed_since(&self, before: &CredentialSnapshot) -> Vec<(PathBuf, DateTime<Utc>)> {
        let tolerance = Duration::seconds(MTIME_TOLERANCE_SECS);
        let mut changed: Vec<(PathBuf, DateTime<Utc>)> = self
            .files
            .iter()
            .filter(|(path, modified)| match before.files.get(*path) {
                Some(previous) => **modified > *previous + tolerance,
                None => true,
            })
            .map(|(path, modified)| (path.clone(), *modified))
            .collect();

        changed.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(&right.0)));
        changed
    }

    /// Every file in the snapshot with its modification time
    pub fn files(&self) -> impl Iterator<Item = (&Path, DateTime<Utc>)> {
        self.files
            .iter()
            .map(|(path, modified)| (path.as_path(), *modified))
    }

    /// Modification time of a snapshotted path, if present
    pub fn modified_at(&self, path: &Path) -> Option<DateTime<Utc>> {
        self.files.get(path).copied()
    }

    /// Number of files in the snapshot
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the snapshot saw no files at all
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn new_file_appears_in_the_diff() {
        let store = MemoryCredentialStore::new();
        let dirs = vec![PathBuf::from("/creds")];
        store.put_file("/creds/old.json", "{}", at(0)).await;

        let before = CredentialSnapshot::capture(&store, &dirs).await;
        store.put_file("/creds/new.json", "{}", at(5)).await;
        let after = CredentialSnapshot::capture(&store, &dirs).await;

        let changed = after.changed_since(&before);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].0, PathBuf::from("/creds/new.json"));
    }

    #[tokio::test]
    async fn mtime_within_tolerance_is_not_a_change() {
        let store = MemoryCredentialStore::new();
        let dirs = vec![PathBuf::from("/creds")];
        store.put_file("/creds/a.json", "{}", at(0)).await;

        let before = CredentialSnapshot::capture(&store, &dirs).await;
        store.touch(Path::new("/creds/a.json"), at(1)).await;
        let after = CredentialSnapshot::capture(&store, &dirs).await;
        assert!(after.changed_since(&before).is_empty());

        store.touch(Path::new("/creds/a.json"), at(3)).await;
        let after = CredentialSnapshot::capture(&store, &dirs).await;
        assert_eq!(after.changed_since(&before).len(), 1);
    }

    #[tokio::test]
    async fn diff_ranks_most_recent_first() {
        let store = MemoryCredentialStore::new();
        let dirs = vec![PathBuf::from("/creds")];
        let before = CredentialSnapshot::capture(&store, &dirs).await;

        store.put_file("/creds/older.json", "{}", at(10)).await;
        store.put_file("/creds/newer.json", "{}", at(20)).await;
        let after = CredentialSnapshot::capture(&store, &dirs).await;

        let changed = after.changed_since(&before);
        assert_eq!(changed[0].0, PathBuf::from("/creds/newer.json"));
        assert_eq!(changed[1].0, PathBuf::from("/creds/older.json"));
    }

    #[tokio::test]
    async fn capture_spans_multiple_directories() {
        let store = MemoryCredentialStore::new();
        let dirs = vec![PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/missing")];
        store.put_file("/a/one.json", "{}", at(0)).await;
        store.put_file("/b/two.json", "{}", at(0)).await;

        let snapshot = CredentialSnapshot::capture(&store, &dirs).await;
        assert_eq!(snapshot.len(), 2);
    }
}
