//! File-backed local cache.
//!
//! One JSON document per account under the platform data directory,
//! holding the ordered `(id, EncryptedNote)` list. Only ciphertext ever
//! touches disk.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use directories::ProjectDirs;

use crate::error::CoreError;
use crate::model::{EncryptedNote, NoteId};
use crate::store::LocalCache;

pub const APP_QUALIFIER: &str = "com";
pub const APP_ORG: &str = "lockleaf";
pub const APP_NAME: &str = "lockleaf";

pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Cache rooted at the platform data directory.
    pub fn new() -> Result<Self, CoreError> {
        let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME).ok_or_else(|| {
            CoreError::LocalPersistenceFailed("cannot determine data directory".into())
        })?;
        Ok(Self::with_dir(dirs.data_dir().join("cache")))
    }

    /// Cache rooted at an explicit directory.
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, account_id: &str) -> PathBuf {
        self.dir.join(format!("{account_id}.notes.json"))
    }
}

#[async_trait]
impl LocalCache for FileCache {
    async fn load(
        &self,
        account_id: &str,
    ) -> Result<Option<Vec<(NoteId, EncryptedNote)>>, CoreError> {
        let path = self.path_for(account_id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CoreError::LocalPersistenceFailed(format!(
                    "read cache: {e}"
                )))
            }
        };
        let entries = serde_json::from_str(&raw)?;
        Ok(Some(entries))
    }

    async fn store(
        &self,
        account_id: &str,
        entries: &[(NoteId, EncryptedNote)],
    ) -> Result<(), CoreError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| CoreError::LocalPersistenceFailed(format!("create cache dir: {e}")))?;
        let data = serde_json::to_vec(entries)?;
        fs::write(self.path_for(account_id), data)
            .map_err(|e| CoreError::LocalPersistenceFailed(format!("write cache: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn sample(id: &str) -> EncryptedNote {
        EncryptedNote {
            id: id.to_string(),
            title: "blob-title".into(),
            content: "blob-content".into(),
            created_at: Utc::now(),
            archived: false,
        }
    }

    #[tokio::test]
    async fn store_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let cache = FileCache::with_dir(dir.path().to_path_buf());
        let entries = vec![
            ("a".to_string(), sample("a")),
            ("b".to_string(), sample("b")),
        ];
        cache.store("acct-1", &entries).await.unwrap();
        let loaded = cache.load("acct-1").await.unwrap().unwrap();
        assert_eq!(loaded, entries);
    }

    #[tokio::test]
    async fn missing_account_loads_none() {
        let dir = tempdir().unwrap();
        let cache = FileCache::with_dir(dir.path().to_path_buf());
        assert!(cache.load("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn accounts_are_isolated() {
        let dir = tempdir().unwrap();
        let cache = FileCache::with_dir(dir.path().to_path_buf());
        cache
            .store("acct-1", &[("a".to_string(), sample("a"))])
            .await
            .unwrap();
        assert!(cache.load("acct-2").await.unwrap().is_none());
    }
}
