//! File-backed checkpoint cache.
//!
//! Each unit is one `<key>.json` file, so an interrupted job can be
//! resumed by a later process pointed at the same directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ExtractionError, Result};
use crate::traits::cache::UnitCache;
use crate::types::table::Row;

/// Unit results stored as JSON files under a directory.
#[derive(Debug, Clone)]
pub struct FileUnitCache {
    dir: PathBuf,
}

impl FileUnitCache {
    /// Use `dir` for checkpoints. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(storage(format!("invalid checkpoint key {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl UnitCache for FileUnitCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<Row>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ExtractionError::Storage(Box::new(e))),
        }
    }

    async fn put(&self, key: &str, rows: &[Row]) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ExtractionError::Storage(Box::new(e)))?;

        // Write then rename so a crash never leaves a torn file behind
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(rows)?;
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| ExtractionError::Storage(Box::new(e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| ExtractionError::Storage(Box::new(e)))?;

        debug!(path = %path.display(), rows = rows.len(), "Wrote checkpoint");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ExtractionError::Storage(Box::new(e))),
        }
    }
}

fn storage(message: String) -> ExtractionError {
    ExtractionError::Storage(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileUnitCache::new(dir.path().join("checkpoints"));
        let rows: Vec<Row> = vec![
            [("Species", "Rana"), ("Location", "Pond")].into_iter().collect(),
        ];

        assert!(cache.get("abc123").await.unwrap().is_none());
        cache.put("abc123", &rows).await.unwrap();
        assert!(dir.path().join("checkpoints/abc123.json").exists());

        // A second handle on the same directory sees the entry
        let reopened = FileUnitCache::new(cache.dir());
        assert_eq!(reopened.get("abc123").await.unwrap(), Some(rows));

        reopened.remove("abc123").await.unwrap();
        reopened.remove("abc123").await.unwrap();
        assert!(cache.get("abc123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileUnitCache::new(dir.path());
        let err = cache.put("../escape", &[]).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Storage(_)));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), b"{not json").unwrap();
        let cache = FileUnitCache::new(dir.path());
        assert!(cache.get("bad").await.is_err());
    }
}
