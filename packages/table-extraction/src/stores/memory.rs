//! In-memory checkpoint cache for tests and single-process reruns.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::traits::cache::UnitCache;
use crate::types::table::Row;

/// Unit results kept in a map. Lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryUnitCache {
    entries: RwLock<HashMap<String, Vec<Row>>>,
}

impl MemoryUnitCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl UnitCache for MemoryUnitCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<Row>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, rows: &[Row]) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), rows.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
