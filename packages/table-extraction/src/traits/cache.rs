//! Checkpoint storage for per-unit results.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::table::Row;

/// Cache of successful unit results, used to resume interrupted jobs.
///
/// Keys are content fingerprints; see
/// [`checkpoint_key`](crate::pipeline::job::checkpoint_key).
#[async_trait]
pub trait UnitCache: Send + Sync {
    /// Get cached rows for a unit.
    async fn get(&self, key: &str) -> Result<Option<Vec<Row>>>;

    /// Store rows for a unit.
    async fn put(&self, key: &str, rows: &[Row]) -> Result<()>;

    /// Remove a unit's entry. Missing keys are not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}
