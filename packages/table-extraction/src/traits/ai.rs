//! Vision AI trait.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::UpstreamResult;

/// Everything a backend needs to read one extraction unit.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    /// Unit index, for logging and test scripting
    pub unit_index: usize,

    /// Full extraction prompt with the schema and instructions embedded
    pub prompt: String,

    /// Rendered page images (PNG), one per page that has one
    pub images: Vec<Arc<[u8]>>,

    /// Concatenated text layer of the unit's pages, if any
    pub page_text: Option<String>,

    /// JSON schema the response envelope must satisfy
    pub response_schema: Value,
}

/// Vision-capable model.
///
/// Implementations wrap a specific provider and classify its failures
/// into [`UpstreamError`](crate::error::UpstreamError) so the invoker can
/// decide between retrying, degrading the unit, or failing the job.
#[async_trait]
pub trait VisionAI: Send + Sync {
    /// Return the model's raw text response for one unit.
    async fn complete(&self, request: &VisionRequest) -> UpstreamResult<String>;
}

#[async_trait]
impl<T: VisionAI + ?Sized> VisionAI for Arc<T> {
    async fn complete(&self, request: &VisionRequest) -> UpstreamResult<String> {
        (**self).complete(request).await
    }
}
