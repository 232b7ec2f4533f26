//! Testing utilities including mock implementations.
//!
//! These let applications exercise the pipeline without PDF parsing or
//! real vision calls.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{Result, UpstreamError, UpstreamResult};
use crate::traits::{
    ai::{VisionAI, VisionRequest},
    renderer::PageRenderer,
};
use crate::types::document::{Document, Page};

/// A scripted vision backend.
///
/// Responses are keyed by unit index. Queued failures are returned first,
/// then the scripted response; units without a script get an envelope
/// with no rows.
#[derive(Default)]
pub struct MockVisionAI {
    /// Raw responses by unit
    responses: Arc<RwLock<HashMap<usize, String>>>,

    /// One-shot failures by unit, consumed in order
    failures: Arc<RwLock<HashMap<usize, VecDeque<UpstreamError>>>>,

    /// Units that fail on every call
    permanent: Arc<RwLock<HashMap<usize, UpstreamError>>>,

    /// Artificial latency per call
    delay: Option<Duration>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockVisionCall>>>,
}

/// Record of a call made to the mock.
#[derive(Debug, Clone)]
pub struct MockVisionCall {
    pub unit_index: usize,
    pub image_count: usize,
    pub has_text: bool,
    pub prompt: String,
}

impl MockVisionAI {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `unit` with an envelope holding `rows`.
    pub fn with_rows(self, unit: usize, rows: Vec<Value>) -> Self {
        self.with_response(unit, envelope(rows))
    }

    /// Answer `unit` with this exact text.
    pub fn with_response(self, unit: usize, raw: impl Into<String>) -> Self {
        self.responses.write().unwrap().insert(unit, raw.into());
        self
    }

    /// Fail the next calls for `unit` with these errors, in order.
    pub fn with_failures(self, unit: usize, errors: Vec<UpstreamError>) -> Self {
        self.failures
            .write()
            .unwrap()
            .entry(unit)
            .or_default()
            .extend(errors);
        self
    }

    /// Fail every call for `unit`.
    pub fn always_fail(self, unit: usize, error: UpstreamError) -> Self {
        self.permanent.write().unwrap().insert(unit, error);
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockVisionCall> {
        self.calls.read().unwrap().clone()
    }

    /// Number of calls made for one unit.
    pub fn call_count(&self, unit: usize) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.unit_index == unit)
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }
}

#[async_trait]
impl VisionAI for MockVisionAI {
    async fn complete(&self, request: &VisionRequest) -> UpstreamResult<String> {
        self.calls.write().unwrap().push(MockVisionCall {
            unit_index: request.unit_index,
            image_count: request.images.len(),
            has_text: request.page_text.is_some(),
            prompt: request.prompt.clone(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.permanent.read().unwrap().get(&request.unit_index) {
            return Err(error.clone());
        }

        let queued = self
            .failures
            .write()
            .unwrap()
            .get_mut(&request.unit_index)
            .and_then(|q| q.pop_front());
        if let Some(error) = queued {
            return Err(error);
        }

        Ok(self
            .responses
            .read()
            .unwrap()
            .get(&request.unit_index)
            .cloned()
            .unwrap_or_else(|| envelope(vec![])))
    }
}

/// Renderer that ignores the bytes and returns `n` text pages.
#[derive(Debug, Clone, Default)]
pub struct MemoryRenderer {
    pages: usize,
}

impl MemoryRenderer {
    pub fn with_pages(pages: usize) -> Self {
        Self { pages }
    }
}

impl PageRenderer for MemoryRenderer {
    fn render_pages(&self, _bytes: &[u8], limit: Option<usize>) -> Result<Vec<Page>> {
        let pages = limit.map_or(self.pages, |limit| limit.min(self.pages));
        Ok((0..pages)
            .map(|i| Page::new(i).with_text(format!("page {}", i + 1)))
            .collect())
    }
}

/// A document of `pages` pages, each with a small distinct image.
pub fn test_document(pages: usize) -> Document {
    Document::from_pages(
        (0..pages)
            .map(|i| {
                let image: Vec<u8> = vec![0x89, b'P', b'N', b'G', (i % 256) as u8];
                Page::new(i).with_image(image)
            })
            .collect(),
    )
}

/// Response envelope the prompt asks the model for.
pub fn envelope(rows: Vec<Value>) -> String {
    let total = rows.len();
    json!({
        "extracted_data": rows,
        "total_rows": total,
        "extraction_notes": "",
        "confidence_level": "high",
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(unit_index: usize) -> VisionRequest {
        VisionRequest {
            unit_index,
            prompt: "p".into(),
            images: vec![],
            page_text: Some("t".into()),
            response_schema: json!({}),
        }
    }

    #[tokio::test]
    async fn test_failures_then_response() {
        let ai = MockVisionAI::new()
            .with_failures(0, vec![UpstreamError::Transient("429".into())])
            .with_response(0, "ok");

        assert!(ai.complete(&request(0)).await.is_err());
        assert_eq!(ai.complete(&request(0)).await.unwrap(), "ok");
        assert_eq!(ai.call_count(0), 2);
        assert!(ai.calls()[0].has_text);
    }

    #[tokio::test]
    async fn test_default_is_empty_envelope() {
        let ai = MockVisionAI::new();
        let raw = ai.complete(&request(3)).await.unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["total_rows"], 0);
    }

    #[test]
    fn test_memory_renderer() {
        let pages = MemoryRenderer::with_pages(2).render_pages(b"", None).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].text.as_deref(), Some("page 2"));
        assert_eq!(MemoryRenderer::with_pages(2).render_pages(b"", Some(1)).unwrap().len(), 1);
    }
}
