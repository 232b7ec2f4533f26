//! Documents and their pages.

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::{ExtractionError, Result};
use crate::traits::renderer::PageRenderer;

/// One rendered page of a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 0-based position in the document
    pub index: usize,

    /// Rendered page image (PNG), shared read-only across unit calls
    pub image: Option<Arc<[u8]>>,

    /// Raw text layer, when the PDF carries one
    pub text: Option<String>,
}

impl Page {
    /// Create an empty page at the given index.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            image: None,
            text: None,
        }
    }

    /// Attach a PNG image.
    pub fn with_image(mut self, png: impl Into<Arc<[u8]>>) -> Self {
        self.image = Some(png.into());
        self
    }

    /// Attach a text layer. Blank text is ignored.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.trim().is_empty() {
            self.text = Some(text);
        }
        self
    }

    /// Whether the page has anything a vision model could read.
    pub fn has_content(&self) -> bool {
        self.image.is_some() || self.text.is_some()
    }
}

/// Opaque document handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to correlate log lines
        f.write_str(&self.0[..self.0.len().min(12)])
    }
}

/// An immutable, ordered sequence of pages.
#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    pages: Vec<Page>,
}

impl Document {
    /// Load a PDF through a renderer, keeping at most `limit` leading pages.
    ///
    /// The handle is the SHA-256 of the source bytes, so the same file
    /// always maps to the same id.
    pub fn load(bytes: &[u8], renderer: &dyn PageRenderer, limit: Option<usize>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(ExtractionError::invalid_document("document is empty"));
        }

        let pages = renderer.render_pages(bytes, limit)?;
        let document = Self {
            id: DocumentId(hash_bytes(bytes)),
            pages,
        };
        document.ensure_pages()?;

        tracing::info!(
            document = %document.id,
            pages = document.page_count(),
            "Loaded document"
        );
        Ok(document)
    }

    /// Build a document from already-rendered pages.
    ///
    /// Page indices are rewritten to their position so they stay unique
    /// and monotonic.
    pub fn from_pages(pages: Vec<Page>) -> Self {
        let pages: Vec<Page> = pages
            .into_iter()
            .enumerate()
            .map(|(index, page)| Page { index, ..page })
            .collect();

        let mut hasher = Sha256::new();
        for page in &pages {
            hasher.update((page.index as u64).to_le_bytes());
            if let Some(image) = &page.image {
                hasher.update(image);
            }
            if let Some(text) = &page.text {
                hasher.update(text.as_bytes());
            }
        }

        Self {
            id: DocumentId(format!("{:x}", hasher.finalize())),
            pages,
        }
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub(crate) fn ensure_pages(&self) -> Result<()> {
        if self.pages.is_empty() {
            return Err(ExtractionError::invalid_document("document has no pages"));
        }
        Ok(())
    }
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryRenderer;

    #[test]
    fn test_from_pages_reindexes() {
        let doc = Document::from_pages(vec![Page::new(7).with_text("a"), Page::new(2)]);
        assert_eq!(doc.page(0).unwrap().index, 0);
        assert_eq!(doc.page(1).unwrap().index, 1);
    }

    #[test]
    fn test_blank_text_is_dropped() {
        let page = Page::new(0).with_text("   \n");
        assert!(page.text.is_none());
        assert!(!page.has_content());
    }

    #[test]
    fn test_id_is_content_derived() {
        let a = Document::from_pages(vec![Page::new(0).with_text("species list")]);
        let b = Document::from_pages(vec![Page::new(0).with_text("species list")]);
        let c = Document::from_pages(vec![Page::new(0).with_text("other")]);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn test_load_rejects_empty_bytes() {
        let renderer = MemoryRenderer::with_pages(3);
        let err = Document::load(&[], &renderer, None).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidDocument { .. }));
    }

    #[test]
    fn test_load_rejects_zero_pages() {
        let renderer = MemoryRenderer::with_pages(0);
        let err = Document::load(b"%PDF-1.4", &renderer, None).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidDocument { .. }));
    }

    #[test]
    fn test_load_through_renderer() {
        let renderer = MemoryRenderer::with_pages(4);
        let doc = Document::load(b"%PDF-1.4 fake", &renderer, None).unwrap();
        assert_eq!(doc.page_count(), 4);
        assert_eq!(doc.id().as_str().len(), 64);
    }

    #[test]
    fn test_load_with_page_limit() {
        let renderer = MemoryRenderer::with_pages(4);
        let full = Document::load(b"%PDF-1.4 fake", &renderer, None).unwrap();
        let first = Document::load(b"%PDF-1.4 fake", &renderer, Some(1)).unwrap();

        assert_eq!(first.page_count(), 1);
        assert_eq!(first.id(), full.id());
        assert_eq!(
            Document::load(b"%PDF-1.4 fake", &renderer, Some(10)).unwrap().page_count(),
            4
        );
    }
}
