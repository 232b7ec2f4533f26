//! Page renderer trait.

use crate::error::Result;
use crate::types::document::Page;

/// Turns document bytes into pages.
///
/// Rendering is synchronous; it happens once per job before any
/// vision calls are made.
pub trait PageRenderer: Send + Sync {
    /// Render pages in document order, stopping after `limit` pages
    /// when one is given.
    ///
    /// Fails with `InvalidDocument` if the bytes cannot be parsed.
    fn render_pages(&self, bytes: &[u8], limit: Option<usize>) -> Result<Vec<Page>>;
}
