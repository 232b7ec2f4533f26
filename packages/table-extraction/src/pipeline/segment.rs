//! Page segmenter: document to extraction units.

use crate::error::{ExtractionError, Result};
use crate::types::document::Document;
use crate::types::unit::{ExtractionMode, ExtractionUnit};

/// Which pages to process and how to group them.
///
/// The plan holds no page data; [`SegmentPlan::units`] yields a fresh
/// lazy iterator every time it is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPlan {
    covered_pages: usize,
    unit_size: usize,
    mode: ExtractionMode,
}

impl SegmentPlan {
    /// Iterate units in order.
    pub fn units(&self) -> impl Iterator<Item = ExtractionUnit> + Clone + Send + 'static {
        let (covered, size) = (self.covered_pages, self.unit_size);
        (0..covered)
            .step_by(size)
            .enumerate()
            .map(move |(index, start)| ExtractionUnit::new(index, start..(start + size).min(covered)))
    }

    pub fn unit_count(&self) -> usize {
        self.covered_pages.div_ceil(self.unit_size)
    }

    /// Pages covered by the plan.
    pub fn page_count(&self) -> usize {
        self.covered_pages
    }

    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }
}

/// Plan units for a document.
///
/// With a sample limit `L` only pages `0..min(page_count, L)` are covered.
/// Fails with `InvalidDocument` for a document without pages and with
/// `InvalidSampleSize` when `L <= 0`.
pub fn segment(document: &Document, sample_limit: Option<i64>, unit_size: usize) -> Result<SegmentPlan> {
    document.ensure_pages()?;
    let page_count = document.page_count();

    let (covered_pages, mode) = match sample_limit {
        None => (page_count, ExtractionMode::Full),
        Some(limit) if limit <= 0 => return Err(ExtractionError::InvalidSampleSize(limit)),
        Some(limit) => {
            let requested = usize::try_from(limit).unwrap_or(usize::MAX);
            let pages = requested.min(page_count);
            (pages, ExtractionMode::Sample { requested, pages })
        }
    };

    Ok(SegmentPlan {
        covered_pages,
        unit_size: unit_size.max(1),
        mode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_document;
    use crate::types::document::Page;

    #[test]
    fn test_sample_of_ten() {
        let doc = test_document(10);

        let sampled = segment(&doc, Some(3), 1).unwrap();
        assert_eq!(sampled.units().count(), 3);
        assert_eq!(
            sampled.mode(),
            ExtractionMode::Sample {
                requested: 3,
                pages: 3
            }
        );

        let full = segment(&doc, None, 1).unwrap();
        assert_eq!(full.units().count(), 10);
        assert_eq!(full.mode(), ExtractionMode::Full);
    }

    #[test]
    fn test_limit_above_page_count() {
        let doc = test_document(2);
        let plan = segment(&doc, Some(50), 1).unwrap();
        assert_eq!(plan.unit_count(), 2);
        assert_eq!(
            plan.mode(),
            ExtractionMode::Sample {
                requested: 50,
                pages: 2
            }
        );
    }

    #[test]
    fn test_invalid_sample_size() {
        let doc = test_document(2);
        assert!(matches!(
            segment(&doc, Some(0), 1),
            Err(ExtractionError::InvalidSampleSize(0))
        ));
        assert!(matches!(
            segment(&doc, Some(-4), 1),
            Err(ExtractionError::InvalidSampleSize(-4))
        ));
    }

    #[test]
    fn test_empty_document() {
        let doc = Document::from_pages(Vec::<Page>::new());
        assert!(matches!(
            segment(&doc, None, 1),
            Err(ExtractionError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn test_grouped_units_are_contiguous() {
        let doc = test_document(7);
        let plan = segment(&doc, None, 3).unwrap();
        let units: Vec<_> = plan.units().collect();

        assert_eq!(plan.unit_count(), 3);
        assert_eq!(units[0].pages, 0..3);
        assert_eq!(units[1].pages, 3..6);
        assert_eq!(units[2].pages, 6..7);
        assert!(units.iter().enumerate().all(|(i, u)| u.index == i));
    }

    #[test]
    fn test_units_are_restartable() {
        let doc = test_document(4);
        let plan = segment(&doc, None, 1).unwrap();
        let first: Vec<_> = plan.units().collect();
        let second: Vec<_> = plan.units().collect();
        assert_eq!(first, second);
    }
}
