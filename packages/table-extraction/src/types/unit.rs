//! Extraction units and their per-unit outcomes.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::table::Row;

/// Consecutive pages submitted together in one vision call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractionUnit {
    /// Position in the segment plan; merge order follows it
    pub index: usize,

    /// Contiguous 0-based page range
    pub pages: Range<usize>,
}

impl ExtractionUnit {
    pub fn new(index: usize, pages: Range<usize>) -> Self {
        Self { index, pages }
    }

    /// 1-based number of the first page, as printed in the document.
    pub fn first_page_number(&self) -> usize {
        self.pages.start + 1
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

impl fmt::Display for ExtractionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pages.len() == 1 {
            write!(f, "unit {} (page {})", self.index, self.pages.start + 1)
        } else {
            write!(
                f,
                "unit {} (pages {}-{})",
                self.index,
                self.pages.start + 1,
                self.pages.end
            )
        }
    }
}

/// Which part of the document produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Every page was segmented
    Full,

    /// Only the leading pages were segmented
    Sample {
        /// The caller's limit
        requested: usize,
        /// Pages actually covered (`min(requested, page_count)`)
        pages: usize,
    },
}

impl ExtractionMode {
    pub fn is_sample(&self) -> bool {
        matches!(self, ExtractionMode::Sample { .. })
    }
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMode::Full => f.write_str("full"),
            ExtractionMode::Sample { pages, .. } => write!(f, "sample ({} pages)", pages),
        }
    }
}

/// Why a unit contributed no rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DegradedReason {
    /// Every retry hit a transient upstream fault
    TransientExhausted { attempts: u32, last_error: String },

    /// The response could not be read as rows
    MalformedResponse { detail: String },
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradedReason::TransientExhausted {
                attempts,
                last_error,
            } => write!(f, "gave up after {} attempts: {}", attempts, last_error),
            DegradedReason::MalformedResponse { detail } => {
                write!(f, "malformed response: {}", detail)
            }
        }
    }
}

/// What one unit produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    Extracted { rows: Vec<Row> },
    Degraded { reason: DegradedReason },
}

/// The result of invoking the vision step for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExtractionResult {
    pub unit: ExtractionUnit,
    pub outcome: UnitOutcome,
}

impl RawExtractionResult {
    pub fn extracted(unit: ExtractionUnit, rows: Vec<Row>) -> Self {
        Self {
            unit,
            outcome: UnitOutcome::Extracted { rows },
        }
    }

    pub fn degraded(unit: ExtractionUnit, reason: DegradedReason) -> Self {
        Self {
            unit,
            outcome: UnitOutcome::Degraded { reason },
        }
    }

    /// Rows contributed by this unit (none when degraded).
    pub fn rows(&self) -> &[Row] {
        match &self.outcome {
            UnitOutcome::Extracted { rows } => rows,
            UnitOutcome::Degraded { .. } => &[],
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.outcome, UnitOutcome::Degraded { .. })
    }

    /// Split off the degraded bookkeeping entry, if any.
    pub fn degraded_unit(&self) -> Option<DegradedUnit> {
        match &self.outcome {
            UnitOutcome::Degraded { reason } => Some(DegradedUnit {
                unit: self.unit.clone(),
                reason: reason.clone(),
            }),
            UnitOutcome::Extracted { .. } => None,
        }
    }
}

/// Caller-visible record of a degraded unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedUnit {
    pub unit: ExtractionUnit,
    pub reason: DegradedReason,
}
