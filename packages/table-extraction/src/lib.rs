//! Schema-Driven Table Extraction Library
//!
//! Turns the tables in a PDF into one spreadsheet whose columns are chosen
//! by the caller. A vision model reads each page; its answers are coerced
//! to the column schema, merged in page order and written as xlsx.
//!
//! # Usage
//!
//! ```rust,ignore
//! use table_extraction::{ExtractionConfig, Job, JobRequest, LopdfRenderer};
//! use table_extraction::testing::MockVisionAI;
//!
//! let config = ExtractionConfig::default();
//! let request = JobRequest {
//!     document: std::fs::read("survey.pdf")?,
//!     columns: vec!["Species".into(), "Location".into()],
//!     sample_pages: Some(3),
//!     ..Default::default()
//! };
//! let (document, schema) = request.prepare(&LopdfRenderer::new(), &config)?;
//!
//! let output = Job::new(MockVisionAI::new(), config)
//!     .run(&document, &schema, request.sample_pages)
//!     .await?;
//! std::fs::write("extracted_survey_sample.xlsx", output.artifact.bytes())?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Seams for the vision backend, the PDF renderer and checkpoints
//! - [`types`] - Documents, schemas, units, rows and stats
//! - [`pipeline`] - Segmentation, invocation, merging, artifact building and the job
//! - [`renderers`] - PDF page loading (lopdf)
//! - [`stores`] - Checkpoint storage (memory, files)
//! - [`ai`] - Vision backends and the rate-limit wrapper
//! - [`security`] - Credential handling
//! - [`testing`] - Mock implementations for testing

pub mod ai;
pub mod error;
pub mod pipeline;
pub mod renderers;
pub mod security;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{ErrorKind, ExtractionError, Result, UpstreamError, UpstreamResult};
pub use traits::{
    ai::{VisionAI, VisionRequest},
    cache::UnitCache,
    renderer::PageRenderer,
};
pub use types::{
    config::ExtractionConfig,
    document::{Document, DocumentId, Page},
    schema::{Schema, DEFAULT_MAX_INSTRUCTIONS, PAGE_NUMBER_COLUMN},
    stats::{is_empty_cell, JobStats},
    table::{normalize_value, MergedTable, Row},
    unit::{
        DegradedReason, DegradedUnit, ExtractionMode, ExtractionUnit, RawExtractionResult,
        UnitOutcome,
    },
};

// Re-export pipeline components
pub use pipeline::{
    build_artifact, checkpoint_key, merge, parse_response, read_preview, segment, Artifact,
    Invoker, Job, JobFailure, JobOutput, JobRequest, JobState, ParsedResponse, Preview,
    SegmentPlan, DEFAULT_PREVIEW_ROWS, SHEET_NAME,
};

pub use ai::RateLimitedAI;
#[cfg(feature = "openai")]
pub use ai::OpenAIVision;
pub use renderers::LopdfRenderer;
pub use security::{ApiKey, VisionCredentials};
pub use stores::{FileUnitCache, MemoryUnitCache};

// Re-export testing utilities
pub use testing::{MemoryRenderer, MockVisionAI};
