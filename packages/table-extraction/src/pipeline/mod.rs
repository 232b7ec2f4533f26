//! Extraction pipeline - the core of the library.
//!
//! Stages, in the order a job runs them:
//! - Segment the document into units
//! - Invoke the vision model per unit (bounded concurrency, retries)
//! - Merge unit rows into one schema-conformant table
//! - Build the spreadsheet artifact and stats

pub mod artifact;
pub mod invoke;
pub mod job;
pub mod merge;
pub mod parse;
pub mod prompts;
pub mod segment;

pub use artifact::{build_artifact, read_preview, Artifact, Preview, DEFAULT_PREVIEW_ROWS, SHEET_NAME};
pub use invoke::Invoker;
pub use job::{checkpoint_key, Job, JobFailure, JobOutput, JobRequest, JobState};
pub use merge::{merge, raw_row_count};
pub use parse::{parse_response, strip_code_fence, ParsedResponse};
pub use prompts::{column_hint, extract_prompt_hash, format_extract_prompt, response_schema, EXTRACT_PROMPT};
pub use segment::{segment, SegmentPlan};
