//! Configuration for extraction jobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::schema::DEFAULT_MAX_INSTRUCTIONS;

/// Configuration for the extraction pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Pages per vision call.
    ///
    /// Small units bound payload size and isolate failures. Default: 1.
    pub unit_size: usize,

    /// Maximum unit calls in flight at once. Default: 4.
    pub concurrency: usize,

    /// Retries after the first attempt for transient upstream faults.
    ///
    /// Default: 3.
    pub max_retries: u32,

    /// First backoff delay; doubles on every retry. Default: 500 ms.
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff delay. Default: 8 s.
    pub backoff_max_ms: u64,

    /// Deadline for the whole job. Default: 30 minutes.
    pub job_timeout_secs: u64,

    /// Cap on free-text instructions, in characters. Default: 4000.
    pub max_instructions_len: usize,

    /// Fail with `EmptyResult` when no rows were extracted.
    ///
    /// When false an empty but valid spreadsheet is returned. Default: false.
    pub strict_empty: bool,

    /// Vision model name passed to the backend.
    pub model: String,

    /// Optional requests-per-second ceiling for the vision backend.
    pub requests_per_second: Option<u32>,

    /// Drop checkpointed unit results after a successful job. Default: true.
    pub clear_checkpoints_on_success: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            unit_size: 1,
            concurrency: 4,
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 8_000,
            job_timeout_secs: 30 * 60,
            max_instructions_len: DEFAULT_MAX_INSTRUCTIONS,
            strict_empty: false,
            model: "gpt-4o".to_string(),
            requests_per_second: None,
            clear_checkpoints_on_success: true,
        }
    }
}

impl ExtractionConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pages per unit (at least 1).
    pub fn with_unit_size(mut self, pages: usize) -> Self {
        self.unit_size = pages.max(1);
        self
    }

    /// Set the concurrency cap (at least 1).
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    /// Set the transient retry count.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set backoff base and cap.
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base_ms = base.as_millis() as u64;
        self.backoff_max_ms = max.as_millis() as u64;
        self
    }

    /// Set the job deadline.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set the instruction length cap.
    pub fn with_max_instructions_len(mut self, max: usize) -> Self {
        self.max_instructions_len = max;
        self
    }

    /// Set the empty-result policy.
    pub fn with_strict_empty(mut self, strict: bool) -> Self {
        self.strict_empty = strict;
        self
    }

    /// Set the vision model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a requests-per-second ceiling.
    pub fn with_requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = Some(rps);
        self
    }

    /// Keep or clear checkpoints after success.
    pub fn with_clear_checkpoints(mut self, clear: bool) -> Self {
        self.clear_checkpoints_on_success = clear;
        self
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(20);
        let delay = self.backoff_base_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.backoff_max_ms))
    }
}
