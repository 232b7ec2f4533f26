//! Job orchestrator.
//!
//! A [`Job`] walks one document through
//! `Created → Segmenting → Extracting → Merging → Building → Complete`,
//! with `Failed` reachable from every non-terminal state. `run` consumes
//! the job, so a finished job cannot be restarted.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ExtractionError, Result};
use crate::pipeline::{
    artifact::{build_artifact, Artifact},
    invoke::Invoker,
    merge::merge,
    prompts::extract_prompt_hash,
    segment::{segment, SegmentPlan},
};
use crate::traits::{ai::VisionAI, cache::UnitCache, renderer::PageRenderer};
use crate::types::{
    config::ExtractionConfig,
    document::Document,
    schema::Schema,
    stats::JobStats,
    table::MergedTable,
    unit::{DegradedUnit, ExtractionUnit, RawExtractionResult},
};

/// Lifecycle states of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    Segmenting,
    Extracting,
    Merging,
    Building,
    Complete,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Created => "created",
            JobState::Segmenting => "segmenting",
            JobState::Extracting => "extracting",
            JobState::Merging => "merging",
            JobState::Building => "building",
            JobState::Complete => "complete",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Inbound request as the transport layer hands it over.
#[derive(Debug, Clone, Default)]
pub struct JobRequest {
    pub document: Vec<u8>,
    pub columns: Vec<String>,
    pub instructions: Option<String>,
    pub sample_pages: Option<i64>,
}

impl JobRequest {
    /// Validate the request and load the document.
    ///
    /// Input errors surface here, before a job exists. A sample request
    /// renders only the sampled pages.
    pub fn prepare(
        &self,
        renderer: &dyn PageRenderer,
        config: &ExtractionConfig,
    ) -> Result<(Document, Schema)> {
        let schema = Schema::validate(
            &self.columns,
            self.instructions.as_deref(),
            config.max_instructions_len,
        )?;

        if let Some(limit) = self.sample_pages.filter(|limit| *limit <= 0) {
            return Err(ExtractionError::InvalidSampleSize(limit));
        }
        let render_limit = self.sample_pages.and_then(|n| usize::try_from(n).ok());

        let document = Document::load(&self.document, renderer, render_limit)?;
        Ok((document, schema))
    }
}

/// Everything a completed job hands to the caller.
#[derive(Debug)]
pub struct JobOutput {
    pub job_id: Uuid,
    pub artifact: Artifact,
    pub table: MergedTable,
    pub stats: JobStats,

    /// Degraded units in unit order
    pub degraded: Vec<DegradedUnit>,

    /// Every state the job passed through, `Created` first
    pub transitions: Vec<JobState>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// A classified job failure.
#[derive(Debug, Error)]
#[error("job {job_id} failed while {failed_in}: {error}")]
pub struct JobFailure {
    pub job_id: Uuid,
    #[source]
    pub error: ExtractionError,

    /// State the job was in when it failed
    pub failed_in: JobState,
    pub transitions: Vec<JobState>,
}

/// Checkpoint key for one unit of one job input.
///
/// Covers the document bytes, the schema, the model, the prompt and the
/// unit's page range, so any change invalidates the entry.
pub fn checkpoint_key(
    document: &Document,
    schema: &Schema,
    model: &str,
    unit: &ExtractionUnit,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document.id().as_str().as_bytes());
    for column in schema.columns() {
        hasher.update(column.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(schema.instructions().unwrap_or_default().as_bytes());
    hasher.update([0u8]);
    hasher.update(model.as_bytes());
    hasher.update(extract_prompt_hash().as_bytes());
    hasher.update((unit.pages.start as u64).to_le_bytes());
    hasher.update((unit.pages.end as u64).to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// One extraction job.
pub struct Job<A> {
    id: Uuid,
    ai: A,
    config: ExtractionConfig,
    cache: Option<Arc<dyn UnitCache>>,
    cancel: CancellationToken,
    state: JobState,
    transitions: Vec<JobState>,
}

impl<A: VisionAI> Job<A> {
    pub fn new(ai: A, config: ExtractionConfig) -> Self {
        Self {
            id: Uuid::now_v7(),
            ai,
            config,
            cache: None,
            cancel: CancellationToken::new(),
            state: JobState::Created,
            transitions: vec![JobState::Created],
        }
    }

    /// Checkpoint successful units so a rerun can skip them.
    pub fn with_cache(mut self, cache: Arc<dyn UnitCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Handle that cancels the job from another task.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the job to a terminal state.
    pub async fn run(
        mut self,
        document: &Document,
        schema: &Schema,
        sample_limit: Option<i64>,
    ) -> std::result::Result<JobOutput, JobFailure> {
        let started_at = Utc::now();
        let deadline = Instant::now() + self.config.job_timeout();
        info!(
            job_id = %self.id,
            document = %document.id(),
            pages = document.page_count(),
            columns = schema.len(),
            "Starting extraction job"
        );

        self.transition(JobState::Segmenting);
        let plan = match segment(document, sample_limit, self.config.unit_size) {
            Ok(plan) => plan,
            Err(e) => return Err(self.fail(e)),
        };
        info!(
            job_id = %self.id,
            units = plan.unit_count(),
            mode = %plan.mode(),
            "Segmented document"
        );

        self.transition(JobState::Extracting);
        let extraction = tokio::time::timeout_at(deadline, self.extract(document, schema, &plan)).await;
        let results = match extraction {
            Ok(Ok(results)) => results,
            Ok(Err(e)) => return Err(self.fail(e)),
            Err(_) => {
                let limit = self.config.job_timeout();
                return Err(self.fail(ExtractionError::JobTimeout(limit)));
            }
        };

        self.transition(JobState::Merging);
        let table = merge(&results, schema);
        let mut degraded: Vec<DegradedUnit> =
            results.iter().filter_map(RawExtractionResult::degraded_unit).collect();
        degraded.sort_by_key(|d| d.unit.index);

        self.transition(JobState::Building);
        if table.is_empty() && self.config.strict_empty {
            return Err(self.fail(ExtractionError::EmptyResult));
        }
        if Instant::now() >= deadline {
            let limit = self.config.job_timeout();
            return Err(self.fail(ExtractionError::JobTimeout(limit)));
        }
        let (artifact, stats) = match build_artifact(&table, schema, plan.mode()) {
            Ok(built) => built,
            Err(e) => return Err(self.fail(e)),
        };
        let stats = stats.with_units(results.len(), degraded.len());

        if self.config.clear_checkpoints_on_success {
            self.clear_checkpoints(document, schema, &plan).await;
        }

        self.transition(JobState::Complete);
        info!(
            job_id = %self.id,
            rows = stats.total_rows,
            degraded_units = stats.degraded_units,
            duplicates_suppressed = stats.duplicates_suppressed,
            "Extraction job complete"
        );

        Ok(JobOutput {
            job_id: self.id,
            artifact,
            table,
            stats,
            degraded,
            transitions: self.transitions,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn extract(
        &self,
        document: &Document,
        schema: &Schema,
        plan: &SegmentPlan,
    ) -> Result<Vec<RawExtractionResult>> {
        let invoker = Invoker::new(&self.ai, document, schema, &self.config);

        let mut pending = stream::iter(plan.units())
            .map(|unit| self.run_unit(&invoker, document, schema, unit))
            .buffer_unordered(self.config.concurrency.max(1));

        let mut results = Vec::with_capacity(plan.unit_count());
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!(job_id = %self.id, finished = results.len(), "Job cancelled, dropping in-flight units");
                    return Err(ExtractionError::Cancelled);
                }
                next = pending.next() => match next {
                    Some(Ok(result)) => results.push(result),
                    Some(Err(e)) => return Err(e),
                    None => break,
                },
            }
        }
        Ok(results)
    }

    async fn run_unit(
        &self,
        invoker: &Invoker<'_, A>,
        document: &Document,
        schema: &Schema,
        unit: ExtractionUnit,
    ) -> Result<RawExtractionResult> {
        let Some(cache) = &self.cache else {
            return invoker.invoke(unit).await;
        };

        let key = checkpoint_key(document, schema, &self.config.model, &unit);
        match cache.get(&key).await {
            Ok(Some(rows)) => {
                debug!(unit = unit.index, rows = rows.len(), "Using checkpointed unit");
                return Ok(RawExtractionResult::extracted(unit, rows));
            }
            Ok(None) => {}
            Err(e) => warn!(unit = unit.index, error = %e, "Checkpoint read failed"),
        }

        let result = invoker.invoke(unit).await?;
        if !result.is_degraded() {
            if let Err(e) = cache.put(&key, result.rows()).await {
                warn!(unit = result.unit.index, error = %e, "Checkpoint write failed");
            }
        }
        Ok(result)
    }

    async fn clear_checkpoints(&self, document: &Document, schema: &Schema, plan: &SegmentPlan) {
        let Some(cache) = &self.cache else {
            return;
        };
        for unit in plan.units() {
            let key = checkpoint_key(document, schema, &self.config.model, &unit);
            if let Err(e) = cache.remove(&key).await {
                warn!(unit = unit.index, error = %e, "Failed to clear checkpoint");
            }
        }
    }

    fn transition(&mut self, next: JobState) {
        info!(job_id = %self.id, from = %self.state, to = %next, "Job state changed");
        self.state = next;
        self.transitions.push(next);
    }

    fn fail(&mut self, error: ExtractionError) -> JobFailure {
        let failed_in = self.state;
        warn!(
            job_id = %self.id,
            state = %failed_in,
            kind = %error.kind(),
            error = %error,
            "Extraction job failed"
        );
        self.transition(JobState::Failed);

        JobFailure {
            job_id: self.id,
            error,
            failed_in,
            transitions: std::mem::take(&mut self.transitions),
        }
    }
}
