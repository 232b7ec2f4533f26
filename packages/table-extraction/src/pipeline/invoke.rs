//! Extraction invoker: one vision call per unit, with retry and
//! failure classification.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ExtractionError, Result, UpstreamError};
use crate::pipeline::parse::parse_response;
use crate::pipeline::prompts::{format_extract_prompt, response_schema};
use crate::traits::ai::{VisionAI, VisionRequest};
use crate::types::{
    config::ExtractionConfig,
    document::Document,
    schema::Schema,
    table::Row,
    unit::{DegradedReason, ExtractionUnit, RawExtractionResult},
};

/// Issues vision calls for units of one document under one schema.
///
/// The prompt and response schema are built once and shared by every
/// call. Each `invoke` touches only its own unit, so calls can run
/// concurrently.
pub struct Invoker<'a, A: ?Sized> {
    ai: &'a A,
    document: &'a Document,
    schema: &'a Schema,
    config: &'a ExtractionConfig,
    prompt: String,
    response_schema: Value,
}

impl<'a, A: VisionAI + ?Sized> Invoker<'a, A> {
    pub fn new(
        ai: &'a A,
        document: &'a Document,
        schema: &'a Schema,
        config: &'a ExtractionConfig,
    ) -> Self {
        Self {
            ai,
            document,
            schema,
            config,
            prompt: format_extract_prompt(schema),
            response_schema: response_schema(schema),
        }
    }

    /// Run one unit.
    ///
    /// Transient faults are retried with exponential backoff and degrade
    /// the unit once retries run out. Malformed responses degrade the unit
    /// without a retry. Only a fatal upstream error returns `Err`.
    pub async fn invoke(&self, unit: ExtractionUnit) -> Result<RawExtractionResult> {
        let Some(request) = self.build_request(&unit) else {
            debug!(unit = unit.index, "Unit has no page content, skipping vision call");
            return Ok(RawExtractionResult::extracted(unit, Vec::new()));
        };

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.ai.complete(&request).await {
                Ok(text) => return Ok(self.read_response(unit, &text)),
                Err(UpstreamError::Transient(message)) => {
                    if attempt > self.config.max_retries {
                        warn!(
                            unit = unit.index,
                            attempts = attempt,
                            error = %message,
                            "Retries exhausted, degrading unit"
                        );
                        return Ok(RawExtractionResult::degraded(
                            unit,
                            DegradedReason::TransientExhausted {
                                attempts: attempt,
                                last_error: message,
                            },
                        ));
                    }
                    let delay = self.config.backoff_for(attempt);
                    debug!(
                        unit = unit.index,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Transient upstream error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(UpstreamError::Malformed(detail)) => {
                    warn!(unit = unit.index, error = %detail, "Upstream rejected unit, degrading");
                    return Ok(RawExtractionResult::degraded(
                        unit,
                        DegradedReason::MalformedResponse { detail },
                    ));
                }
                Err(UpstreamError::Fatal(message)) => {
                    return Err(ExtractionError::FatalUpstream {
                        unit: unit.index,
                        message,
                    });
                }
            }
        }
    }

    fn build_request(&self, unit: &ExtractionUnit) -> Option<VisionRequest> {
        let pages: Vec<_> = unit
            .pages
            .clone()
            .filter_map(|index| self.document.page(index))
            .collect();

        let images: Vec<_> = pages.iter().filter_map(|p| p.image.clone()).collect();
        let texts: Vec<&str> = pages.iter().filter_map(|p| p.text.as_deref()).collect();

        if images.is_empty() && texts.is_empty() {
            return None;
        }

        Some(VisionRequest {
            unit_index: unit.index,
            prompt: self.prompt.clone(),
            images,
            page_text: (!texts.is_empty()).then(|| texts.join("\n\n")),
            response_schema: self.response_schema.clone(),
        })
    }

    fn read_response(&self, unit: ExtractionUnit, text: &str) -> RawExtractionResult {
        let parsed = match parse_response(text, self.schema) {
            Ok(parsed) => parsed,
            Err(detail) => {
                warn!(unit = unit.index, error = %detail, "Malformed response, degrading unit");
                return RawExtractionResult::degraded(
                    unit,
                    DegradedReason::MalformedResponse { detail },
                );
            }
        };

        let rows: Vec<Row> = parsed
            .rows
            .iter()
            .map(|raw| Row::coerce(raw, self.schema))
            .collect();

        if let Some(reported) = parsed.total_rows {
            if reported as usize != rows.len() {
                debug!(
                    unit = unit.index,
                    reported,
                    parsed = rows.len(),
                    "Model row count differs from rows returned"
                );
            }
        }

        debug!(
            unit = unit.index,
            rows = rows.len(),
            salvaged = parsed.salvaged,
            confidence = parsed.confidence.as_deref().unwrap_or("unknown"),
            notes = parsed.notes.as_deref().unwrap_or(""),
            "Unit extracted"
        );

        RawExtractionResult::extracted(unit, rows)
    }
}
