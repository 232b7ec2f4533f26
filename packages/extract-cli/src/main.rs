//! PDF Table Extractor CLI
//!
//! Reads a PDF, asks a vision model for the rows of every table, and
//! writes them as one spreadsheet with the requested columns.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use table_extraction::{
    FileUnitCache, Job, JobOutput, JobRequest, LopdfRenderer, OpenAIVision, Preview,
    RateLimitedAI, VisionAI, DEFAULT_PREVIEW_ROWS,
};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "pdf-table-extract", version, about = "Extract tables from a PDF into a spreadsheet")]
struct Args {
    /// PDF to read
    pdf: PathBuf,

    /// Column names, comma separated or a JSON array
    #[arg(short, long)]
    columns: String,

    /// Extra guidance for the model
    #[arg(short, long)]
    instructions: Option<String>,

    /// Only process the first N pages
    #[arg(long)]
    sample_pages: Option<i64>,

    /// Output path (default: extracted_<stem>.xlsx)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Fail instead of writing an empty spreadsheet
    #[arg(long)]
    strict_empty: bool,

    /// Units in flight at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Pages per vision call
    #[arg(long)]
    unit_size: Option<usize>,

    /// Keep per-unit checkpoints here so an interrupted run can resume
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Print the first rows of the spreadsheet when done
    #[arg(long)]
    preview: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,table_extraction=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let args = Args::parse();
    let env = Config::from_env()?;

    let mut config = env.extraction_config().with_strict_empty(args.strict_empty);
    if let Some(limit) = args.concurrency {
        config = config.with_concurrency(limit);
    }
    if let Some(pages) = args.unit_size {
        config = config.with_unit_size(pages);
    }

    let request = JobRequest {
        document: tokio::fs::read(&args.pdf)
            .await
            .with_context(|| format!("Failed to read {}", args.pdf.display()))?,
        columns: parse_columns(&args.columns)?,
        instructions: args.instructions.clone(),
        sample_pages: args.sample_pages,
    };
    let sample_pages = request.sample_pages;

    // Rendering is synchronous and can be slow on large scans
    let prepare_config = config.clone();
    let prepared =
        tokio::task::spawn_blocking(move || request.prepare(&LopdfRenderer::new(), &prepare_config));
    let (document, schema) = tokio::select! {
        joined = prepared => joined
            .context("Document rendering task failed")?
            .map_err(|e| anyhow::anyhow!("{} ({})", e, e.kind()))?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted while rendering the document");
            anyhow::bail!("Interrupted before extraction started");
        }
    };

    info!(
        model = %env.credentials.model,
        api_key = %env.credentials.api_key.hint(),
        base_url = env.credentials.base_url.as_deref().unwrap_or("default"),
        "Using vision backend"
    );
    let vision = OpenAIVision::new(&env.credentials);
    let ai: Arc<dyn VisionAI> = match config.requests_per_second {
        Some(rps) => Arc::new(RateLimitedAI::new(vision, rps)),
        None => Arc::new(vision),
    };

    let mut job = Job::new(ai, config);
    if let Some(dir) = &args.checkpoint_dir {
        job = job.with_cache(Arc::new(FileUnitCache::new(dir)));
    }

    let cancel = job.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling job");
            cancel.cancel();
        }
    });

    println!(
        "{} {} ({} pages, {} columns)",
        "Extracting".bright_cyan().bold(),
        args.pdf.display(),
        document.page_count(),
        schema.len()
    );

    let output = match job.run(&document, &schema, sample_pages).await {
        Ok(output) => output,
        Err(failure) => {
            eprintln!(
                "{} [{}] {}",
                "Extraction failed".red().bold(),
                failure.error.kind(),
                failure.error
            );
            return Err(failure.into());
        }
    };

    let path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.pdf, output.artifact.mode().is_sample()));
    tokio::fs::write(&path, output.artifact.bytes())
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), bytes = output.artifact.len(), "Wrote spreadsheet");

    print_summary(&output, &path);
    if args.preview {
        let preview = output.artifact.preview(DEFAULT_PREVIEW_ROWS)?;
        print_preview(&preview);
    }

    Ok(())
}

/// Accept `a,b,c` or `["a","b","c"]`.
fn parse_columns(raw: &str) -> Result<Vec<String>> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("--columns is not a JSON array of strings");
    }
    Ok(trimmed
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect())
}

fn default_output_path(pdf: &Path, sample: bool) -> PathBuf {
    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let suffix = if sample { "_sample" } else { "" };
    PathBuf::from(format!("extracted_{}{}.xlsx", stem, suffix))
}

fn print_summary(output: &JobOutput, path: &Path) {
    let stats = &output.stats;
    println!();
    println!("{} {}", "Saved".bright_green().bold(), path.display());
    println!("  mode:        {}", stats.mode);
    println!("  rows:        {}", stats.total_rows);
    println!("  columns:     {}", stats.total_columns);
    println!("  filled:      {:.1}%", stats.non_empty_ratio * 100.0);
    println!("  units:       {}", stats.units_processed);
    if stats.duplicates_suppressed > 0 {
        println!("  duplicates:  {} suppressed", stats.duplicates_suppressed);
    }
    if stats.blank_rows_dropped > 0 {
        println!("  blank rows:  {} dropped", stats.blank_rows_dropped);
    }
    println!(
        "  elapsed:     {:.1}s",
        (output.finished_at - output.started_at).num_milliseconds() as f64 / 1000.0
    );

    if !stats.has_data {
        println!("{}", "No rows were extracted.".yellow());
    }
    for degraded in &output.degraded {
        println!(
            "{} {}: {:?}",
            "Skipped".yellow().bold(),
            degraded.unit,
            degraded.reason
        );
    }
}

fn print_preview(preview: &Preview) {
    const MAX_WIDTH: usize = 24;

    let widths: Vec<usize> = preview
        .header
        .iter()
        .enumerate()
        .map(|(i, name)| {
            preview
                .rows
                .iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
                .min(MAX_WIDTH)
        })
        .collect();

    let render = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| {
                let cell: String = cell.chars().take(*width).collect();
                format!("{:<width$}", cell, width = width)
            })
            .collect::<Vec<_>>()
            .join(" | ")
    };

    println!();
    println!("{}", render(&preview.header).bold());
    for row in &preview.rows {
        println!("{}", render(row));
    }
}
