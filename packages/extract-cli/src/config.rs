use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

use table_extraction::{ExtractionConfig, VisionCredentials};

/// Settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: VisionCredentials,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub requests_per_second: Option<u32>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        let _ = dotenv();

        let credentials =
            VisionCredentials::from_env().context("OPENAI_API_KEY must be set to a non-empty key")?;

        Ok(Self {
            credentials,
            concurrency: parse_var("EXTRACT_CONCURRENCY")?,
            timeout_secs: parse_var("EXTRACT_TIMEOUT_SECS")?,
            max_retries: parse_var("EXTRACT_MAX_RETRIES")?,
            requests_per_second: parse_var("EXTRACT_REQUESTS_PER_SECOND")?,
        })
    }

    /// Pipeline settings with environment overrides applied.
    pub fn extraction_config(&self) -> ExtractionConfig {
        let mut config = ExtractionConfig::default().with_model(&self.credentials.model);
        if let Some(limit) = self.concurrency {
            config = config.with_concurrency(limit);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_job_timeout(std::time::Duration::from_secs(secs));
        }
        if let Some(retries) = self.max_retries {
            config = config.with_max_retries(retries);
        }
        if let Some(rps) = self.requests_per_second {
            config = config.with_requests_per_second(rps);
        }
        config
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a valid number", name)),
        Err(_) => Ok(None),
    }
}
