//! OpenAI vision backend.

use std::time::Duration;

use async_trait::async_trait;
use openai_client::{ChatRequest, ContentPart, Message, OpenAIClient, OpenAIError, ResponseFormat};
use tracing::debug;

use crate::error::{UpstreamError, UpstreamResult};
use crate::security::VisionCredentials;
use crate::traits::ai::{VisionAI, VisionRequest};

const TEMPERATURE: f32 = 0.05;
const MAX_OUTPUT_TOKENS: u32 = 4000;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const SCHEMA_NAME: &str = "table_rows";

/// Vision extraction through the OpenAI chat completions API.
#[derive(Clone)]
pub struct OpenAIVision {
    client: OpenAIClient,
    model: String,
    blank_key: bool,
}

impl OpenAIVision {
    pub fn new(credentials: &VisionCredentials) -> Self {
        Self::with_timeout(credentials, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Per-request timeout; a timeout counts as a transient failure.
    pub fn with_timeout(credentials: &VisionCredentials, timeout: Duration) -> Self {
        let mut client = OpenAIClient::with_timeout(credentials.api_key.expose(), timeout);
        if let Some(url) = &credentials.base_url {
            client = client.with_base_url(url);
        }
        Self {
            client,
            model: credentials.model.clone(),
            blank_key: credentials.api_key.is_blank(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, request: &VisionRequest) -> ChatRequest {
        let mut parts = vec![ContentPart::text(&request.prompt)];
        if let Some(text) = &request.page_text {
            parts.push(ContentPart::text(format!(
                "Text layer of the page(s), use it where the image is missing or unclear:\n{}",
                text
            )));
        }
        parts.extend(request.images.iter().map(|png| ContentPart::image_png(png)));

        ChatRequest::new(&self.model)
            .message(Message::user_parts(parts))
            .temperature(TEMPERATURE)
            .token_limit(MAX_OUTPUT_TOKENS)
            .response_format(ResponseFormat::json_schema(
                SCHEMA_NAME,
                request.response_schema.clone(),
            ))
    }
}

#[async_trait]
impl VisionAI for OpenAIVision {
    async fn complete(&self, request: &VisionRequest) -> UpstreamResult<String> {
        if self.blank_key {
            return Err(UpstreamError::Fatal("OpenAI API key is not set".into()));
        }

        let response = self
            .client
            .chat_completion(self.build_request(request))
            .await
            .map_err(classify)?;

        debug!(
            unit = request.unit_index,
            finish_reason = ?response.finish_reason,
            prompt_tokens = response.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens = response.usage.as_ref().map(|u| u.completion_tokens),
            "Vision call completed"
        );

        if response.content.trim().is_empty() {
            return Err(UpstreamError::Malformed("empty response body".into()));
        }
        Ok(response.content)
    }
}

/// Map a client failure onto retry / degrade / abort.
fn classify(err: OpenAIError) -> UpstreamError {
    if err.is_transient() {
        return UpstreamError::Transient(err.to_string());
    }
    match &err {
        OpenAIError::Parse(_) => UpstreamError::Malformed(err.to_string()),
        OpenAIError::Api { status, .. } if matches!(status, 400 | 413 | 422) => {
            UpstreamError::Malformed(err.to_string())
        }
        _ => UpstreamError::Fatal(err.to_string()),
    }
}
