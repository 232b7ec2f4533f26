//! Pure OpenAI REST API client
//!
//! A clean, minimal client for the OpenAI chat completions API with no
//! domain-specific logic. Supports text and image (vision) inputs and
//! JSON-constrained outputs.
//!
//! # Example
//!
//! ```rust,ignore
//! use openai_client::{ChatRequest, ContentPart, Message, OpenAIClient, ResponseFormat};
//!
//! let client = OpenAIClient::from_env()?;
//!
//! let response = client
//!     .chat_completion(
//!         ChatRequest::new("gpt-4o")
//!             .message(Message::user_parts(vec![
//!                 ContentPart::text("List every row of the table on this page as JSON"),
//!                 ContentPart::image_png(&page_png),
//!             ]))
//!             .response_format(ResponseFormat::json_object()),
//!     )
//!     .await?;
//! ```

pub mod error;
pub mod types;

pub use error::{OpenAIError, Result};
pub use types::*;

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_LOGGED_ERROR_BYTES: usize = 500;

/// Pure OpenAI API client.
#[derive(Clone)]
pub struct OpenAIClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIClient {
    /// Create a new OpenAI client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT)
    }

    /// Create a client whose requests give up after `timeout`.
    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http_client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from environment variable `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| OpenAIError::Config("OPENAI_API_KEY not set".into()))?;
        Ok(Self::new(api_key))
    }

    /// Set a custom base URL (for Azure, proxies, etc.).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Get the API key.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Chat completion.
    ///
    /// Send messages to the chat completion API and get a response.
    pub async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse> {
        if self.api_key.trim().is_empty() {
            return Err(OpenAIError::Config("API key is empty".into()));
        }

        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "OpenAI request failed");
                transport_error(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(
                status = %status,
                error = %truncate_to_char_boundary(&error_text, MAX_LOGGED_ERROR_BYTES),
                "OpenAI API error"
            );
            return Err(OpenAIError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        // Read the body first so a stalled or cut-off stream is not
        // reported as a parse failure
        let body = response.bytes().await.map_err(|e| {
            warn!(error = %e, "OpenAI response body failed");
            transport_error(e)
        })?;
        let chat_response: types::ChatResponseRaw =
            serde_json::from_slice(&body).map_err(|e| OpenAIError::Parse(e.to_string()))?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| OpenAIError::Parse("No choices in OpenAI response".into()))?;

        let content = match (choice.message.content, choice.message.refusal) {
            (Some(content), _) => content,
            (None, Some(refusal)) => {
                return Err(OpenAIError::Parse(format!("Model refused: {}", refusal)))
            }
            (None, None) => return Err(OpenAIError::Parse("Empty message content".into())),
        };

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis(),
            finish_reason = ?choice.finish_reason,
            "OpenAI chat completion"
        );

        Ok(ChatResponse {
            content,
            finish_reason: choice.finish_reason,
            usage: chat_response.usage,
        })
    }
}

fn transport_error(e: reqwest::Error) -> OpenAIError {
    if e.is_timeout() {
        OpenAIError::Timeout(e.to_string())
    } else {
        OpenAIError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned response, then keep the socket open for `hold`.
    async fn serve_once(response: &'static [u8], hold: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            socket.write_all(response).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(hold).await;
        });

        format!("http://{}", addr)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            let Some(header_end) = text.find("\r\n\r\n") else {
                continue;
            };
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                return;
            }
        }
    }

    fn request() -> ChatRequest {
        ChatRequest::new("gpt-4o").message(Message::user("hi"))
    }

    #[tokio::test]
    async fn test_stalled_body_is_timeout() {
        let base = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 1000\r\n\r\n{\"choi",
            Duration::from_secs(5),
        )
        .await;
        let client = OpenAIClient::with_timeout("sk-test", Duration::from_millis(300)).with_base_url(base);

        let err = client.chat_completion(request()).await.unwrap_err();
        assert!(matches!(err, OpenAIError::Timeout(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_cut_off_body_is_network_error() {
        let base = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 1000\r\n\r\n{\"choi",
            Duration::ZERO,
        )
        .await;
        let client = OpenAIClient::with_timeout("sk-test", Duration::from_secs(5)).with_base_url(base);

        let err = client.chat_completion(request()).await.unwrap_err();
        assert!(matches!(err, OpenAIError::Network(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_invalid_json_body_is_parse_error() {
        let base = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 8\r\nConnection: close\r\n\r\nnot json",
            Duration::ZERO,
        )
        .await;
        let client = OpenAIClient::with_timeout("sk-test", Duration::from_secs(5)).with_base_url(base);

        let err = client.chat_completion(request()).await.unwrap_err();
        assert!(matches!(err, OpenAIError::Parse(_)), "got {:?}", err);
    }

    #[test]
    fn test_client_builder() {
        let client = OpenAIClient::new("sk-test").with_base_url("https://custom.api.com/");

        assert_eq!(client.api_key, "sk-test");
        assert_eq!(client.base_url, "https://custom.api.com");
    }

    #[tokio::test]
    async fn test_empty_key_is_config_error() {
        let client = OpenAIClient::new("  ");
        let err = client
            .chat_completion(ChatRequest::new("gpt-4o").message(Message::user("hi")))
            .await
            .unwrap_err();

        assert!(matches!(err, OpenAIError::Config(_)));
    }
}
