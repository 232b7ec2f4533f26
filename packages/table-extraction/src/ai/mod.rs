//! Vision AI implementations.
//!
//! - `RateLimitedAI` - Wraps any backend with a request quota
//! - `OpenAIVision` - OpenAI chat completions with image inputs (feature `openai`)

#[cfg(feature = "openai")]
pub mod openai;
pub mod rate_limited;

#[cfg(feature = "openai")]
pub use openai::OpenAIVision;
pub use rate_limited::RateLimitedAI;
