//! Rate-limited vision wrapper.
//!
//! Wraps any [`VisionAI`] with a governor quota so concurrent units
//! don't exceed a provider's request rate.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::UpstreamResult;
use crate::traits::ai::{VisionAI, VisionRequest};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A vision backend that waits for a permit before every call.
pub struct RateLimitedAI<A> {
    inner: A,
    limiter: Arc<DefaultRateLimiter>,
}

impl<A: VisionAI> RateLimitedAI<A> {
    /// Allow at most `requests_per_second` calls. Zero is treated as one.
    ///
    /// Governor's per-second quota lets a full second's worth of calls
    /// through at once; use [`RateLimitedAI::with_burst`] to space them.
    pub fn new(inner: A, requests_per_second: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self::with_quota(inner, Quota::per_second(rate))
    }

    /// Sustained rate with a burst allowance.
    pub fn with_burst(inner: A, requests_per_second: u32, burst: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        Self::with_quota(inner, Quota::per_second(rate).allow_burst(burst))
    }

    pub fn with_quota(inner: A, quota: Quota) -> Self {
        Self {
            inner,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

#[async_trait]
impl<A: VisionAI> VisionAI for RateLimitedAI<A> {
    async fn complete(&self, request: &VisionRequest) -> UpstreamResult<String> {
        self.limiter.until_ready().await;
        self.inner.complete(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockVisionAI;
    use serde_json::json;
    use std::time::Instant;

    fn request(unit_index: usize) -> VisionRequest {
        VisionRequest {
            unit_index,
            prompt: "extract".into(),
            images: vec![],
            page_text: None,
            response_schema: json!({}),
        }
    }

    #[tokio::test]
    async fn test_passes_through() {
        let ai = RateLimitedAI::new(MockVisionAI::new().with_response(0, "{\"ok\":1}"), 100);
        assert_eq!(ai.complete(&request(0)).await.unwrap(), "{\"ok\":1}");
        assert_eq!(ai.inner().call_count(0), 1);
    }

    #[tokio::test]
    async fn test_zero_rate_is_clamped() {
        let ai = RateLimitedAI::new(MockVisionAI::new(), 0);
        assert!(ai.complete(&request(0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_quota_spaces_calls() {
        let ai = RateLimitedAI::with_burst(MockVisionAI::new(), 10, 1);
        let start = Instant::now();
        for i in 0..3 {
            ai.complete(&request(i)).await.unwrap();
        }
        // First call is immediate, the next two wait ~100ms each
        assert!(start.elapsed().as_millis() >= 150);
    }
}
