//! Shared retry policy for outbound HTTP calls.
//!
//! Every remote adapter (embeddings, chat, vector store, action gateway)
//! classifies failures the same way:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors, including timeouts → retry
//!
//! Backoff doubles from `base` on each attempt, capped at 2^5 × `base`.

use reqwest::StatusCode;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base: Duration) -> Self {
        Self { max_retries, base }
    }

    /// Attempt once, never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base: Duration::ZERO,
        }
    }

    /// Delay before `attempt` (0 is the first try and has no delay).
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        self.base * (1u32 << (attempt - 1).min(5))
    }

    pub async fn wait(&self, attempt: u32) {
        let delay = self.delay(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

pub fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
