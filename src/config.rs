//! Configuration for the QA chain.

use serde::{Deserialize, Serialize};

/// Configuration for a single `answer_question` call.
///
/// A plain value object: the calling shell constructs it (from flags, a
/// config file, or `Default::default()`) and passes it in. The core never
/// reads environment variables itself. All fields are validated eagerly by
/// [`crate::guard::validate_config`] before any network call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    /// Chat model name. Must be on the allow-list enforced by
    /// `validate_config`.
    pub model: String,

    /// Sampling temperature, 0.0 to 2.0.
    pub temperature: f64,

    /// Maximum characters of context included in the prompt, 500 to 50000.
    /// Longer contexts are clipped on a sentence boundary.
    pub max_context_chars: usize,

    /// Gate calls through the sliding-window rate limiter.
    pub enable_rate_limiting: bool,

    /// Identifier the rate limiter buckets requests under (e.g. an IP
    /// address, user ID, or API key).
    pub rate_limit_identifier: String,

    /// Retry transient LLM failures with exponential backoff.
    pub enable_retry: bool,

    /// Total attempts including the first, 1 to 5.
    pub max_retry_attempts: u32,

    /// Base backoff delay in seconds.
    pub retry_base_delay: f64,

    /// Upper bound on a single backoff delay in seconds.
    pub retry_max_delay: f64,

    /// Multiplier applied to the delay per attempt, 1.5 to 3.0.
    pub retry_exponential_base: f64,

    /// Randomly shorten each delay by up to 25% to decorrelate
    /// simultaneous retries.
    pub retry_jitter: bool,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_context_chars: 6000,
            enable_rate_limiting: true,
            rate_limit_identifier: "default".to_string(),
            enable_retry: true,
            max_retry_attempts: 3,
            retry_base_delay: 1.0,
            retry_max_delay: 60.0,
            retry_exponential_base: 2.0,
            retry_jitter: true,
        }
    }
}
