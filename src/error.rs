//! Error taxonomy for the QA pipeline.
//!
//! One closed set of variants so callers can pattern-match the outcome of a
//! request: fix the input (`Validation`), slow down (`RateLimited`), try
//! later (`RetryExhausted`), or treat as unexpected (`Client`).

use std::time::Duration;

use thiserror::Error;

use crate::llm::LlmError;

/// Errors surfaced by the QA pipeline.
#[derive(Debug, Error)]
pub enum QaError {
    /// Input or configuration violated a static constraint (length,
    /// allow-list, range, blocked pattern). Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Admission refused by the rate limiter. Carries the time until the
    /// oldest tracked request leaves the window.
    #[error("Rate limit exceeded. Please retry after {:.1} seconds.", .retry_after.as_secs_f64())]
    RateLimited {
        /// How long the caller should wait before retrying.
        retry_after: Duration,
    },

    /// A transient upstream failure persisted through every retry attempt.
    #[error("LLM call failed after {attempts} attempts")]
    RetryExhausted {
        /// Number of attempts made, including the first.
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        source: LlmError,
    },

    /// A non-retriable failure from the LLM client (auth failure, malformed
    /// request, bad response shape). Propagated unchanged.
    #[error(transparent)]
    Client(#[from] LlmError),
}
