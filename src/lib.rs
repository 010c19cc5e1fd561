//! Context-grounded question answering over a hosted language model.
//!
//! The crate is the request-processing core behind a QA service: input
//! validation, Unicode normalization, sentence-aware context clipping,
//! sliding-window rate limiting, prompt construction, the LLM invocation
//! with exponential-backoff retry, and output sanitization. The
//! surrounding application (CLI, HTTP handler) supplies the inputs and an
//! [`LlmClient`]; the crate returns a plain answer string or a typed
//! [`QaError`].
//!
//! # Examples
//!
//! ```no_run
//! use qa_chain::answer_question;
//!
//! # fn main() -> Result<(), qa_chain::QaError> {
//! // Requires OPENAI_API_KEY in the environment.
//! let answer = answer_question(
//!     "What is the capital of France?",
//!     "Paris is the capital of France.",
//!     None,
//! )?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod guard;
pub mod llm;
pub mod preprocess;
pub mod prompt;
pub mod rate_limit;
pub mod retry;

pub use chain::{QaChain, QaChainBuilder, answer_question};
pub use config::QaConfig;
pub use error::QaError;
pub use llm::{LlmClient, LlmError, OpenAiClient, OpenAiClientBuilder};
pub use prompt::FALLBACK_ANSWER;
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;
