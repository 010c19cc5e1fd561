//! Pipeline orchestration for context-grounded question answering.
//!
//! This module provides the `QaChain` struct which composes validation,
//! rate limiting, preprocessing, prompt construction, the LLM invocation
//! with retry, and output sanitization around an injected [`LlmClient`].

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::config::QaConfig;
use crate::error::QaError;
use crate::guard;
use crate::llm::{LlmClient, OpenAiClientBuilder};
use crate::preprocess::{clip_context, normalize_text};
use crate::prompt::build_prompt;
use crate::rate_limit::{RateLimiter, default_limiter};
use crate::retry::RetryPolicy;

/// Builder for constructing `QaChain` instances.
#[derive(Default)]
pub struct QaChainBuilder {
    client: Option<Arc<dyn LlmClient>>,
    limiter: Option<Arc<RateLimiter>>,
}

impl QaChainBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the LLM client to use.
    pub fn client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the rate limiter gating invocations.
    ///
    /// Defaults to the process-wide limiter; tests and multi-tenant
    /// deployments pass their own instance.
    pub fn limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Builds the `QaChain`.
    ///
    /// # Panics
    ///
    /// Panics if `client()` was not called.
    #[must_use]
    pub fn build(self) -> QaChain {
        QaChain {
            client: self.client.expect("client must be set via client() method"),
            limiter: self.limiter.unwrap_or_else(default_limiter),
        }
    }
}

/// Answers natural-language questions using only a supplied context
/// passage.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use qa_chain::chain::QaChainBuilder;
/// use qa_chain::llm::OpenAiClientBuilder;
///
/// # fn example() -> Result<(), qa_chain::QaError> {
/// let client = OpenAiClientBuilder::new()
///     .api_key("sk-0123456789abcdefghij")
///     .build()?;
///
/// let chain = QaChainBuilder::new()
///     .client(Arc::new(client))
///     .build();
///
/// let answer = chain.answer_question(
///     "What is the capital of France?",
///     "Paris is the capital of France.",
///     None,
/// )?;
/// println!("{answer}");
/// # Ok(())
/// # }
/// ```
pub struct QaChain {
    client: Arc<dyn LlmClient>,
    limiter: Arc<RateLimiter>,
}

impl QaChain {
    /// Creates a new `QaChain` with the specified client and the
    /// process-wide rate limiter.
    #[must_use]
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            limiter: default_limiter(),
        }
    }

    /// Answers `question` using only the supplied `context`.
    ///
    /// Steps, in order, each able to short-circuit with a distinct error:
    /// resolve the config, validate config and inputs, rate-limit
    /// admission (when enabled), normalize both texts and clip the context
    /// to `max_context_chars`, build the prompt, invoke the model (wrapped
    /// in the retry policy when enabled), sanitize the raw output.
    ///
    /// Returns the sanitized answer. When the answer is not determinable
    /// from the context, the model is instructed to reply with
    /// [`crate::prompt::FALLBACK_ANSWER`] exactly.
    ///
    /// # Errors
    ///
    /// * `QaError::Validation` - input or config violates a constraint
    /// * `QaError::RateLimited` - admission refused, with retry-after hint
    /// * `QaError::RetryExhausted` - transient upstream failures persisted
    ///   through every attempt
    /// * `QaError::Client` - non-retriable client failure
    pub fn answer_question(
        &self,
        question: &str,
        context: &str,
        config: Option<QaConfig>,
    ) -> Result<String, QaError> {
        let config = config.unwrap_or_default();
        let started = Instant::now();
        info!(
            question_length = question.chars().count(),
            context_length = context.chars().count(),
            model = %config.model,
            "processing question"
        );

        guard::validate_config(&config)?;
        guard::validate_input(question, context)?;

        if config.enable_rate_limiting {
            self.limiter.try_acquire(&config.rate_limit_identifier)?;
        }

        let question = normalize_text(question);
        let context = clip_context(&normalize_text(context), config.max_context_chars);
        let prompt = build_prompt(&question, &context);

        debug!(prompt_length = prompt.chars().count(), "invoking LLM");
        let raw = if config.enable_retry {
            RetryPolicy::from_config(&config)
                .run(|| self.client.generate(&config.model, &prompt, config.temperature))?
        } else {
            self.client
                .generate(&config.model, &prompt, config.temperature)?
        };

        let answer = guard::sanitize_output(&raw);
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            answer_length = answer.chars().count(),
            "question answered"
        );
        Ok(answer)
    }
}

/// Answers a question with a client built from the environment and the
/// process-wide rate limiter.
///
/// Convenience entry point for shells that do not inject their own client;
/// requires `OPENAI_API_KEY` to be set. Applications that need an explicit
/// client, limiter, or mock should construct a [`QaChain`] instead.
///
/// # Errors
///
/// Everything [`QaChain::answer_question`] returns, plus `QaError::Client`
/// when the environment-based client cannot be constructed.
pub fn answer_question(
    question: &str,
    context: &str,
    config: Option<QaConfig>,
) -> Result<String, QaError> {
    let client = OpenAiClientBuilder::new().build()?;
    QaChainBuilder::new()
        .client(Arc::new(client))
        .build()
        .answer_question(question, context, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockLlmClient {
        response: String,
        calls: AtomicUsize,
    }

    impl MockLlmClient {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl LlmClient for MockLlmClient {
        fn generate(
            &self,
            _model: &str,
            _prompt: &str,
            _temperature: f64,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn test_chain(client: Arc<MockLlmClient>) -> QaChain {
        QaChainBuilder::new()
            .client(client)
            .limiter(Arc::new(RateLimiter::new(100, Duration::from_secs(60))))
            .build()
    }

    #[test]
    fn answers_question_with_mock_client() {
        let client = Arc::new(MockLlmClient::new("Paris."));
        let chain = test_chain(Arc::clone(&client));

        let answer = chain
            .answer_question(
                "What is the capital of France?",
                "Paris is the capital of France.",
                None,
            )
            .unwrap();

        assert_eq!(answer, "Paris.");
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn invalid_config_fails_before_client_is_invoked() {
        let client = Arc::new(MockLlmClient::new("unused"));
        let chain = test_chain(Arc::clone(&client));
        let config = QaConfig {
            model: "not-a-model".to_string(),
            ..QaConfig::default()
        };

        let result = chain.answer_question("q?", "some context", Some(config));

        assert!(matches!(result, Err(QaError::Validation(_))));
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn invalid_input_fails_before_client_is_invoked() {
        let client = Arc::new(MockLlmClient::new("unused"));
        let chain = test_chain(Arc::clone(&client));

        let result = chain.answer_question("", "some context", None);

        assert!(matches!(result, Err(QaError::Validation(_))));
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn rate_limit_refusal_fails_before_client_is_invoked() {
        let client = Arc::new(MockLlmClient::new("Paris."));
        let chain = QaChainBuilder::new()
            .client(Arc::clone(&client) as Arc<dyn LlmClient>)
            .limiter(Arc::new(RateLimiter::new(1, Duration::from_secs(60))))
            .build();

        assert!(
            chain
                .answer_question("q?", "Paris is the capital.", None)
                .is_ok()
        );
        let result = chain.answer_question("q?", "Paris is the capital.", None);

        assert!(matches!(result, Err(QaError::RateLimited { .. })));
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn rate_limiting_can_be_disabled() {
        let client = Arc::new(MockLlmClient::new("Paris."));
        let chain = QaChainBuilder::new()
            .client(Arc::clone(&client) as Arc<dyn LlmClient>)
            .limiter(Arc::new(RateLimiter::new(1, Duration::from_secs(60))))
            .build();
        let config = QaConfig {
            enable_rate_limiting: false,
            ..QaConfig::default()
        };

        for _ in 0..3 {
            assert!(
                chain
                    .answer_question("q?", "Paris is the capital.", Some(config.clone()))
                    .is_ok()
            );
        }
        assert_eq!(client.calls(), 3);
    }

    #[test]
    fn model_output_is_sanitized() {
        let client = Arc::new(MockLlmClient::new(
            "  Paris. <script>alert(1)</script>  ",
        ));
        let chain = test_chain(client);

        let answer = chain
            .answer_question("q?", "Paris is the capital.", None)
            .unwrap();

        assert!(!answer.contains("<script>"));
        assert!(answer.starts_with("Paris."));
    }

    #[test]
    fn disabled_retry_invokes_client_exactly_once() {
        struct FailingClient {
            calls: AtomicUsize,
        }

        impl LlmClient for FailingClient {
            fn generate(
                &self,
                _model: &str,
                _prompt: &str,
                _temperature: f64,
            ) -> Result<String, LlmError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Err(LlmError::Http { status: 503 })
            }
        }

        let client = Arc::new(FailingClient {
            calls: AtomicUsize::new(0),
        });
        let chain = QaChainBuilder::new()
            .client(Arc::clone(&client) as Arc<dyn LlmClient>)
            .limiter(Arc::new(RateLimiter::new(100, Duration::from_secs(60))))
            .build();
        let config = QaConfig {
            enable_retry: false,
            ..QaConfig::default()
        };

        let result = chain.answer_question("q?", "some context.", Some(config));

        assert!(matches!(
            result,
            Err(QaError::Client(LlmError::Http { status: 503 }))
        ));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn context_is_clipped_before_prompt_construction() {
        struct PromptCapture {
            max_context_chars: usize,
        }

        impl LlmClient for PromptCapture {
            fn generate(
                &self,
                _model: &str,
                prompt: &str,
                _temperature: f64,
            ) -> Result<String, LlmError> {
                // The oversized context must not survive clipping.
                assert!(prompt.chars().count() < self.max_context_chars + 500);
                Ok("ok".to_string())
            }
        }

        let chain = QaChainBuilder::new()
            .client(Arc::new(PromptCapture {
                max_context_chars: 500,
            }))
            .limiter(Arc::new(RateLimiter::new(100, Duration::from_secs(60))))
            .build();
        let config = QaConfig {
            max_context_chars: 500,
            ..QaConfig::default()
        };
        let context = format!("Sentence one. {}", "filler text ".repeat(200));

        let answer = chain.answer_question("q?", &context, Some(config)).unwrap();
        assert_eq!(answer, "ok");
    }
}
