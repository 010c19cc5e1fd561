/// OpenAI-compatible HTTP client implementation.
///
/// This module provides `OpenAiClient` for making blocking chat-completion
/// requests against an OpenAI-style API, along with error types and a
/// builder pattern for configuration. The surrounding application owns
/// credentials and endpoint selection; the pipeline only sees the
/// `LlmClient` trait.
use std::time::Duration;

use thiserror::Error;

/// Default API endpoint. Override via the builder (or `OPENAI_BASE_URL`)
/// for enterprise-gateway deployments.
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Default per-request timeout. Expiry surfaces as a retriable
/// `LlmError::Timeout`.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Error messages that indicate transient upstream conditions.
const RETRIABLE_MESSAGES: [&str; 8] = [
    "rate limit",
    "timeout",
    "connection",
    "temporarily unavailable",
    "service unavailable",
    "bad gateway",
    "gateway timeout",
    "too many requests",
];

/// Errors that can occur when calling the LLM API.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// HTTP errors with status code
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// API-specific errors (unexpected response shape, server-reported
    /// failures)
    #[error("LLM API error: {message}")]
    Api { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Missing or malformed credentials
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl LlmError {
    /// Returns true for failures worth re-attempting: transport errors,
    /// throttling and server-side statuses (429/5xx), or API messages
    /// describing a transient condition. Everything else is fatal.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Http { status } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::Api { message } => {
                let message = message.to_lowercase();
                RETRIABLE_MESSAGES.iter().any(|m| message.contains(m))
            }
            Self::Serialization(_) | Self::InvalidUrl(_) | Self::Auth(_) => false,
        }
    }
}

/// Trait for LLM client operations.
///
/// This trait enables mocking in unit tests and keeps the pipeline
/// agnostic of transport: the surrounding application injects whichever
/// implementation (direct API, gateway, stub) fits its deployment.
pub trait LlmClient: Send + Sync {
    /// Generates a completion for `prompt` using the given model and
    /// sampling temperature.
    ///
    /// # Errors
    ///
    /// Returns `LlmError` on network failure, non-success HTTP status, or
    /// an unexpected response shape.
    fn generate(&self, model: &str, prompt: &str, temperature: f64) -> Result<String, LlmError>;
}

/// Builder for constructing `OpenAiClient` instances.
///
/// # Examples
///
/// ```no_run
/// use qa_chain::llm::OpenAiClientBuilder;
///
/// let client = OpenAiClientBuilder::new()
///     .api_key("sk-0123456789abcdefghij")
///     .build()
///     .expect("Failed to create client");
/// ```
#[derive(Debug, Default)]
pub struct OpenAiClientBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout: Option<Duration>,
}

impl OpenAiClientBuilder {
    /// Creates a new `OpenAiClientBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL for the API.
    ///
    /// # Arguments
    ///
    /// * `url` - The base URL (e.g., "https://gateway.example.com")
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the API key used for bearer authentication.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the per-request timeout for completion calls.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the `OpenAiClient` with the configured settings.
    ///
    /// # Environment Variables
    ///
    /// If `base_url()` was not called, this method will check the
    /// `OPENAI_BASE_URL` environment variable, defaulting to the public
    /// API endpoint. If `api_key()` was not called, it will check
    /// `OPENAI_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Auth` when no API key is available or the key is
    /// malformed, `LlmError::InvalidUrl` when the base URL does not parse,
    /// and `LlmError::Network` if the HTTP client cannot be constructed.
    pub fn build(self) -> Result<OpenAiClient, LlmError> {
        let base_url = if let Some(url) = self.base_url {
            url
        } else {
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
        };

        let api_key = match self.api_key {
            Some(key) => key,
            None => std::env::var("OPENAI_API_KEY").map_err(|_| {
                LlmError::Auth("no API key provided and OPENAI_API_KEY is not set".to_string())
            })?,
        };

        // Reject obviously malformed keys before the first request.
        if api_key.len() < 10
            || !api_key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(LlmError::Auth("API key appears to be invalid".to_string()));
        }

        reqwest::Url::parse(&base_url)
            .map_err(|e| LlmError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(LlmError::Network)?;

        Ok(OpenAiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

/// Blocking HTTP client for OpenAI-compatible chat-completion APIs.
///
/// Construct using `OpenAiClientBuilder`. One client per process is
/// enough; it is `Send + Sync` and holds its own connection pool.
pub struct OpenAiClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    /// Returns the base URL configured for this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn classify_transport_error(error: reqwest::Error) -> LlmError {
        if error.is_timeout() {
            LlmError::Timeout(error)
        } else {
            LlmError::Network(error)
        }
    }

    fn generate_internal(
        &self,
        model: &str,
        prompt: &str,
        temperature: f64,
    ) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request_body = serde_json::json!({
            "model": model,
            "temperature": temperature,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .map_err(Self::classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Http {
                status: status.as_u16(),
            });
        }

        let json: serde_json::Value = response.json().map_err(Self::classify_transport_error)?;

        // Extract the assistant message from the first choice
        json.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| LlmError::Api {
                message: "Missing 'choices[0].message.content' in API response".to_string(),
            })
    }
}

impl LlmClient for OpenAiClient {
    fn generate(&self, model: &str, prompt: &str, temperature: f64) -> Result<String, LlmError> {
        self.generate_internal(model, prompt, temperature)
    }
}
