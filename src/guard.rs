//! Input validation and output sanitization guardrails.
//!
//! Validation runs before any cost is incurred: length limits, a model
//! allow-list, configuration ranges, and a fixed table of blocked content
//! patterns (script tags, inline event handlers, prompt-injection
//! phrasings). Sanitization scrubs model output of HTML-like tags,
//! `javascript:` URIs, and secret-shaped substrings.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::QaConfig;
use crate::error::QaError;

/// Maximum characters in a question.
pub const MAX_QUESTION_CHARS: usize = 1000;

/// Maximum characters in a context passage.
pub const MAX_CONTEXT_CHARS: usize = 50_000;

/// Replacement for secret-shaped substrings in model output.
const REDACTION_MARKER: &str = "[REDACTED]";

/// Chat models the pipeline is willing to invoke.
const ALLOWED_MODELS: [&str; 7] = [
    "gpt-3.5-turbo",
    "gpt-3.5-turbo-16k",
    "gpt-4",
    "gpt-4-32k",
    "gpt-4-turbo-preview",
    "gpt-4o",
    "gpt-4o-mini",
];

// Matching is case-insensitive and spans newlines: injected content is
// often multi-line.
static BLOCKED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // Markup injection attempts
        Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap(),
        Regex::new(r"(?i)javascript:").unwrap(),
        Regex::new(r"(?i)\bon\w+\s*=").unwrap(),
        // Prompt injection phrasings
        Regex::new(r"(?is)ignore\s+(previous|above|all)\s+(instructions|prompts?)").unwrap(),
        Regex::new(r"(?i)system\s*:\s*").unwrap(),
        Regex::new(r"(?i)assistant\s*:\s*").unwrap(),
        Regex::new(r"(?i)###\s*(instruction|system)").unwrap(),
    ]
});

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

static JS_URI_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)javascript:").unwrap());

static SECRET_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // API-key-shaped tokens
        Regex::new(r"sk-[a-zA-Z0-9]{20,}").unwrap(),
        // Bare 32-character hex strings
        Regex::new(r"\b[a-f0-9]{32}\b").unwrap(),
        // key/value pairs naming a credential
        Regex::new(r#"(?i)(password|token|secret|key)\s*[:=]\s*['"]?[^'"\s]+['"]?"#).unwrap(),
    ]
});

/// Validates user inputs before any processing.
///
/// # Errors
///
/// Returns `QaError::Validation` if the question is blank or longer than
/// [`MAX_QUESTION_CHARS`], the context is blank or longer than
/// [`MAX_CONTEXT_CHARS`], or either input matches a blocked content
/// pattern.
pub fn validate_input(question: &str, context: &str) -> Result<(), QaError> {
    if question.trim().is_empty() {
        return Err(QaError::Validation("Question is too short".to_string()));
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        return Err(QaError::Validation(format!(
            "Question exceeds maximum length of {MAX_QUESTION_CHARS} characters"
        )));
    }
    if context.trim().is_empty() {
        return Err(QaError::Validation("Context is empty".to_string()));
    }
    if context.chars().count() > MAX_CONTEXT_CHARS {
        return Err(QaError::Validation(format!(
            "Context exceeds maximum length of {MAX_CONTEXT_CHARS} characters"
        )));
    }

    let combined = format!("{question} {context}").to_lowercase();
    if BLOCKED_PATTERNS.iter().any(|p| p.is_match(&combined)) {
        return Err(QaError::Validation(
            "Input contains blocked content patterns".to_string(),
        ));
    }

    Ok(())
}

/// Validates configuration before any processing.
///
/// # Errors
///
/// Returns `QaError::Validation` if the model is not allow-listed or a
/// numeric knob is outside its documented range.
pub fn validate_config(config: &QaConfig) -> Result<(), QaError> {
    if !ALLOWED_MODELS.contains(&config.model.as_str()) {
        return Err(QaError::Validation(format!(
            "Model '{}' is not in allowed list",
            config.model
        )));
    }
    if !(0.0..=2.0).contains(&config.temperature) {
        return Err(QaError::Validation(
            "Temperature must be between 0 and 2".to_string(),
        ));
    }
    if !(500..=MAX_CONTEXT_CHARS).contains(&config.max_context_chars) {
        return Err(QaError::Validation(format!(
            "max_context_chars must be between 500 and {MAX_CONTEXT_CHARS}"
        )));
    }
    if !(1..=5).contains(&config.max_retry_attempts) {
        return Err(QaError::Validation(
            "max_retry_attempts must be between 1 and 5".to_string(),
        ));
    }
    if !(1.5..=3.0).contains(&config.retry_exponential_base) {
        return Err(QaError::Validation(
            "retry_exponential_base must be between 1.5 and 3.0".to_string(),
        ));
    }
    if !config.retry_base_delay.is_finite() || config.retry_base_delay < 0.0 {
        return Err(QaError::Validation(
            "retry_base_delay must be a non-negative number of seconds".to_string(),
        ));
    }
    if !config.retry_max_delay.is_finite() || config.retry_max_delay < 0.0 {
        return Err(QaError::Validation(
            "retry_max_delay must be a non-negative number of seconds".to_string(),
        ));
    }

    Ok(())
}

/// Scrubs model output before it reaches the caller.
///
/// Strips HTML-tag-like substrings, removes `javascript:` URI prefixes,
/// and replaces secret-shaped substrings with [`REDACTION_MARKER`]. Never
/// fails; clean input comes back unchanged apart from trimming.
#[must_use]
pub fn sanitize_output(output: &str) -> String {
    let without_tags = TAG_PATTERN.replace_all(output, "");
    let mut sanitized = JS_URI_PATTERN.replace_all(&without_tags, "").into_owned();

    for pattern in SECRET_PATTERNS.iter() {
        sanitized = pattern.replace_all(&sanitized, REDACTION_MARKER).into_owned();
    }

    sanitized.trim().to_string()
}
