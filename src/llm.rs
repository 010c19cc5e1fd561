/// LLM client module.
///
/// This module provides the client trait the pipeline invokes the language
/// model through, the error taxonomy with retriability classification, and
/// a blocking HTTP implementation for OpenAI-compatible chat APIs.
mod client;

pub use client::{LlmClient, LlmError, OpenAiClient, OpenAiClientBuilder};
