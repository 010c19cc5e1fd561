//! Prompt construction for context-grounded answering.

/// Exact answer the model must return when the context does not contain
/// the answer. Callers can compare against this to detect the
/// "not in context" outcome.
pub const FALLBACK_ANSWER: &str = "I don't know based on the provided context.";

/// Prompt template instructing the model to answer strictly from the
/// supplied context.
const PROMPT_TEMPLATE: &str = r#"You are a careful assistant. Use ONLY the provided context to answer the user's question. If the answer cannot be determined from the context, reply exactly: '{fallback}'

Context:
{context}

Question: {question}

Answer concisely and directly:"#;

/// Builds the full prompt for a normalized question and clipped context.
#[must_use]
pub fn build_prompt(question: &str, context: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{fallback}", FALLBACK_ANSWER)
        .replace("{question}", question)
        .replace("{context}", context)
}
