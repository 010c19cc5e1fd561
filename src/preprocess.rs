//! Input preprocessing: Unicode normalization and context clipping.
//!
//! Both functions are pure text transformations applied before prompt
//! construction. Lengths are counted in characters, not bytes, so clipping
//! never splits a multi-byte code point.

use tracing::debug;
use unicode_normalization::UnicodeNormalization;

/// How far back from the truncation point to search for a sentence
/// boundary when clipping. Boundaries further back than this are ignored
/// and the whitespace fallback applies instead.
const SENTENCE_LOOKBACK_CHARS: usize = 200;

/// Canonicalizes free text for prompt inclusion.
///
/// Applies NFKC normalization, maps curly quotes and en/em dashes to their
/// ASCII equivalents, collapses whitespace runs (including newlines and
/// tabs) to single spaces, and trims the ends.
///
/// Idempotent: `normalize_text(normalize_text(s)) == normalize_text(s)`.
///
/// # Examples
///
/// ```
/// use qa_chain::preprocess::normalize_text;
///
/// assert_eq!(normalize_text("  hello\n\tworld  "), "hello world");
/// assert_eq!(normalize_text("\u{201c}quoted\u{201d}"), "\"quoted\"");
/// ```
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let mapped: String = text
        .nfkc()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201c}' | '\u{201d}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            other => other,
        })
        .collect();

    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Bounds `context` to `max_chars` characters, preferring a clean cut.
///
/// Short input is returned unchanged. Otherwise the text is truncated to
/// `max_chars` characters and the cut point is moved backward to the
/// rightmost sentence terminator (`.`, `!`, `?`) followed by whitespace or
/// the truncation point itself, searching at most
/// `SENTENCE_LOOKBACK_CHARS` characters back. When no terminator
/// qualifies, the cut falls back to the nearest preceding whitespace, and
/// failing that stays at `max_chars`.
///
/// The result never exceeds `max_chars` characters. Empty input yields an
/// empty string.
#[must_use]
pub fn clip_context(context: &str, max_chars: usize) -> String {
    let char_count = context.chars().count();
    if char_count <= max_chars {
        return context.to_string();
    }

    debug!(original_chars = char_count, max_chars, "clipping context");
    let clipped: Vec<char> = context.chars().take(max_chars).collect();

    // Rightmost qualifying terminator wins when several fall in the window.
    let lookback_start = clipped.len().saturating_sub(SENTENCE_LOOKBACK_CHARS);
    for i in (lookback_start..clipped.len()).rev() {
        let terminal = matches!(clipped[i], '.' | '!' | '?');
        let at_boundary = i + 1 == clipped.len() || clipped[i + 1].is_whitespace();
        if terminal && at_boundary {
            return clipped[..=i].iter().collect();
        }
    }

    if let Some(cut) = clipped.iter().rposition(|c| c.is_whitespace()) {
        return clipped[..cut].iter().collect();
    }

    clipped.into_iter().collect()
}
