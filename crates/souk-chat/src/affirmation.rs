//! Affirmation check for the confirmation gate.
//!
//! A deliberately simple allowlist of literal phrases, evaluated against
//! the immediately preceding user message. This is a heuristic, not NLU:
//! it lives in one small unit so a structured confirm action can replace
//! it without touching the dispatcher's gate.

/// Phrases that, on their own, count as an explicit go-ahead.
const AFFIRMATIVE_PHRASES: &[&str] = &[
    "yes",
    "yes please",
    "yep",
    "yeah",
    "confirm",
    "confirmed",
    "i confirm",
    "submit",
    "submit it",
    "send",
    "send it",
    "go ahead",
    "do it",
    "please do",
    "ok",
    "okay",
    "sure",
    "sounds good",
];

/// True if the literal message is an explicit affirmation.
///
/// Matching is case-insensitive, ignores surrounding whitespace and
/// trailing punctuation, and accepts either an exact allowlisted phrase
/// or a message that opens with one followed by a word break ("yes,
/// send it to them"). "yesterday" does not open with "yes" at a word
/// break and therefore does not match.
pub fn is_affirmative(message: &str) -> bool {
    let normalized = normalize(message);
    if normalized.is_empty() {
        return false;
    }

    AFFIRMATIVE_PHRASES.iter().any(|phrase| {
        normalized == *phrase
            || (normalized.starts_with(phrase)
                && normalized[phrase.len()..]
                    .chars()
                    .next()
                    .is_some_and(|c| !c.is_alphanumeric()))
    })
}

/// Lowercase, trim, and strip trailing punctuation.
fn normalize(message: &str) -> String {
    message
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | '!' | '?' | ','))
        .trim()
        .to_lowercase()
}
