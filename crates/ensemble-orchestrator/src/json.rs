//! Defensive extraction of JSON payloads from model replies.
//!
//! Router classification and supervisor decomposition ask the model for
//! JSON, but replies routinely wrap it in prose or code fences. These
//! helpers pull out the first JSON object/array substring and parse it;
//! callers treat a `None` as a parse failure and take their documented
//! fallback path, never an error.

use regex::Regex;

/// Extracts and parses the first `{...}` substring, if any.
pub(crate) fn first_json_object(text: &str) -> Option<serde_json::Value> {
    extract(text, r"\{[\s\S]*\}", r"\{[\s\S]*?\}")
}

/// Extracts and parses the first `[...]` substring, if any.
pub(crate) fn first_json_array(text: &str) -> Option<serde_json::Value> {
    extract(text, r"\[[\s\S]*\]", r"\[[\s\S]*?\]")
}

// Greedy first (handles nested delimiters), then the shortest match as a
// fallback when trailing prose breaks the greedy candidate.
fn extract(text: &str, greedy: &str, lazy: &str) -> Option<serde_json::Value> {
    for pattern in [greedy, lazy] {
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        if let Some(candidate) = re.find(text) {
            if let Ok(value) = serde_json::from_str(candidate.as_str()) {
                return Some(value);
            }
        }
    }
    None
}
