//! Structured data embedded in free-form completion text
//!
//! Completion output is untyped input. It is parsed, then validated by the
//! caller; nothing downstream trusts its shape by construction.

use serde::de::DeserializeOwned;
use thiserror::Error;

const EXCERPT_CHARS: usize = 120;

/// Completion text did not contain the expected structure
#[derive(Debug, Error)]
#[error("{message} (text starts: {excerpt:?})")]
pub struct StructuredOutputError {
    pub message: String,
    pub excerpt: String,
}

/// Remove markdown code-fence markup and surrounding whitespace
///
/// # Examples
///
/// ```
/// use aeth_cal::utils::strip_code_fences;
///
/// assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
/// ```
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Parse completion text into `T`
///
/// Tries the fence-stripped text first, then the outermost `{...}` span to
/// tolerate prose around the object.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, StructuredOutputError> {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return Err(StructuredOutputError {
            message: "Completion text is empty".to_string(),
            excerpt: String::new(),
        });
    }

    let first_error = match serde_json::from_str::<T>(&cleaned) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end && (start > 0 || end + 1 < cleaned.len()) {
            if let Ok(value) = serde_json::from_str::<T>(&cleaned[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(StructuredOutputError {
        message: first_error.to_string(),
        excerpt: cleaned.chars().take(EXCERPT_CHARS).collect(),
    })
}
