//! Extraction of the JSON document embedded in a model's text reply.
//!
//! Models are asked for bare JSON but commonly wrap it in a Markdown fence or
//! surround it with a sentence of prose. The parser accepts:
//!
//! - bare JSON,
//! - JSON inside a ```` ```json ```` or ```` ``` ```` fence (closed or not),
//! - a single JSON object or array embedded in prose.
//!
//! Anything else, including truncated JSON, is an error.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseParseError {
    #[error("AI response was empty")]
    Empty,

    #[error("AI response contained no JSON document")]
    NoJson,

    #[error("AI response JSON is malformed: {0}")]
    Malformed(String),
}

impl From<ResponseParseError> for AppError {
    fn from(err: ResponseParseError) -> Self {
        AppError::UpstreamAIError(err.to_string())
    }
}

/// A JSON value that may be a single item or an array of items.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text.trim();
    };

    let after = &text[open + 3..];
    // Language tag such as `json`
    let tag_len = after
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(after.len());
    let body = &after[tag_len..];
    let end = body.find("```").unwrap_or(body.len());

    body[..end].trim()
}

/// Slice from the first `{`/`[` to the last matching closer.
fn outermost_json_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}

/// Parse the JSON document in a model reply into `T`.
pub fn parse_ai_json<T: DeserializeOwned>(text: &str) -> Result<T, ResponseParseError> {
    if text.trim().is_empty() {
        return Err(ResponseParseError::Empty);
    }

    let candidate = strip_code_fences(text);

    let first_error = match serde_json::from_str::<T>(candidate) {
        Ok(value) => return Ok(value),
        // The whole candidate is JSON, just the wrong shape: no point looking further
        Err(e) if e.is_data() && serde_json::from_str::<serde_json::Value>(candidate).is_ok() => {
            return Err(ResponseParseError::Malformed(e.to_string()));
        }
        Err(e) => e,
    };

    if !candidate.contains(['{', '[']) {
        return Err(ResponseParseError::NoJson);
    }

    match outermost_json_span(candidate) {
        Some(span) if span.len() < candidate.len() => serde_json::from_str::<T>(span)
            .map_err(|e| ResponseParseError::Malformed(e.to_string())),
        _ => Err(ResponseParseError::Malformed(first_error.to_string())),
    }
}
