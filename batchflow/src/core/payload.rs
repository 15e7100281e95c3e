//! Tolerant payload parsing for unreliable text output.
//!
//! External resources frequently wrap structured output in prose or
//! markdown fences. [`parse_payload`] tries a fixed sequence of
//! recovery strategies and, when all of them fail, returns an explicit
//! [`ParsedPayload::Degraded`] value instead of a silently empty
//! placeholder, so downstream consumers can always tell recovered
//! output from genuine output.

use serde_json::Value;

/// The outcome of parsing raw text into a structured payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedPayload {
    /// A strategy produced valid JSON.
    Json(Value),
    /// Every strategy failed; the raw text is preserved alongside the
    /// per-strategy parse errors.
    Degraded {
        /// The original text, untouched.
        raw: String,
        /// One parse error per attempted strategy.
        errors: Vec<String>,
    },
}

impl ParsedPayload {
    /// Returns `true` if no strategy produced valid JSON.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// The parsed JSON, if any strategy succeeded.
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Degraded { .. } => None,
        }
    }

    /// Converts into a payload value suitable for a task result.
    ///
    /// Degraded payloads become a tagged object rather than the raw
    /// text, so they remain distinguishable after storage.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Degraded { raw, errors } => serde_json::json!({
                "degraded": true,
                "raw": raw,
                "errors": errors,
            }),
        }
    }
}

/// Parses raw text into JSON using a fixed sequence of strategies:
/// the whole text, then the first fenced code block, then the outermost
/// braced or bracketed span.
#[must_use]
pub fn parse_payload(raw: &str) -> ParsedPayload {
    let mut errors = Vec::new();

    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value) => return ParsedPayload::Json(value),
        Err(err) => errors.push(format!("direct: {err}")),
    }

    if let Some(fenced) = extract_fenced(raw) {
        match serde_json::from_str::<Value>(fenced.trim()) {
            Ok(value) => return ParsedPayload::Json(value),
            Err(err) => errors.push(format!("fenced: {err}")),
        }
    }

    if let Some(braced) = extract_braced(raw) {
        match serde_json::from_str::<Value>(braced) {
            Ok(value) => return ParsedPayload::Json(value),
            Err(err) => errors.push(format!("braced: {err}")),
        }
    }

    ParsedPayload::Degraded {
        raw: raw.to_string(),
        errors,
    }
}

/// Extracts the body of the first fenced code block, skipping any
/// language tag on the opening fence.
fn extract_fenced(raw: &str) -> Option<&str> {
    let start = raw.find("```")?;
    let after_fence = &raw[start + 3..];
    let body_start = after_fence.find('\n')?;
    let body = &after_fence[body_start + 1..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// Extracts the span from the first `{` or `[` to the matching last
/// closing delimiter.
fn extract_braced(raw: &str) -> Option<&str> {
    let start = raw.find(['{', '['])?;
    let close = if raw.as_bytes()[start] == b'{' { '}' } else { ']' };
    let end = raw.rfind(close)?;
    (end > start).then(|| &raw[start..=end])
}
