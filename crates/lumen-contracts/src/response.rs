use serde_json::Value;

use crate::fields::MANDATORY_FIELD;

#[derive(Debug, thiserror::Error)]
pub enum ResponseParseError {
    #[error("{context} response was not valid JSON")]
    InvalidJson {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{context} response did not match the response schema")]
    SchemaMismatch {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{context} response was not {expected}")]
    UnexpectedShape {
        context: &'static str,
        expected: &'static str,
    },
    #[error("structured payload is missing a non-empty master_prompt")]
    MissingMasterPrompt,
}

/// Removes a surrounding Markdown code fence (optionally tagged `json`).
pub fn strip_code_fence(text: &str) -> String {
    let raw = text.trim();
    let Some(inner) = raw
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return raw.to_string();
    };
    // The opener line only carries the language tag.
    let body = match inner.split_once('\n') {
        Some((tag, rest)) if tag.trim().chars().all(|ch| ch.is_ascii_alphanumeric()) => rest,
        _ => inner,
    };
    body.trim().to_string()
}

pub(crate) fn parse_json_value(text: &str, context: &'static str) -> Result<Value, ResponseParseError> {
    serde_json::from_str(&strip_code_fence(text))
        .map_err(|source| ResponseParseError::InvalidJson { context, source })
}

/// Parses the selection stage's reply into raw field names.
///
/// A completely empty body falls back to `["master_prompt"]`.
pub fn parse_field_names(text: &str) -> Result<Vec<String>, ResponseParseError> {
    const CONTEXT: &str = "field selection";
    if text.trim().is_empty() {
        return Ok(vec![MANDATORY_FIELD.as_str().to_string()]);
    }
    let value = parse_json_value(text, CONTEXT)?;
    let Value::Array(rows) = value else {
        return Err(ResponseParseError::UnexpectedShape {
            context: CONTEXT,
            expected: "a JSON array of field names",
        });
    };
    rows.into_iter()
        .map(|row| match row {
            Value::String(name) => Ok(name),
            _ => Err(ResponseParseError::UnexpectedShape {
                context: CONTEXT,
                expected: "a JSON array of field names",
            }),
        })
        .collect()
}
