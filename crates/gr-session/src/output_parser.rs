//! Strict structural validation of raw backend payloads.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::shape::{ExpectedShape, FieldKind};

/// Any deviation of a payload from its expected shape.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedResponse {
    #[error("Response is empty")]
    Empty,

    #[error("Response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("Field '{field}' expected {expected}, got {actual}")]
    WrongType {
        field: String,
        expected: FieldKind,
        actual: &'static str,
    },

    #[error("Unexpected field '{0}'")]
    UnexpectedField(String),
}

/// Parse `raw` and check it against `shape`.
///
/// A single surrounding Markdown code fence is tolerated; any other text
/// around the JSON object is not. Optional fields may be absent or null.
/// A required field must be present and non-null, except `any`, which
/// accepts a present null.
pub fn validate(raw: &str, shape: &ExpectedShape) -> Result<Value, MalformedResponse> {
    let body = strip_code_fence(raw.trim());
    if body.is_empty() {
        return Err(MalformedResponse::Empty);
    }

    let value: Value =
        serde_json::from_str(body).map_err(|e| MalformedResponse::InvalidJson(e.to_string()))?;
    let Value::Object(object) = &value else {
        return Err(MalformedResponse::NotAnObject(json_type(&value)));
    };

    check_fields(object, shape)?;
    Ok(value)
}

fn check_fields(object: &Map<String, Value>, shape: &ExpectedShape) -> Result<(), MalformedResponse> {
    for field in shape.fields() {
        match object.get(&field.name) {
            None if field.required => {
                return Err(MalformedResponse::MissingField(field.name.clone()));
            }
            // A required `any` field is satisfied by an explicit null.
            Some(Value::Null) if field.required && field.kind != FieldKind::Any => {
                return Err(MalformedResponse::MissingField(field.name.clone()));
            }
            None | Some(Value::Null) => {}
            Some(value) if !field.kind.matches(value) => {
                return Err(MalformedResponse::WrongType {
                    field: field.name.clone(),
                    expected: field.kind,
                    actual: json_type(value),
                });
            }
            Some(_) => {}
        }
    }

    if !shape.allows_extra_fields() {
        if let Some(extra) = object.keys().find(|key| shape.get(key).is_none()) {
            return Err(MalformedResponse::UnexpectedField(extra.clone()));
        }
    }
    Ok(())
}

fn fence_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?s)\A```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n?```\z").ok())
        .as_ref()
}

fn strip_code_fence(text: &str) -> &str {
    fence_pattern()
        .and_then(|pattern| pattern.captures(text))
        .and_then(|captures| captures.get(1))
        .map(|inner| inner.as_str().trim())
        .unwrap_or(text)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
