//! Tolerant parsing of the model's reply.
//!
//! The model is told to answer with JSON but regularly wraps it in prose
//! ("Here is the data:") or Markdown fences. Parsing runs in two tiers:
//!
//! 1. **Strict**: the whole reply is JSON.
//! 2. **Recovery**: cut from the first `{` to the last `}` (greedy, across
//!    newlines) and parse that span alone.
//!
//! Recovery assumes the reply contains exactly one top-level object. Two
//! sibling objects in the prose make the span invalid JSON and the parse
//! fails; no attempt is made to pick one of them.

use crate::error::StageFailure;
use crate::output::{ExtractionResult, ParseMode};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Key under which a bare top-level JSON array is stored.
pub const RECORDS_KEY: &str = "records";

static RE_OBJECT_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// A successfully parsed reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub result: ExtractionResult,
    pub mode: ParseMode,
}

/// Interpret the model's reply as an [`ExtractionResult`].
pub fn parse_response(content: &str) -> Result<Parsed, StageFailure> {
    let content = content.trim();

    let strict_err = match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => {
            return Ok(Parsed {
                result: map.into(),
                mode: ParseMode::Strict,
            })
        }
        Ok(Value::Array(items)) => {
            debug!("Model returned a bare array of {} items", items.len());
            let mut map = Map::new();
            map.insert(RECORDS_KEY.to_string(), Value::Array(items));
            return Ok(Parsed {
                result: map.into(),
                mode: ParseMode::Strict,
            });
        }
        Ok(other) => format!("top-level JSON is not an object: {}", json_kind(&other)),
        Err(e) => e.to_string(),
    };

    warn!("Attempting to extract JSON from mixed text ({strict_err})");

    let Some(span) = RE_OBJECT_SPAN.find(content) else {
        warn!("Unable to extract valid JSON from response.");
        return Err(StageFailure::ParseFailed {
            detail: format!("no JSON object found; strict parse: {strict_err}"),
        });
    };

    match serde_json::from_str::<Map<String, Value>>(span.as_str()) {
        Ok(map) => Ok(Parsed {
            result: map.into(),
            mode: ParseMode::Recovered,
        }),
        Err(e) => {
            warn!("Unable to extract valid JSON from response: {e}");
            Err(StageFailure::ParseFailed {
                detail: format!("recovered span is not valid JSON: {e}"),
            })
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
