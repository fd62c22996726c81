//! Structured record extraction from free-form generator text.
//!
//! Models tend to wrap a valid JSON object in chatter ("Sure, here it is: ...").
//! We try the whole text first, then the span between the first `{` and the
//! last `}`. Anything recovered here is still untrusted and goes through shape
//! validation before it can affect scoring.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ContentError;
use crate::util::trunc_for_log;

pub type Record = Map<String, Value>;

/// Parse `raw` into a JSON object, recovering from surrounding prose.
pub fn parse_record(raw: &str) -> Result<Record, ContentError> {
  if let Some(rec) = as_object(raw.trim()) {
    return Ok(rec);
  }

  if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
    if end > start {
      if let Some(rec) = as_object(&raw[start..=end]) {
        debug!(target: "content", start, end, "recovered record from surrounding text");
        return Ok(rec);
      }
    }
  }

  debug!(target: "content", raw = %trunc_for_log(raw, 120), "no structured record found");
  Err(ContentError::Malformed { raw: raw.to_string() })
}

fn as_object(s: &str) -> Option<Record> {
  match serde_json::from_str::<Value>(s) {
    Ok(Value::Object(m)) => Some(m),
    _ => None,
  }
}

/// Field accessors that tolerate the usual model sloppiness.
pub trait RecordExt {
  /// Trimmed string value; numbers and bools are stringified.
  fn text(&self, key: &str) -> Option<String>;
  /// Integer value from a JSON number (rounded) or a numeric string.
  fn int(&self, key: &str) -> Option<i32>;
  /// List of non-empty trimmed strings; a scalar is treated as a one-element list.
  fn text_list(&self, key: &str) -> Vec<String>;
}

impl RecordExt for Record {
  fn text(&self, key: &str) -> Option<String> {
    scalar_text(self.get(key)?).filter(|s| !s.is_empty())
  }

  fn int(&self, key: &str) -> Option<i32> {
    match self.get(key)? {
      Value::Number(n) => n
        .as_i64()
        .or_else(|| n.as_f64().map(|f| f.round() as i64))
        .and_then(|v| i32::try_from(v).ok()),
      Value::String(s) => s.trim().trim_start_matches('+').parse::<i32>().ok(),
      _ => None,
    }
  }

  fn text_list(&self, key: &str) -> Vec<String> {
    match self.get(key) {
      Some(Value::Array(items)) => items.iter().filter_map(scalar_text).filter(|s| !s.is_empty()).collect(),
      Some(v) => scalar_text(v).filter(|s| !s.is_empty()).into_iter().collect(),
      None => Vec::new(),
    }
  }
}

fn scalar_text(v: &Value) -> Option<String> {
  match v {
    Value::String(s) => Some(s.trim().to_string()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}
