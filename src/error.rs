//! Error types for the run.
//!
//! `ContentError` covers the generator side (transport + structured parsing),
//! `GameError` is what a stage handler can hand back to the turn controller.
//! Locally recoverable conditions (bad ordinal, unknown enum text) have their
//! own small types so call sites decide between fallback and propagation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
  #[error("generator HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("generator transport error: {0}")]
  Transport(String),
  /// Structured parse failed even after substring recovery.
  #[error("malformed content from generator")]
  Malformed { raw: String },
}

impl ContentError {
  /// Raw generator text attached to a malformed payload, if any.
  pub fn raw(&self) -> Option<&str> {
    match self {
      ContentError::Malformed { raw } => Some(raw),
      _ => None,
    }
  }
}

#[derive(Debug, Error)]
pub enum GameError {
  #[error("malformed content from generator: {}", crate::util::trunc_for_log(raw, 200))]
  MalformedContent { raw: String },
  #[error("content generation failed: {0}")]
  Generator(String),
  #[error("player input closed")]
  InputClosed,
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("snapshot encoding error: {0}")]
  Snapshot(#[from] serde_json::Error),
}

impl From<ContentError> for GameError {
  fn from(e: ContentError) -> Self {
    match e {
      ContentError::Malformed { raw } => GameError::MalformedContent { raw },
      other => GameError::Generator(other.to_string()),
    }
  }
}

/// Rejected ordinal selection. Recovered by re-prompting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
  #[error("empty selection")]
  Empty,
  #[error("selection {input:?} is outside 1..={max}")]
  OutOfRange { input: String, max: usize },
}

/// A generated or classified value outside its known enumeration.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized {kind}: {value:?}")]
pub struct UnrecognizedValue {
  pub kind: &'static str,
  pub value: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn malformed_content_keeps_raw_text_across_conversion() {
    let e = ContentError::Malformed { raw: "not json at all".into() };
    assert_eq!(e.raw(), Some("not json at all"));
    match GameError::from(e) {
      GameError::MalformedContent { raw } => assert_eq!(raw, "not json at all"),
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn transport_errors_become_generator_errors() {
    let e = ContentError::Http { status: 401, message: "bad key".into() };
    let g = GameError::from(e);
    assert!(matches!(g, GameError::Generator(ref m) if m.contains("401") && m.contains("bad key")));
  }
}
