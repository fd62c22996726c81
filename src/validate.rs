//! Answer validation: the sanity filter for generated reference answers, the
//! lenient matcher for player answers, and the shape check for generated
//! option lists.

use std::collections::HashSet;

use serde_json::Value;

use crate::domain::ChoiceOption;
use crate::parse::{Record, RecordExt};
use crate::scoring::{HpBounds, ScoringEngine};
use crate::util::{is_cjk, strip_whitespace};

/// Characters at least one of which shows up in any real kinship title.
pub const KINSHIP_ROOTS: &[char] = &[
  '公', '婆', '姑', '舅', '姨', '伯', '叔', '堂', '表', '外', '丈', '嫂', '姪', '孫', '曾', '玄',
];

const MAX_TITLE_CHARS: usize = 4;

/// Number of options a generated list must provide.
pub const OPTION_COUNT: usize = 3;

/// Accept a generated reference answer only if it is 1–4 Han characters and
/// contains a kinship root.
pub fn is_reasonable_kinship_answer(ans: &str) -> bool {
  let ans = ans.trim();
  let len = ans.chars().count();
  (1..=MAX_TITLE_CHARS).contains(&len)
    && ans.chars().all(is_cjk)
    && ans.chars().any(|c| KINSHIP_ROOTS.contains(&c))
}

/// Bidirectional containment after whitespace removal.
pub fn answer_matches(player: &str, canonical: &[String]) -> bool {
  let p = strip_whitespace(player);
  if p.is_empty() {
    return false;
  }
  canonical
    .iter()
    .map(|c| strip_whitespace(c))
    .filter(|c| !c.is_empty())
    .any(|c| p == c || p.contains(c.as_str()) || c.contains(p.as_str()))
}

/// Why a generated option list was refused.
#[derive(Debug, PartialEq, Eq)]
pub enum ShapeError {
  NotAList,
  TooFew(usize),
  MissingField { index: usize, field: &'static str },
  DuplicateTitle(String),
}

/// Shape-check a generated option list under `key` and bound its deltas.
/// Extra entries beyond the first three are ignored.
pub fn validate_options(
  record: &Record,
  key: &str,
  scoring: &ScoringEngine<'_>,
  bounds: HpBounds,
) -> Result<Vec<ChoiceOption>, ShapeError> {
  let Some(Value::Array(items)) = record.get(key) else {
    return Err(ShapeError::NotAList);
  };
  if items.len() < OPTION_COUNT {
    return Err(ShapeError::TooFew(items.len()));
  }

  let mut seen = HashSet::new();
  let mut out = Vec::with_capacity(OPTION_COUNT);
  for (index, item) in items.iter().take(OPTION_COUNT).enumerate() {
    let Value::Object(obj) = item else {
      return Err(ShapeError::MissingField { index, field: "title" });
    };
    let title = obj.text("title").ok_or(ShapeError::MissingField { index, field: "title" })?;
    let description = obj.text("description").ok_or(ShapeError::MissingField { index, field: "description" })?;
    let raw_hp = obj.int("hidden_hp").ok_or(ShapeError::MissingField { index, field: "hidden_hp" })?;
    let tag = obj.text("tag").ok_or(ShapeError::MissingField { index, field: "tag" })?;
    if !seen.insert(title.clone()) {
      return Err(ShapeError::DuplicateTitle(title));
    }
    out.push(ChoiceOption {
      title,
      description,
      hp_change: scoring.bounded(bounds, raw_hp),
      tag,
      keyword: None,
      note: None,
      flavour: None,
    });
  }
  Ok(out)
}
