//! Domain models: game state, per-stage records, options, questions and the
//! small enumerations that scoring depends on.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::UnrecognizedValue;
use crate::notes::NoteLedger;

pub const INITIAL_HP: u32 = 100;

/// Terminal flag recorded in the snapshot. `None` on the state means no
/// explicit ending (still running, or an ambiguous exit).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndFlag {
  Win,
  Lose,
}

/// The whole mutable state of one run. Owned by the turn controller and
/// handed to stage handlers by `&mut`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameState {
  pub run_id: Uuid,
  pub world_seed: u64,
  pub hp: u32,
  pub turn: u32,
  pub notes: NoteLedger,
  pub logs: Vec<StageRecord>,
  pub end_flag: Option<EndFlag>,
}

impl GameState {
  pub fn new(world_seed: u64) -> Self {
    Self {
      run_id: Uuid::new_v4(),
      world_seed,
      hp: INITIAL_HP,
      turn: 1,
      notes: NoteLedger::new(),
      logs: Vec::new(),
      end_flag: None,
    }
  }

  /// `hp = max(0, hp + delta)`. Returns the new hp.
  pub fn apply_delta(&mut self, delta: i32) -> u32 {
    let next = (i64::from(self.hp) + i64::from(delta)).clamp(0, i64::from(u32::MAX));
    self.hp = next as u32;
    self.hp
  }

  pub fn is_depleted(&self) -> bool {
    self.hp == 0
  }
}

/// One resolved stage. Appended once, never touched again.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StageRecord {
  pub turn: u32,
  pub stage: String,
  pub choice: String,
  pub hp_change: i32,
  pub hp_after: u32,
  pub note: String,
  pub tag: String,
  #[serde(flatten)]
  pub detail: StageDetail,
}

/// Stage-specific fields carried next to the common record columns.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageDetail {
  Choice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
  },
  Interrogation {
    question: String,
    difficulty: Difficulty,
    answer_style: AnswerStyle,
  },
  Kinship {
    question: String,
    correct_answers: Vec<String>,
    difficulty: Difficulty,
    is_correct: bool,
  },
}

/// A fixed-choice entry (stages 1–5), either configured or generated.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChoiceOption {
  pub title: String,
  #[serde(default)]
  pub description: String,
  pub hp_change: i32,
  pub tag: String,
  /// Extra accepted spelling besides the ordinal (e.g. "female").
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub keyword: Option<String>,
  /// Fixed note for stages that skip outcome narration.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub note: Option<String>,
  /// Flavour text printed right after the choice.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub flavour: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Low,
  #[default]
  Medium,
  High,
  Extreme,
}

impl Difficulty {
  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Low => "low",
      Difficulty::Medium => "medium",
      Difficulty::High => "high",
      Difficulty::Extreme => "extreme",
    }
  }

  /// Case-insensitive parse of generated difficulty text.
  pub fn parse(raw: &str) -> Result<Self, UnrecognizedValue> {
    match raw.trim().to_lowercase().as_str() {
      "low" => Ok(Difficulty::Low),
      "medium" => Ok(Difficulty::Medium),
      "high" => Ok(Difficulty::High),
      "extreme" => Ok(Difficulty::Extreme),
      _ => Err(UnrecognizedValue { kind: "difficulty", value: raw.to_string() }),
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// How a reply to the new-year interrogation came across.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStyle {
  Balanced,
  Bragging,
  TooHumble,
  Defensive,
  Refuse,
  Other,
}

impl AnswerStyle {
  pub fn as_str(&self) -> &'static str {
    match self {
      AnswerStyle::Balanced => "balanced",
      AnswerStyle::Bragging => "bragging",
      AnswerStyle::TooHumble => "too_humble",
      AnswerStyle::Defensive => "defensive",
      AnswerStyle::Refuse => "refuse",
      AnswerStyle::Other => "other",
    }
  }

  pub fn parse(raw: &str) -> Result<Self, UnrecognizedValue> {
    match raw.trim().to_lowercase().as_str() {
      "balanced" => Ok(AnswerStyle::Balanced),
      "bragging" => Ok(AnswerStyle::Bragging),
      "too_humble" => Ok(AnswerStyle::TooHumble),
      "defensive" => Ok(AnswerStyle::Defensive),
      "refuse" => Ok(AnswerStyle::Refuse),
      "other" => Ok(AnswerStyle::Other),
      _ => Err(UnrecognizedValue { kind: "answer style", value: raw.to_string() }),
    }
  }

  /// Only a balanced reply counts as on-target.
  pub fn is_on_target(&self) -> bool {
    matches!(self, AnswerStyle::Balanced)
  }
}

impl fmt::Display for AnswerStyle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Where a piece of stage content came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentSource {
  Generated,
  Fallback,
}

/// A generated (or fallback) question. `answers` is empty for the
/// interrogation stage, which judges style instead of content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedQuestion {
  pub question: String,
  pub difficulty: Difficulty,
  pub answers: Vec<String>,
  pub source: ContentSource,
}

/// Narrated result of a stage: story text + one note.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
  pub result: String,
  pub note: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hp_is_clamped_at_zero() {
    let mut s = GameState::new(1);
    assert_eq!(s.apply_delta(-30), 70);
    assert_eq!(s.apply_delta(-10_000), 0);
    assert!(s.is_depleted());
    assert_eq!(s.apply_delta(5), 5);
  }

  #[test]
  fn hp_after_matches_max_zero_formula() {
    for start in [0_i32, 1, 35, 100] {
      for d in [-101, -65, -1, 0, 1, 7, 20] {
        let mut s = GameState::new(1);
        s.hp = start as u32;
        let after = s.apply_delta(d);
        assert_eq!(after as i32, (start + d).max(0), "start={start} d={d}");
      }
    }
  }

  #[test]
  fn difficulty_parse_is_lenient_on_case_and_space() {
    assert_eq!(Difficulty::parse(" HIGH "), Ok(Difficulty::High));
    let err = Difficulty::parse("nightmare").unwrap_err();
    assert_eq!(err.kind, "difficulty");
    assert_eq!(Difficulty::default(), Difficulty::Medium);
  }

  #[test]
  fn answer_style_parse_and_target() {
    assert_eq!(AnswerStyle::parse("Too_Humble"), Ok(AnswerStyle::TooHumble));
    assert!(AnswerStyle::parse("sarcastic").is_err());
    assert!(AnswerStyle::Balanced.is_on_target());
    assert!(!AnswerStyle::Refuse.is_on_target());
  }

  #[test]
  fn record_flattens_stage_detail() {
    let rec = StageRecord {
      turn: 7,
      stage: "kinship".into(),
      choice: "丈公".into(),
      hp_change: 7,
      hp_after: 50,
      note: "n".into(),
      tag: "kinship_correct_extreme".into(),
      detail: StageDetail::Kinship {
        question: "q".into(),
        correct_answers: vec!["丈公".into()],
        difficulty: Difficulty::Extreme,
        is_correct: true,
      },
    };
    let v = serde_json::to_value(&rec).unwrap();
    assert_eq!(v["kind"], "kinship");
    assert_eq!(v["difficulty"], "extreme");
    assert_eq!(v["is_correct"], true);
    let back: StageRecord = serde_json::from_value(v).unwrap();
    assert_eq!(back, rec);
  }
}
