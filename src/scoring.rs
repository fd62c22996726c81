//! Score tables and the scoring engine.
//!
//! The tables are loaded once at startup (defaults, optionally overridden from
//! TOML) and only ever read afterwards. Generated content can influence which
//! row is used (difficulty, correctness) but never supplies the number itself
//! for the difficulty-scaled stages.

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::domain::{AnswerStyle, ChoiceOption, Difficulty};
use crate::error::SelectionError;
use crate::seeds;

/// `{correct, wrong}` deltas for one difficulty.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct DeltaRow {
  pub correct: i32,
  pub wrong: i32,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct DifficultyTable {
  pub low: DeltaRow,
  pub medium: DeltaRow,
  pub high: DeltaRow,
  pub extreme: DeltaRow,
}

impl DifficultyTable {
  pub fn row(&self, d: Difficulty) -> DeltaRow {
    match d {
      Difficulty::Low => self.low,
      Difficulty::Medium => self.medium,
      Difficulty::High => self.high,
      Difficulty::Extreme => self.extreme,
    }
  }
}

impl Default for DifficultyTable {
  fn default() -> Self {
    Self {
      low: DeltaRow { correct: 1, wrong: -65 },
      medium: DeltaRow { correct: 3, wrong: -55 },
      high: DeltaRow { correct: 5, wrong: -45 },
      extreme: DeltaRow { correct: 7, wrong: -35 },
    }
  }
}

/// One keyword class for the major stage.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct KeywordBand {
  pub keywords: Vec<String>,
  pub hp_change: i32,
  pub tag: String,
}

/// Priority-ordered keyword classes: high > mid > low, then `other`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct MajorTable {
  pub high: KeywordBand,
  pub mid: KeywordBand,
  pub low: KeywordBand,
  pub other_hp_change: i32,
  pub other_tag: String,
}

impl Default for MajorTable {
  fn default() -> Self {
    let band = |kw: &[&str], hp_change: i32, tag: &str| KeywordBand {
      keywords: kw.iter().map(|s| s.to_string()).collect(),
      hp_change,
      tag: tag.into(),
    };
    Self {
      high: band(&["醫", "醫學", "牙醫", "藥學", "電機", "資工", "工程", "電資"], 10, "major_high_status"),
      mid: band(&["商", "企管", "管理", "會計", "財金", "金融", "法律", "法學", "經濟"], -20, "major_mid"),
      low: band(&["美術", "藝術", "設計", "哲學", "社會", "歷史", "音樂", "戲劇", "舞蹈", "體育"], -30, "major_low_status"),
      other_hp_change: -20,
      other_tag: "major_other".into(),
    }
  }
}

/// Inclusive clamp range for deltas that arrive inside generated option lists.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct HpBounds {
  pub min: i32,
  pub max: i32,
}

impl HpBounds {
  pub fn clamp(&self, v: i32) -> i32 {
    v.clamp(self.min, self.max)
  }
}

/// Process-wide scoring configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScoreTables {
  pub birth: Vec<ChoiceOption>,
  pub majors: MajorTable,
  pub children: Vec<ChoiceOption>,
  pub job_bounds: HpBounds,
  pub partner_bounds: HpBounds,
  pub difficulty: DifficultyTable,
}

impl Default for ScoreTables {
  fn default() -> Self {
    Self {
      birth: seeds::birth_options(),
      majors: MajorTable::default(),
      children: seeds::children_options(),
      job_bounds: HpBounds { min: -45, max: 20 },
      partner_bounds: HpBounds { min: -45, max: 10 },
      difficulty: DifficultyTable::default(),
    }
  }
}

impl ScoreTables {
  /// Structural checks applied to configured tables.
  pub fn validate(&self) -> Result<(), String> {
    if self.birth.is_empty() {
      return Err("scoring.birth must list at least one option".into());
    }
    if self.children.is_empty() {
      return Err("scoring.children must list at least one option".into());
    }
    for (name, b) in [("job_bounds", self.job_bounds), ("partner_bounds", self.partner_bounds)] {
      if b.min > b.max {
        return Err(format!("scoring.{name}: min {} > max {}", b.min, b.max));
      }
    }
    Ok(())
  }
}

/// Delta + tag produced for one stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scored {
  pub hp_change: i32,
  pub tag: String,
}

/// Read-only view over the score tables.
#[derive(Clone, Copy)]
pub struct ScoringEngine<'a> {
  tables: &'a ScoreTables,
}

impl<'a> ScoringEngine<'a> {
  pub fn new(tables: &'a ScoreTables) -> Self {
    Self { tables }
  }

  pub fn tables(&self) -> &'a ScoreTables {
    self.tables
  }

  /// Keyword classification of a free-text major. The first band that
  /// matches, in priority order, wins.
  #[instrument(level = "debug", skip(self))]
  pub fn classify_major(&self, text: &str) -> Scored {
    let t = &self.tables.majors;
    for band in [&t.high, &t.mid, &t.low] {
      if band.keywords.iter().any(|k| !k.is_empty() && text.contains(k.as_str())) {
        debug!(target: "scoring", tag = %band.tag, hp_change = band.hp_change, "major matched keyword band");
        return Scored { hp_change: band.hp_change, tag: band.tag.clone() };
      }
    }
    debug!(target: "scoring", tag = %t.other_tag, "major matched no band");
    Scored { hp_change: t.other_hp_change, tag: t.other_tag.clone() }
  }

  /// Ordinal (1-based) selection. Also accepts an option's keyword, case-insensitively.
  pub fn select_option<'o>(&self, options: &'o [ChoiceOption], input: &str) -> Result<&'o ChoiceOption, SelectionError> {
    let input = input.trim();
    if input.is_empty() {
      return Err(SelectionError::Empty);
    }
    if let Ok(n) = input.parse::<usize>() {
      if (1..=options.len()).contains(&n) {
        return Ok(&options[n - 1]);
      }
    }
    let lowered = input.to_lowercase();
    options
      .iter()
      .find(|o| o.keyword.as_deref().is_some_and(|k| k.to_lowercase() == lowered))
      .ok_or_else(|| SelectionError::OutOfRange { input: input.to_string(), max: options.len() })
  }

  /// Clamp a generated option delta into the configured bounds.
  pub fn bounded(&self, bounds: HpBounds, raw: i32) -> i32 {
    let v = bounds.clamp(raw);
    if v != raw {
      warn!(target: "scoring", raw, clamped = v, "generated option delta outside bounds");
    }
    v
  }

  /// New-year interrogation: only a balanced reply is on target.
  pub fn interrogation(&self, difficulty: Difficulty, style: AnswerStyle) -> Scored {
    let row = self.tables.difficulty.row(difficulty);
    let hp_change = if style.is_on_target() { row.correct } else { row.wrong };
    Scored { hp_change, tag: format!("newyear_{}_{}", style, difficulty) }
  }

  /// Kinship boss: correctness comes from answer matching.
  pub fn kinship(&self, difficulty: Difficulty, correct: bool) -> Scored {
    let row = self.tables.difficulty.row(difficulty);
    let (hp_change, verdict) = if correct { (row.correct, "correct") } else { (row.wrong, "wrong") };
    Scored { hp_change, tag: format!("kinship_{}_{}", verdict, difficulty) }
  }
}
