//! Content generation: the generator capability and the domain helpers that
//! turn its free text into trusted stage content.
//!
//! Every helper except outcome narration degrades to deterministic seed
//! content on failure. Narration failures propagate and halt the run.

use tracing::{info, instrument, warn};

use crate::config::Prompts;
use crate::domain::{AnswerStyle, ChoiceOption, ContentSource, Difficulty, GameState, GeneratedQuestion, Outcome};
use crate::error::{ContentError, GameError};
use crate::parse::{parse_record, Record, RecordExt};
use crate::scoring::{HpBounds, ScoringEngine};
use crate::seeds;
use crate::util::{fill_template, one_line, trunc_for_log};
use crate::validate::{is_reasonable_kinship_answer, validate_options};

/// Maximum chars kept from a backup note.
const BACKUP_NOTE_MAX_CHARS: usize = 24;

/// Generation attempts for the kinship question before the static fallback.
const KINSHIP_ATTEMPTS: usize = 2;

/// External text generator. Calls are awaited one at a time; nothing here
/// retries the transport.
#[allow(async_fn_in_trait)]
pub trait ContentGenerator {
  /// Plain text completion.
  async fn generate(&self, system: &str, user: &str, temperature: f32) -> Result<String, ContentError>;

  /// Completion expected to be, or contain, one JSON object. The text is
  /// still returned raw; callers parse it defensively.
  async fn generate_json(&self, system: &str, user: &str, temperature: f32) -> Result<String, ContentError> {
    self.generate(system, user, temperature).await
  }
}

/// Structured request: generate, then recover a record from the text.
pub async fn request_record<G: ContentGenerator>(
  gen: &G,
  system: &str,
  user: &str,
  temperature: f32,
) -> Result<Record, ContentError> {
  let text = gen.generate_json(system, user, temperature).await?;
  parse_record(&text)
}

/// Story text + note for a resolved stage.
#[instrument(level = "info", skip_all, fields(%stage, hp_change, %tag))]
pub async fn generate_outcome<G: ContentGenerator>(
  gen: &G,
  prompts: &Prompts,
  stage: &str,
  context: &str,
  choice: &str,
  hp_change: i32,
  tag: &str,
) -> Result<Outcome, GameError> {
  let hp = hp_change.to_string();
  let user = fill_template(
    &prompts.outcome_user_template,
    &[("stage", stage), ("context", context), ("choice", choice), ("hp_change", &hp), ("tag", tag)],
  );
  let rec = request_record(gen, &prompts.outcome_system, &user, 0.8).await?;

  let result = rec.text("result").unwrap_or_default();
  let note = match rec.text("note") {
    Some(n) => n,
    None => backup_note(gen, prompts).await,
  };
  Ok(Outcome { result, note })
}

async fn backup_note<G: ContentGenerator>(gen: &G, prompts: &Prompts) -> String {
  match gen.generate(&prompts.note_backup_system, &prompts.note_backup_user, 0.7).await {
    Ok(text) => {
      let note = one_line(&text, BACKUP_NOTE_MAX_CHARS);
      if note.is_empty() {
        warn!(target: "content", "backup note empty; using fallback note");
        seeds::FALLBACK_NOTE.to_string()
      } else {
        note
      }
    }
    Err(e) => {
      warn!(target: "content", error = %e, "backup note request failed; using fallback note");
      seeds::FALLBACK_NOTE.to_string()
    }
  }
}

/// Three generated options under `key`, or the fallback set.
#[instrument(level = "info", skip_all, fields(%key))]
pub async fn generate_options<G: ContentGenerator>(
  gen: &G,
  system: &str,
  user: &str,
  key: &str,
  scoring: &ScoringEngine<'_>,
  bounds: HpBounds,
  fallback: fn() -> Vec<ChoiceOption>,
) -> (Vec<ChoiceOption>, ContentSource) {
  let rec = match request_record(gen, system, user, 0.8).await {
    Ok(rec) => rec,
    Err(e) => {
      warn!(target: "content", %key, error = %e, raw = %trunc_for_log(e.raw().unwrap_or(""), 120), "option generation failed; using fallback set");
      return (fallback(), ContentSource::Fallback);
    }
  };
  match validate_options(&rec, key, scoring, bounds) {
    Ok(opts) => {
      info!(target: "content", %key, "generated options accepted");
      (opts, ContentSource::Generated)
    }
    Err(e) => {
      warn!(target: "content", %key, reason = ?e, "generated options failed shape check; using fallback set");
      (fallback(), ContentSource::Fallback)
    }
  }
}

fn difficulty_or_default(rec: &Record) -> Difficulty {
  let raw = rec.text("difficulty").unwrap_or_default();
  Difficulty::parse(&raw).unwrap_or_else(|e| {
    warn!(target: "content", error = %e, "using default difficulty");
    Difficulty::default()
  })
}

/// The new-year interrogation question.
#[instrument(level = "info", skip_all)]
pub async fn generate_newyear_question<G: ContentGenerator>(gen: &G, prompts: &Prompts) -> GeneratedQuestion {
  let rec = match request_record(gen, &prompts.newyear_system, &prompts.newyear_user, 0.9).await {
    Ok(rec) => rec,
    Err(e) => {
      warn!(target: "content", error = %e, "new-year question generation failed; using fallback");
      return seeds::fallback_newyear_question();
    }
  };
  let Some(question) = rec.text("question") else {
    warn!(target: "content", "new-year question missing; using fallback");
    return seeds::fallback_newyear_question();
  };
  GeneratedQuestion {
    question,
    difficulty: difficulty_or_default(&rec),
    answers: Vec::new(),
    source: ContentSource::Generated,
  }
}

/// Judge the reply style. Anything unusable is `Other`.
#[instrument(level = "info", skip_all, fields(answer_len = answer.len()))]
pub async fn classify_answer_style<G: ContentGenerator>(
  gen: &G,
  prompts: &Prompts,
  question: &str,
  answer: &str,
) -> AnswerStyle {
  let user = fill_template(&prompts.style_user_template, &[("question", question), ("answer", answer)]);
  let raw = match request_record(gen, &prompts.style_system, &user, 0.3).await {
    Ok(rec) => rec.text("answer_style").unwrap_or_default(),
    Err(e) => {
      warn!(target: "content", error = %e, "style classification failed");
      return AnswerStyle::Other;
    }
  };
  AnswerStyle::parse(&raw).unwrap_or_else(|e| {
    warn!(target: "content", error = %e, "using style 'other'");
    AnswerStyle::Other
  })
}

/// Kinship question with filtered reference answers. At most two generation
/// attempts, then the static fallback.
#[instrument(level = "info", skip_all)]
pub async fn generate_kinship_question<G: ContentGenerator>(gen: &G, prompts: &Prompts) -> GeneratedQuestion {
  for attempt in 1..=KINSHIP_ATTEMPTS {
    let rec = match request_record(gen, &prompts.kinship_system, &prompts.kinship_user, 0.9).await {
      Ok(rec) => rec,
      Err(e) => {
        warn!(target: "content", attempt, error = %e, "kinship question generation failed");
        continue;
      }
    };
    let candidates = rec.text_list("answers");
    let answers: Vec<String> = candidates.iter().filter(|a| is_reasonable_kinship_answer(a)).cloned().collect();
    let question = rec.text("question");
    match question {
      Some(question) if !answers.is_empty() => {
        info!(target: "content", attempt, kept = answers.len(), dropped = candidates.len() - answers.len(), "kinship question accepted");
        return GeneratedQuestion {
          question,
          difficulty: difficulty_or_default(&rec),
          answers,
          source: ContentSource::Generated,
        };
      }
      _ => warn!(target: "content", attempt, ?candidates, "kinship question had no usable answer"),
    }
  }
  warn!(target: "content", "kinship generation exhausted; using fallback question");
  seeds::fallback_kinship_question()
}

/// End-of-run review. Falls back to a fixed text on any failure.
#[instrument(level = "info", skip_all, fields(stages = state.logs.len()))]
pub async fn generate_review<G: ContentGenerator>(gen: &G, prompts: &Prompts, state: &GameState, ending: &str) -> String {
  let logs = serde_json::to_string_pretty(&state.logs).unwrap_or_else(|_| "[]".into());
  let notes = serde_json::to_string_pretty(&state.notes).unwrap_or_else(|_| "[]".into());
  let hp = state.hp.to_string();
  let stages = state.logs.len().to_string();
  let user = fill_template(
    &prompts.review_user_template,
    &[("logs", &logs), ("hp", &hp), ("ending", ending), ("stages", &stages), ("notes", &notes)],
  );
  match gen.generate(&prompts.review_system, &user, 0.9).await {
    Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
    Ok(_) => {
      warn!(target: "content", "empty review; using fallback");
      seeds::fallback_review(state.logs.len(), state.hp)
    }
    Err(e) => {
      warn!(target: "content", error = %e, "review generation failed; using fallback");
      seeds::fallback_review(state.logs.len(), state.hp)
    }
  }
}


#[cfg(test)]
mod tests {
  use super::testing::ScriptedGenerator;
  use super::*;
  use crate::scoring::ScoreTables;

  fn prompts() -> Prompts {
    Prompts::default()
  }

  #[tokio::test]
  async fn outcome_is_parsed_from_wrapped_json() {
    let gen = ScriptedGenerator::sequence(vec![ScriptedGenerator::ok(
      "好的！{\"result\": \"你走進了教室。\", \"note\": \"興趣很重要，薪水也是。\"}",
    )]);
    let o = generate_outcome(&gen, &prompts(), "大學志願", "ctx", "資工", 10, "major_high_status").await.unwrap();
    assert_eq!(o.result, "你走進了教室。");
    assert_eq!(o.note, "興趣很重要，薪水也是。");
    let calls = gen.calls.lock().unwrap();
    assert!(calls[0].1.contains("資工") && calls[0].1.contains("major_high_status"));
  }

  #[tokio::test]
  async fn malformed_outcome_is_fatal_and_keeps_raw() {
    let gen = ScriptedGenerator::sequence(vec![ScriptedGenerator::ok("sorry, I cannot do that")]);
    let err = generate_outcome(&gen, &prompts(), "s", "c", "x", 0, "t").await.unwrap_err();
    assert!(matches!(err, GameError::MalformedContent { ref raw } if raw == "sorry, I cannot do that"));
  }

  #[tokio::test]
  async fn missing_note_uses_truncated_backup() {
    let gen = ScriptedGenerator::sequence(vec![
      ScriptedGenerator::ok(r#"{"result": "r", "note": "  "}"#),
      ScriptedGenerator::ok("第一行很長很長很長很長很長\n第二行也很長很長很長很長很長很長"),
    ]);
    let o = generate_outcome(&gen, &prompts(), "s", "c", "x", 0, "t").await.unwrap();
    assert_eq!(o.note.chars().count(), 24);
    assert!(!o.note.contains('\n'));
    assert_eq!(gen.calls_with_system(&prompts().note_backup_system), 1);
  }

  #[tokio::test]
  async fn failed_backup_note_still_yields_a_note() {
    let gen = ScriptedGenerator::sequence(vec![ScriptedGenerator::ok(r#"{"result": "r"}"#)]);
    let o = generate_outcome(&gen, &prompts(), "s", "c", "x", 0, "t").await.unwrap();
    assert_eq!(o.note, seeds::FALLBACK_NOTE);
  }

  #[tokio::test]
  async fn bad_option_lists_fall_back() {
    let tables = ScoreTables::default();
    let scoring = ScoringEngine::new(&tables);
    let p = prompts();
    let gen = ScriptedGenerator::sequence(vec![ScriptedGenerator::ok(r#"{"jobs": [{"title": "only one"}]}"#)]);
    let (opts, src) = generate_options(&gen, &p.jobs_system, &p.jobs_user, "jobs", &scoring, tables.job_bounds, seeds::fallback_jobs).await;
    assert_eq!(src, ContentSource::Fallback);
    assert_eq!(opts, seeds::fallback_jobs());

    let gen = ScriptedGenerator::sequence(vec![Err(ContentError::Transport("down".into()))]);
    let (_, src) = generate_options(&gen, &p.jobs_system, &p.jobs_user, "jobs", &scoring, tables.job_bounds, seeds::fallback_jobs).await;
    assert_eq!(src, ContentSource::Fallback);
  }

  #[tokio::test]
  async fn newyear_question_defaults_unknown_difficulty_to_medium() {
    let gen = ScriptedGenerator::sequence(vec![ScriptedGenerator::ok(r#"{"question": "薪水多少？", "difficulty": "spicy"}"#)]);
    let q = generate_newyear_question(&gen, &prompts()).await;
    assert_eq!(q.question, "薪水多少？");
    assert_eq!(q.difficulty, Difficulty::Medium);
    assert_eq!(q.source, ContentSource::Generated);

    let gen = ScriptedGenerator::sequence(vec![ScriptedGenerator::ok("no json")]);
    assert_eq!(generate_newyear_question(&gen, &prompts()).await, seeds::fallback_newyear_question());
  }

  #[tokio::test]
  async fn style_classification_degrades_to_other() {
    let p = prompts();
    let gen = ScriptedGenerator::sequence(vec![ScriptedGenerator::ok(r#"{"answer_style": "Balanced"}"#)]);
    assert_eq!(classify_answer_style(&gen, &p, "q", "a").await, AnswerStyle::Balanced);
    let gen = ScriptedGenerator::sequence(vec![ScriptedGenerator::ok(r#"{"answer_style": "sarcastic"}"#)]);
    assert_eq!(classify_answer_style(&gen, &p, "q", "a").await, AnswerStyle::Other);
    let gen = ScriptedGenerator::sequence(vec![ScriptedGenerator::ok("???")]);
    assert_eq!(classify_answer_style(&gen, &p, "q", "a").await, AnswerStyle::Other);
  }

  #[tokio::test]
  async fn kinship_first_attempt_keeps_only_valid_answers() {
    let gen = ScriptedGenerator::sequence(vec![ScriptedGenerator::ok(
      r#"{"question": "你的表哥的老婆的爸爸要怎麼稱呼？", "difficulty": "high", "answers": ["姻伯", "親家公", "this is wrong"]}"#,
    )]);
    let q = generate_kinship_question(&gen, &prompts()).await;
    assert_eq!(q.answers, vec!["姻伯".to_string(), "親家公".to_string()]);
    assert_eq!(q.difficulty, Difficulty::High);
    assert_eq!(gen.call_count(), 1);
  }

  #[tokio::test]
  async fn kinship_retries_once_then_succeeds() {
    let gen = ScriptedGenerator::sequence(vec![
      ScriptedGenerator::ok(r#"{"question": "q1", "difficulty": "high", "answers": ["Uncle Bob"]}"#),
      ScriptedGenerator::ok(r#"{"question": "q2", "difficulty": "extreme", "answers": "表舅"}"#),
    ]);
    let q = generate_kinship_question(&gen, &prompts()).await;
    assert_eq!(q.question, "q2");
    assert_eq!(q.answers, vec!["表舅".to_string()]);
    assert_eq!(gen.call_count(), 2);
  }

  #[tokio::test]
  async fn kinship_uses_fallback_after_exactly_two_attempts() {
    let gen = ScriptedGenerator::from_fn(|_, _| Ok(r#"{"question": "q", "answers": ["爸爸的朋友的朋友"]}"#.into()));
    let q = generate_kinship_question(&gen, &prompts()).await;
    assert_eq!(q, seeds::fallback_kinship_question());
    assert_eq!(gen.call_count(), 2);
  }

  #[tokio::test]
  async fn review_falls_back_when_generator_fails() {
    let gen = ScriptedGenerator::sequence(vec![Err(ContentError::Transport("down".into()))]);
    let state = GameState::new(7);
    let r = generate_review(&gen, &prompts(), &state, "win").await;
    assert_eq!(r, seeds::fallback_review(0, 100));
  }
}
