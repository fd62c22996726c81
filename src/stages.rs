//! Stage handlers.
//!
//! Each handler gathers input, scores it, asks for narration and only then
//! commits: hp, note ledger and stage record change together in one
//! synchronous step. A handler that fails or is cancelled before committing
//! leaves the state untouched.

use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::config::Prompts;
use crate::console::Console;
use crate::content::{self, ContentGenerator};
use crate::domain::{ChoiceOption, ContentSource, GameState, StageDetail, StageRecord};
use crate::error::GameError;
use crate::pinyin;
use crate::scoring::{Scored, ScoringEngine};
use crate::seeds;
use crate::validate::answer_matches;

/// Which handler resolves a chapter.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
  Birth,
  Major,
  FirstJob,
  Marriage,
  Children,
  NewYear,
  Kinship,
}

const MAJOR_CONTEXT: &str = "老師在前面講「興趣很重要」，但身後的爸媽在說「填這個以後薪水怎麼辦」。\
  你手上的筆懸在那一格「第一志願」，好像不是在填科系，是在填以後過年被問幾題。";
const CHILDREN_CONTEXT: &str = "你在醫院產房門口、育兒社團、或房間裡的深夜，反覆確認這個選擇。";

/// Everything a stage needs besides the state itself.
pub struct StageRunner<'a, G> {
  gen: &'a G,
  console: &'a mut Console,
  scoring: ScoringEngine<'a>,
  prompts: &'a Prompts,
}

impl<'a, G: ContentGenerator> StageRunner<'a, G> {
  pub fn new(gen: &'a G, console: &'a mut Console, scoring: ScoringEngine<'a>, prompts: &'a Prompts) -> Self {
    Self { gen, console, scoring, prompts }
  }

  pub fn console(&mut self) -> &mut Console {
    &mut *self.console
  }

  /// Resolve one stage of kind `kind`, recorded under the name `stage`.
  pub async fn play(&mut self, kind: StageKind, stage: &str, state: &mut GameState) -> Result<(), GameError> {
    match kind {
      StageKind::Birth => self.birth(stage, state).await,
      StageKind::Major => self.major(stage, state).await,
      StageKind::FirstJob => self.first_job(stage, state).await,
      StageKind::Marriage => self.marriage(stage, state).await,
      StageKind::Children => self.children(stage, state).await,
      StageKind::NewYear => self.new_year(stage, state).await,
      StageKind::Kinship => self.kinship(stage, state).await,
    }
  }

  #[instrument(level = "info", skip_all, fields(turn = state.turn))]
  async fn birth(&mut self, stage: &str, state: &mut GameState) -> Result<(), GameError> {
    self.console.say("你還沒看到世界長什麼樣，產房外一群長輩已經在猜你的性別。");
    self.console.say("在這個超傳統、有點誇張的亞洲家庭裡，性別會直接決定開局難度。\n");

    let options = &self.scoring.tables().birth;
    self.list_options(options, false);
    let keywords: Vec<&str> = options.iter().filter_map(|o| o.keyword.as_deref()).collect();
    let prompt = if keywords.is_empty() {
      "請選擇你出生的性別（輸入編號）：".to_string()
    } else {
      format!("請選擇你出生的性別（輸入編號或 {}）：", keywords.join(" / "))
    };
    let picked = self
      .console
      .choose(&prompt, "產房外的長輩聽不懂，再選一次。", &state.notes, &self.scoring, options)
      .await?
      .clone();

    if let Some(flavour) = &picked.flavour {
      self.console.say(format!("\n{flavour}\n"));
    }
    let note = picked.note.clone().unwrap_or_else(|| seeds::FALLBACK_NOTE.to_string());
    let choice = picked.keyword.clone().unwrap_or_else(|| picked.title.clone());
    let scored = Scored { hp_change: picked.hp_change, tag: picked.tag.clone() };
    self.commit(state, stage, choice, scored, note, StageDetail::Choice { description: None });
    Ok(())
  }

  #[instrument(level = "info", skip_all, fields(turn = state.turn))]
  async fn major(&mut self, stage: &str, state: &mut GameState) -> Result<(), GameError> {
    self.console.say("你來到填大學志願的教室，桌上是那張改不了命運、但會被長輩唸一輩子的志願表。\n");
    self.console.say("請用簡短文字描述你想填的科系或領域（例如：醫學系、資工、商管、美術、哲學系...）");
    let major = self.console.ask("你填下的第一志願是：", &state.notes).await?;

    let scored = self.scoring.classify_major(&major);
    let outcome = self.narrate(stage, MAJOR_CONTEXT, &major, &scored).await?;
    self.show_result(&outcome.result);
    self.commit(state, stage, major, scored, outcome.note, StageDetail::Choice { description: None });
    Ok(())
  }

  #[instrument(level = "info", skip_all, fields(turn = state.turn))]
  async fn first_job(&mut self, stage: &str, state: &mut GameState) -> Result<(), GameError> {
    self.console.say("你畢業了，站在第一份工作的十字路口。");
    self.console.say("世界給你三個工作，但它們背後的『社會眼光』都不太一樣……\n");

    let bounds = self.scoring.tables().job_bounds;
    let (jobs, source) = content::generate_options(
      self.gen,
      &self.prompts.jobs_system,
      &self.prompts.jobs_user,
      "jobs",
      &self.scoring,
      bounds,
      seeds::fallback_jobs,
    )
    .await;
    if source == ContentSource::Fallback {
      self.console.say("（命運的職缺表印壞了，先拿備用的三份工作頂著。）\n");
    }
    self.console.say("以下是三份由命運排到你面前的工作：\n");
    self.list_options(&jobs, true);
    let picked = self
      .console
      .choose(
        "請輸入 1 / 2 / 3 選擇你的第一份工作：",
        "看起來你選到不存在的工作，再試一次（輸入 1 / 2 / 3）。",
        &state.notes,
        &self.scoring,
        &jobs,
      )
      .await?
      .clone();

    let context = format!("你選擇了「{}」，也等於選了某種人生版本。", picked.title);
    self.resolve_choice(stage, state, picked, &context).await
  }

  #[instrument(level = "info", skip_all, fields(turn = state.turn))]
  async fn marriage(&mut self, stage: &str, state: &mut GameState) -> Result<(), GameError> {
    self.console.say("你的人生來到『長輩開始問婚事』的階段。");
    self.console.say("桌上出現三個對象，看起來不像選愛情，比較像選家族KPI。\n");

    let bounds = self.scoring.tables().partner_bounds;
    let (partners, source) = content::generate_options(
      self.gen,
      &self.prompts.partners_system,
      &self.prompts.partners_user,
      "partners",
      &self.scoring,
      bounds,
      seeds::fallback_partners,
    )
    .await;
    if source == ContentSource::Fallback {
      self.console.say("（媒人今天請假，改由家族備用名單登場。）\n");
    }
    self.console.say("以下是命運幫你安排的三位結婚候選人：\n");
    self.list_options(&partners, true);
    let picked = self
      .console
      .choose(
        "請輸入 1 / 2 / 3 選擇你的結婚對象：",
        "這位對象目前不在候選名單，再試一次（輸入 1 / 2 / 3）。",
        &state.notes,
        &self.scoring,
        &partners,
      )
      .await?
      .clone();

    let context = format!("你選擇了「{}」。婚禮不是最累的，最累的是兩個家族的交鋒。", picked.title);
    self.resolve_choice(stage, state, picked, &context).await
  }

  #[instrument(level = "info", skip_all, fields(turn = state.turn))]
  async fn children(&mut self, stage: &str, state: &mut GameState) -> Result<(), GameError> {
    self.console.say("婚後沒多久，長輩開始問：「什麼時候要抱孫？」");
    self.console.say("你面前出現三條路，每一條都會被評論，只是角度不一樣。\n");

    let options = &self.scoring.tables().children;
    self.console.say("請從以下選項中選擇：");
    self.list_options(options, false);
    let picked = self
      .console
      .choose(
        "請輸入編號選擇你的決定：",
        "目前劇本裡還沒有這種家庭規劃，再試一次。",
        &state.notes,
        &self.scoring,
        options,
      )
      .await?
      .clone();

    self.resolve_choice(stage, state, picked, CHILDREN_CONTEXT).await
  }

  #[instrument(level = "info", skip_all, fields(turn = state.turn))]
  async fn new_year(&mut self, stage: &str, state: &mut GameState) -> Result<(), GameError> {
    self.console.say("你拖著有點不足的睡眠與滿滿的伴手禮，回到睽違已久的老家。");
    self.console.say("客廳裡坐滿了已經預約好要問你近況的長輩們。\n");

    let q = content::generate_newyear_question(self.gen, self.prompts).await;
    self.console.say(format!("長輩開口了：\n「{}」\n", q.question));
    self.console.say("請輸入你打算怎麼回答：");
    let answer = self.console.ask("你的回答是：", &state.notes).await?;

    let style = content::classify_answer_style(self.gen, self.prompts, &q.question, &answer).await;
    let scored = self.scoring.interrogation(q.difficulty, style);
    let context = format!("過年客廳裡，大家一邊剝橘子，一邊等你回答：「{}」。", q.question);
    let outcome = self.narrate(stage, &context, &answer, &scored).await?;
    self.show_result(&outcome.result);
    let detail = StageDetail::Interrogation { question: q.question, difficulty: q.difficulty, answer_style: style };
    self.commit(state, stage, answer, scored, outcome.note, detail);
    Ok(())
  }

  #[instrument(level = "info", skip_all, fields(turn = state.turn))]
  async fn kinship(&mut self, stage: &str, state: &mut GameState) -> Result<(), GameError> {
    self.console.say("你來到最後一關，歡迎進入華人家族樹的深淵。");
    self.console.say("長輩突然想考你：到底懂不懂『正確稱呼親戚』的玄學禮儀。\n");

    let q = content::generate_kinship_question(self.gen, self.prompts).await;
    self.console.say(format!("題目：\n「{}」\n", q.question));
    let answer = self.console.ask("你的回答：", &state.notes).await?;

    let correct = answer_matches(&answer, &q.answers);
    info!(target: "stage", correct, difficulty = %q.difficulty, "kinship answer judged");
    let scored = self.scoring.kinship(q.difficulty, correct);
    let context = format!("你在家族圖前努力解讀「{}」。", q.question);
    let outcome = self.narrate(stage, &context, &answer, &scored).await?;
    self.show_result(&outcome.result);

    let reveal: Vec<String> = q.answers.iter().map(|a| pinyin::annotate(a)).collect();
    self.console.say(format!("參考稱謂：{}", reveal.join("、")));
    let detail = StageDetail::Kinship {
      question: q.question,
      correct_answers: q.answers,
      difficulty: q.difficulty,
      is_correct: correct,
    };
    self.commit(state, stage, answer, scored, outcome.note, detail);
    self.console.say("不管回答什麼，沒有主動先問好就是扣大分！");
    Ok(())
  }

  /// Narrate and commit a picked fixed-table option.
  async fn resolve_choice(
    &mut self,
    stage: &str,
    state: &mut GameState,
    picked: ChoiceOption,
    context: &str,
  ) -> Result<(), GameError> {
    let scored = Scored { hp_change: picked.hp_change, tag: picked.tag };
    let outcome = self.narrate(stage, context, &picked.title, &scored).await?;
    self.show_result(&outcome.result);
    let description = Some(picked.description).filter(|d| !d.is_empty());
    self.commit(state, stage, picked.title, scored, outcome.note, StageDetail::Choice { description });
    Ok(())
  }

  async fn narrate(
    &self,
    stage: &str,
    context: &str,
    choice: &str,
    scored: &Scored,
  ) -> Result<crate::domain::Outcome, GameError> {
    content::generate_outcome(self.gen, self.prompts, stage, context, choice, scored.hp_change, &scored.tag).await
  }

  fn list_options(&mut self, options: &[ChoiceOption], with_description: bool) {
    for (idx, o) in options.iter().enumerate() {
      self.console.say(format!("{}. {}", idx + 1, o.title));
      if with_description && !o.description.is_empty() {
        self.console.say(format!("   {}\n", o.description));
      }
    }
    if !with_description {
      self.console.say("");
    }
  }

  fn show_result(&mut self, result: &str) {
    self.console.say("\n【結果】");
    if result.is_empty() {
      warn!(target: "stage", "narration returned no result text");
      self.console.say("（這一段人生，旁白一時說不出話。）");
    } else {
      self.console.say(result);
    }
  }

  /// Apply the delta and record the stage. Never awaits.
  fn commit(
    &mut self,
    state: &mut GameState,
    stage: &str,
    choice: String,
    scored: Scored,
    note: String,
    detail: StageDetail,
  ) {
    let hp_after = state.apply_delta(scored.hp_change);
    if !state.notes.append(&note) {
      info!(target: "stage", "note already in ledger");
    }
    info!(target: "stage", turn = state.turn, %stage, hp_change = scored.hp_change, hp_after, tag = %scored.tag, "stage resolved");
    self.console.say(format!("\n【HP 變化】{} → 目前 HP：{}", scored.hp_change, hp_after));
    self.console.say(format!("【人生小筆記】{note}\n"));
    state.logs.push(StageRecord {
      turn: state.turn,
      stage: stage.to_string(),
      choice,
      hp_change: scored.hp_change,
      hp_after,
      note,
      tag: scored.tag,
      detail,
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::console::testing::scripted;
  use crate::content::testing::ScriptedGenerator;
  use crate::domain::{AnswerStyle, Difficulty};
  use crate::error::ContentError;
  use crate::scoring::ScoreTables;

  const OUTCOME: &str = r#"{"result": "故事繼續。", "note": "先活下來再說。"}"#;

  #[tokio::test]
  async fn birth_accepts_keyword_and_skips_narration() {
    let tables = ScoreTables::default();
    let prompts = Prompts::default();
    let gen = ScriptedGenerator::sequence(vec![]);
    let (mut console, out) = scripted(&["female"]);
    let mut state = GameState::new(1);
    {
      let mut runner = StageRunner::new(&gen, &mut console, ScoringEngine::new(&tables), &prompts);
      runner.play(StageKind::Birth, "出生", &mut state).await.unwrap();
    }
    assert_eq!(gen.call_count(), 0);
    assert_eq!(state.hp, 70);
    let rec = &state.logs[0];
    assert_eq!((rec.choice.as_str(), rec.tag.as_str(), rec.hp_after), ("female", "female_hard_mode", 70));
    assert_eq!(state.notes.iter().next(), Some("這不是妳的錯，是這片地圖太難。"));
    assert!(out.contents().contains("產房外安靜了三秒"));
  }

  #[tokio::test]
  async fn major_is_classified_and_narrated() {
    let tables = ScoreTables::default();
    let prompts = Prompts::default();
    let gen = ScriptedGenerator::sequence(vec![ScriptedGenerator::ok(OUTCOME)]);
    let (mut console, out) = scripted(&["電機與設計"]);
    let mut state = GameState::new(1);
    {
      let mut runner = StageRunner::new(&gen, &mut console, ScoringEngine::new(&tables), &prompts);
      runner.play(StageKind::Major, "大學志願", &mut state).await.unwrap();
    }
    assert_eq!(state.hp, 110);
    assert_eq!(state.logs[0].tag, "major_high_status");
    assert!(out.contents().contains("故事繼續。"));
  }

  #[tokio::test]
  async fn generated_jobs_are_bounded_and_recorded_with_description() {
    let tables = ScoreTables::default();
    let prompts = Prompts::default();
    let jobs = r#"{"jobs": [
      {"title": "A", "description": "da", "hidden_hp": -99, "tag": "job_a"},
      {"title": "B", "description": "db", "hidden_hp": 5, "tag": "job_b"},
      {"title": "C", "description": "dc", "hidden_hp": 50, "tag": "job_c"}
    ]}"#;
    let gen = ScriptedGenerator::sequence(vec![ScriptedGenerator::ok(jobs), ScriptedGenerator::ok(OUTCOME)]);
    let (mut console, _) = scripted(&["4", "1"]);
    let mut state = GameState::new(1);
    {
      let mut runner = StageRunner::new(&gen, &mut console, ScoringEngine::new(&tables), &prompts);
      runner.play(StageKind::FirstJob, "第一份工作", &mut state).await.unwrap();
    }
    let rec = &state.logs[0];
    assert_eq!((rec.choice.as_str(), rec.hp_change, rec.hp_after), ("A", -45, 55));
    assert_eq!(rec.detail, StageDetail::Choice { description: Some("da".into()) });
  }

  #[tokio::test]
  async fn partner_failure_uses_fallback_list() {
    let tables = ScoreTables::default();
    let prompts = Prompts::default();
    let gen = ScriptedGenerator::sequence(vec![
      Err(ContentError::Transport("down".into())),
      ScriptedGenerator::ok(OUTCOME),
    ]);
    let (mut console, out) = scripted(&["3"]);
    let mut state = GameState::new(1);
    {
      let mut runner = StageRunner::new(&gen, &mut console, ScoringEngine::new(&tables), &prompts);
      runner.play(StageKind::Marriage, "結婚", &mut state).await.unwrap();
    }
    assert_eq!(state.logs[0].tag, seeds::fallback_partners()[2].tag);
    assert!(out.contents().contains("家族備用名單"));
  }

  #[tokio::test]
  async fn new_year_scores_from_the_difficulty_row() {
    let tables = ScoreTables::default();
    let prompts = Prompts::default();
    let gen = ScriptedGenerator::sequence(vec![
      ScriptedGenerator::ok(r#"{"question": "買房了沒？", "difficulty": "high", "hp": 999}"#),
      ScriptedGenerator::ok(r#"{"answer_style": "defensive"}"#),
      ScriptedGenerator::ok(OUTCOME),
    ]);
    let (mut console, _) = scripted(&["關你什麼事"]);
    let mut state = GameState::new(1);
    {
      let mut runner = StageRunner::new(&gen, &mut console, ScoringEngine::new(&tables), &prompts);
      runner.play(StageKind::NewYear, "過年", &mut state).await.unwrap();
    }
    let rec = &state.logs[0];
    assert_eq!((rec.hp_change, rec.tag.as_str()), (-45, "newyear_defensive_high"));
    assert_eq!(
      rec.detail,
      StageDetail::Interrogation { question: "買房了沒？".into(), difficulty: Difficulty::High, answer_style: AnswerStyle::Defensive }
    );
  }

  #[tokio::test]
  async fn kinship_fallback_matches_spaced_answer_and_reveals_pinyin() {
    let tables = ScoreTables::default();
    let prompts = Prompts::default();
    let gen = ScriptedGenerator::from_fn(|system, _| {
      if system.contains("稱謂魔王題") {
        Ok("not json".into())
      } else {
        Ok(OUTCOME.into())
      }
    });
    let (mut console, out) = scripted(&["丈 公"]);
    let mut state = GameState::new(1);
    {
      let mut runner = StageRunner::new(&gen, &mut console, ScoringEngine::new(&tables), &prompts);
      runner.play(StageKind::Kinship, "親戚稱謂", &mut state).await.unwrap();
    }
    let rec = &state.logs[0];
    assert_eq!((rec.hp_change, rec.tag.as_str()), (7, "kinship_correct_extreme"));
    assert!(matches!(rec.detail, StageDetail::Kinship { is_correct: true, .. }));
    assert!(out.contents().contains("丈公（zhàng gōng）"));
    assert_eq!(gen.calls_with_system(&prompts.kinship_system), 2);
  }

  #[tokio::test]
  async fn failed_narration_leaves_state_untouched() {
    let tables = ScoreTables::default();
    let prompts = Prompts::default();
    let gen = ScriptedGenerator::sequence(vec![ScriptedGenerator::ok("no braces here")]);
    let (mut console, _) = scripted(&["2"]);
    let mut state = GameState::new(1);
    let err = {
      let mut runner = StageRunner::new(&gen, &mut console, ScoringEngine::new(&tables), &prompts);
      runner.play(StageKind::Children, "生小孩", &mut state).await.unwrap_err()
    };
    assert!(matches!(err, GameError::MalformedContent { .. }));
    assert_eq!(state.hp, 100);
    assert!(state.logs.is_empty() && state.notes.is_empty());
  }
}
