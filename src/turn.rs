//! Turn controller: walks the chapter table, applies the termination rules and
//! decides the ending.

use std::future::Future;

use tracing::{error, info, instrument, warn};

use crate::config::{Chapter, GameConfig};
use crate::console::Console;
use crate::content::{self, ContentGenerator};
use crate::domain::{EndFlag, GameState};
use crate::error::GameError;
use crate::persist;
use crate::scoring::ScoringEngine;
use crate::seeds;
use crate::stages::StageRunner;

/// How a run ended. `Ambiguous` has no snapshot flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ending {
  Win,
  Lose,
  Ambiguous,
}

impl Ending {
  pub fn as_str(&self) -> &'static str {
    match self {
      Ending::Win => "win",
      Ending::Lose => "lose",
      Ending::Ambiguous => "ambiguous",
    }
  }

  /// Closing text shown before the review. `stages` is the chapter count.
  pub fn message(&self, stages: u32) -> String {
    match self {
      Ending::Win => format!(
        "你一路撐過 {stages} 關，雖然不一定每一題都符合長輩期待，\n\
         但至少，你是用自己的方式撐完這一輪。以亞洲人生來說，這已經是 SSR 結局了。"
      ),
      Ending::Lose => "這一輪，你在某一關被現實或家族文化一拳打趴。\n\
        不過，這片地圖本來就很難破，能撐到這裡已經很不簡單。"
        .to_string(),
      Ending::Ambiguous => "你停在一個很曖昧的地方：沒有輸得很徹底，也還沒贏。\n\
        某種程度上，這好像才是最多人真實的人生狀態。"
        .to_string(),
    }
  }
}

pub struct TurnController<'a, G> {
  runner: StageRunner<'a, G>,
  chapters: &'a [Chapter],
}

impl<'a, G: ContentGenerator> TurnController<'a, G> {
  pub fn new(gen: &'a G, console: &'a mut Console, config: &'a GameConfig) -> Self {
    let runner = StageRunner::new(gen, console, ScoringEngine::new(&config.scoring), &config.prompts);
    Self { runner, chapters: &config.chapters }
  }

  /// Play chapters until the table is exhausted or an end flag is set.
  /// hp reaching 0 sets `Lose` at once and leaves `turn` where it was.
  #[instrument(level = "info", skip_all, fields(run_id = %state.run_id))]
  pub async fn run(&mut self, state: &mut GameState) -> Result<(), GameError> {
    let chapters = self.chapters;
    while state.end_flag.is_none() {
      let Some(chapter) = chapters.get(state.turn as usize - 1) else { break };
      let console = self.runner.console();
      console.say("\n======================================");
      console.say(format!(" 第 {} 關：{}", state.turn, chapter.name));
      console.say("======================================\n");

      self.runner.play(chapter.kind, &chapter.name, state).await?;

      if state.is_depleted() {
        info!(target: "survival", turn = state.turn, stage = %chapter.name, "hp depleted");
        state.end_flag = Some(EndFlag::Lose);
        break;
      }
      state.turn += 1;
    }
    Ok(())
  }
}

/// Settle the end flag once the loop has stopped, for whatever reason.
pub fn finalize(state: &mut GameState, max_turns: u32) -> Ending {
  let ending = if state.is_depleted() {
    Ending::Lose
  } else if state.turn > max_turns && state.end_flag != Some(EndFlag::Lose) {
    Ending::Win
  } else {
    Ending::Ambiguous
  };
  state.end_flag = match ending {
    Ending::Win => Some(EndFlag::Win),
    Ending::Lose => Some(EndFlag::Lose),
    Ending::Ambiguous => None,
  };
  info!(target: "survival", ending = ending.as_str(), hp = state.hp, turn = state.turn, stages = state.logs.len(), notes = state.notes.len(), "run finalized");
  ending
}

/// End of run, however the stage loop stopped: settle the ending, get the
/// review and write both artifacts. If `interrupt` resolves first the review
/// request is dropped and the fixed review is used instead.
#[instrument(level = "info", skip_all, fields(run_id = %state.run_id))]
pub async fn conclude<G: ContentGenerator>(
  gen: &G,
  config: &GameConfig,
  state: &mut GameState,
  console: &mut Console,
  interrupt: impl Future<Output = ()>,
) -> Ending {
  let max_turns = config.chapters.len() as u32;
  let ending = finalize(state, max_turns);
  console.say("\n======================================");
  console.say("             人生冒險結算");
  console.say("======================================");
  console.say(ending.message(max_turns));

  let review = tokio::select! {
    biased;
    _ = interrupt => {
      warn!(target: "survival", "interrupted while waiting for the review; using fallback review");
      seeds::fallback_review(state.logs.len(), state.hp)
    }
    review = content::generate_review(gen, &config.prompts, state, ending.as_str()) => review,
  };
  let summary = persist::summary_text(&review, &state.notes);

  let snapshot_path = config.output.snapshot_path();
  match persist::save_snapshot(&snapshot_path, state) {
    Ok(()) => console.say(format!("\n[系統] 遊戲狀態已儲存到：{}", snapshot_path.display())),
    Err(e) => error!(target: "survival", error = %e, "failed to save snapshot"),
  }
  let summary_path = config.output.summary_path();
  match persist::save_summary(&summary_path, &summary) {
    Ok(()) => console.say(format!("[系統] 人生回顧已儲存到：{}", summary_path.display())),
    Err(e) => error!(target: "survival", error = %e, "failed to save summary"),
  }

  console.say("\n===== 本次《亞洲人生存大挑戰》人生回顧 =====\n");
  console.say(&summary);
  ending
}
