//! 亞洲人生存大挑戰 · seven-stage life survival game on the terminal.
//!
//! - Seven chapters, one hp counter, win / lose / ambiguous endings
//! - Stage content and narration from an OpenAI-compatible chat endpoint
//! - State snapshot + life review written once at the end of a run
//!
//! Important env variables:
//!   OPENAI_API_KEY      : required (asked on stdin when absent)
//!   OPENAI_BASE_URL     : default "https://api.openai.com/v1"
//!   OPENAI_MODEL        : default "gpt-4o-mini"
//!   OPENAI_TIMEOUT_SECS : per-request timeout, unset = none
//!   GAME_CONFIG_PATH    : path to TOML config (prompts, scoring, chapters, output)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod config;
mod console;
mod content;
mod domain;
mod error;
mod notes;
mod openai;
mod parse;
mod persist;
mod pinyin;
mod scoring;
mod seeds;
mod stages;
mod telemetry;
mod turn;
mod util;
mod validate;

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{error, info, warn};

use crate::config::GameConfig;
use crate::console::Console;
use crate::domain::{GameState, INITIAL_HP};
use crate::notes::NoteLedger;
use crate::openai::OpenAI;
use crate::turn::TurnController;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let config = GameConfig::load_from_env();
  let mut console = Console::stdio();

  let Some(gen) = connect(&mut console).await else {
    console.say("沒有可用的 API Key，這一輪人生先不開局。");
    return Ok(());
  };
  info!(target: "survival", model = %gen.model, base_url = %gen.base_url, "generator ready");

  print_banner(&mut console, config.chapters.len());
  if console.ask_or_default("按 Enter 開始你的人生……", &NoteLedger::new(), "").await.is_err() {
    warn!(target: "survival", "input closed before the first stage");
  }

  let mut state = GameState::new(world_seed());
  info!(target: "survival", run_id = %state.run_id, world_seed = state.world_seed, "run started");

  {
    let mut controller = TurnController::new(&gen, &mut console, &config);
    let res = tokio::select! {
      res = controller.run(&mut state) => res,
      _ = interrupted() => {
        info!(target: "survival", "interrupted; ending the run here");
        Ok(())
      }
    };
    if let Err(e) = res {
      error!(target: "survival", error = %e, "stage loop stopped");
    }
  }

  // A further Ctrl-C only cuts the review short; both artifacts are still written.
  turn::conclude(&gen, &config, &mut state, &mut console, interrupted()).await;
  console.say("\n謝謝你讓自己認真活過這一輪。如果哪天想重開一輪，我們再來。");
  Ok(())
}

/// Client from env, or from a key typed on the console. None aborts the run.
async fn connect(console: &mut Console) -> Option<OpenAI> {
  if let Some(gen) = OpenAI::from_env(None) {
    return Some(gen);
  }
  console.say("請輸入你的 OpenAI API Key：");
  let key = match console.ask_or_default("> ", &NoteLedger::new(), "").await {
    Ok(k) => k,
    Err(e) => {
      warn!(target: "survival", error = %e, "no API key entered");
      return None;
    }
  };
  let gen = OpenAI::from_env(Some(key))?;
  console.say("\n✔ API Key 載入成功。來體驗一輪《亞洲人生存大挑戰》吧。\n");
  Some(gen)
}

fn print_banner(console: &mut Console, chapters: usize) {
  console.say("============================================");
  console.say("           《亞洲人生存大挑戰》");
  console.say("============================================\n");
  console.say("歡迎來到亞洲人生模擬器。");
  console.say(format!("這次你會經歷 {chapters} 關："));
  console.say("從出生、選科系、第一份工作、結婚、生不生小孩，");
  console.say("一路到過年大拷問，以及最終的親戚稱謂魔王關。\n");
  console.say("【遊戲規則】");
  console.say(format!("- 初始生命值 HP = {INITIAL_HP}。"));
  console.say("- 每一關都會對你丟出一點東西：期待、比較、或靈魂拷問。");
  console.say("- 程式會用一套固定規則幫你算：這樣選，在亞洲傳統裡會不會被扣血。");
  console.say("- 每關都會留下至少一則「人生小筆記」。");
  console.say("- 只要 HP 歸零，無論在第幾關，都直接 Game Over。\n");
  console.say("【小提示】");
  console.say("- 任何一關輸入時，只要打：note，就可以隨時翻開人生小筆記小抄。\n");
}

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves.
async fn interrupted() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "survival", error = %e, "Ctrl-C handler unavailable");
    std::future::pending::<()>().await;
  }
}

fn world_seed() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_nanos() as u64)
    .unwrap_or_default()
}
