//! Game configuration (prompts, score tables, chapters, output paths) from TOML.
//!
//! Everything has a built-in default; `GAME_CONFIG_PATH` may point at a TOML
//! file overriding any section. The loaded value is immutable for the run.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::scoring::ScoreTables;
use crate::stages::StageKind;

#[derive(Clone, Debug, Deserialize)]
pub struct GameConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub scoring: ScoreTables,
  #[serde(default)]
  pub output: OutputConfig,
  #[serde(default = "default_chapters")]
  pub chapters: Vec<Chapter>,
}

impl Default for GameConfig {
  fn default() -> Self {
    Self {
      prompts: Prompts::default(),
      scoring: ScoreTables::default(),
      output: OutputConfig::default(),
      chapters: default_chapters(),
    }
  }
}

/// One entry of the stage table: display name + which handler resolves it.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Chapter {
  pub name: String,
  pub kind: StageKind,
}

pub fn default_chapters() -> Vec<Chapter> {
  [
    ("出生：決定性別開局", StageKind::Birth),
    ("大學志願：未來科系選擇", StageKind::Major),
    ("第一份工作：三條人生起跑線", StageKind::FirstJob),
    ("結婚對象：誰陪你一起被比較", StageKind::Marriage),
    ("生小孩：要不要生，生幾個", StageKind::Children),
    ("過年大拷問：長輩玄學問候術", StageKind::NewYear),
    ("親戚稱謂魔王關：你到底叫什麼", StageKind::Kinship),
  ]
  .into_iter()
  .map(|(name, kind)| Chapter { name: name.into(), kind })
  .collect()
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
  pub dir: PathBuf,
  pub snapshot_file: String,
  pub summary_file: String,
}

impl Default for OutputConfig {
  fn default() -> Self {
    Self {
      dir: PathBuf::from("survival_output"),
      snapshot_file: "save.json".into(),
      summary_file: "summary.txt".into(),
    }
  }
}

impl OutputConfig {
  pub fn snapshot_path(&self) -> PathBuf {
    self.dir.join("state").join(&self.snapshot_file)
  }

  pub fn summary_path(&self) -> PathBuf {
    self.dir.join(&self.summary_file)
  }
}

/// Prompts sent to the content generator. Templates use `{key}` placeholders.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub outcome_system: String,
  pub outcome_user_template: String,
  pub note_backup_system: String,
  pub note_backup_user: String,
  pub jobs_system: String,
  pub jobs_user: String,
  pub partners_system: String,
  pub partners_user: String,
  pub newyear_system: String,
  pub newyear_user: String,
  pub style_system: String,
  pub style_user_template: String,
  pub kinship_system: String,
  pub kinship_user: String,
  pub review_system: String,
  pub review_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      outcome_system: "你是文字冒險遊戲《亞洲人生存大挑戰》的旁白。根據關卡名稱、背景情境、玩家選擇與 HP 變化，\
        寫出本關結果敘述與一句「人生小筆記」。\n\
        result：繁體中文，100～200 字，有畫面感，微靠北、微自嘲但溫柔，不提分數、程式或 JSON。\n\
        note：繁體中文，8～20 字的短句金句，幽默帶點自嘲。\n\
        只輸出 JSON：{\"result\": \"...\", \"note\": \"...\"}".into(),
      outcome_user_template: "【關卡名稱】\n{stage}\n\n【背景情境】\n{context}\n\n【玩家選擇】\n{choice}\n\n\
        【HP 變化】\n{hp_change}\n\n【評分標籤】\n{tag}\n\n請產生 result 與 note。".into(),
      note_backup_system: "你是人生小筆記產生器：幽默靠北、8～20 字的短句金句。".into(),
      note_backup_user: "請寫一句人生小筆記，使用繁體中文。".into(),
      jobs_system: "你是人生模擬遊戲的關卡設計師，要設計「第一份工作」的三個職缺。只輸出 JSON：\n\
        {\"jobs\": [{\"title\": \"...\", \"description\": \"...\", \"hidden_hp\": -15, \"tag\": \"job_xxx\"}, ...]}\n\
        規則：三個工作彼此不同；description 80～140 字，描述現實壓力、家庭期待與工作氛圍；\
        hidden_hp 介於 -45～+20，越符合亞洲家族期待越高；tag 為 job_high_pay / job_low_status / job_stable / job_creative 等英文標籤。".into(),
      jobs_user: "請產生三個第一份工作的選項。".into(),
      partners_system: "你是人生模擬遊戲的關卡設計師，要設計『結婚對象』的三個選項。只輸出 JSON：\n\
        {\"partners\": [{\"title\": \"...\", \"description\": \"...\", \"hidden_hp\": 5, \"tag\": \"partner_xxx\"}, ...]}\n\
        規則：三位對象分別是長輩滿意、尚可接受、不能接受的類型；title 寫類型且不特別提及性別；\
        description 80～140 字，可以戲劇化；hidden_hp 介於 +10～-45；\
        tag 為 partner_family_approved / partner_balanced / partner_disapproved 等英文標籤。".into(),
      partners_user: "請產生三位結婚對象的選項，只輸出 JSON。".into(),
      newyear_system: "你負責設計「過年長輩拷問」題目。用繁體中文出一題典型問題（收入、房子、婚姻、小孩、升遷等），\
        並標註難度：low 關心近況；medium 問薪水、房租、成績；high 問買房、結婚、生小孩或比較；\
        extreme 多重壓力一起來。只輸出 JSON：{\"question\": \"...\", \"difficulty\": \"low|medium|high|extreme\"}".into(),
      newyear_user: "請產生一個過年長輩會問的拷問問題，並標註難度。".into(),
      style_system: "你是語氣分析器，判斷晚輩回答長輩過年拷問的風格：\n\
        balanced 不炫耀不自貶、客氣留餘地；bragging 炫耀；too_humble 過度自貶；\
        defensive 防禦反擊；refuse 拒答或打哈哈；other 無法判斷。\n\
        只輸出 JSON：{\"answer_style\": \"...\"}".into(),
      style_user_template: "【長輩提問】\n{question}\n\n【晚輩回答】\n{answer}".into(),
      kinship_system: "你專門設計華人親戚稱謂魔王題，題型固定為「你的 Y 要怎麼稱呼？」，Y 由 2～6 層親屬關係組成，\
        例如「你的表哥的老婆的爸爸」。難度：medium 2～3 層；high 3～4 層；extreme 4～6 層且角色不重複。\n\
        只輸出 JSON：{\"question\": \"...\", \"difficulty\": \"medium|high|extreme\", \"answers\": [\"...\"]}\n\
        answers 至少一個正確稱謂，不得包含錯誤或不屬於華人稱謂系統的詞語。".into(),
      kinship_user: "請出一題親戚稱謂魔王題。".into(),
      review_system: "你是《亞洲人生存大挑戰》的結局旁白，像很懂亞洲家庭文化的朋友在宵夜攤陪玩家聊天。\n\
        只能根據 logs 裡實際發生過的關卡回顧，不得提到玩家沒走到的關卡。\n\
        繁體中文 400～700 字，依序回顧每一關的事件、玩家選擇與心情，自然帶入當關的人生小筆記；\
        可以微靠北但要尊重玩家，不提 JSON、程式、分數等技術細節。".into(),
      review_user_template: "【完整遊戲紀錄 logs】\n{logs}\n\n【玩家最終狀態】\n- 最後 HP：{hp}\n- 結局：{ending}\n\
        - 實際走到第幾關：{stages}\n- 累積的人生小筆記：\n{notes}\n\n請寫出人生回顧。".into(),
    }
  }
}

impl GameConfig {
  /// Defaults, or the TOML at `GAME_CONFIG_PATH`. Errors are logged and fall back to defaults.
  pub fn load_from_env() -> Self {
    let Ok(path) = std::env::var("GAME_CONFIG_PATH") else {
      return Self::default().checked();
    };
    match std::fs::read_to_string(&path) {
      Ok(s) => match Self::from_toml(&s) {
        Ok(cfg) => {
          info!(target: "survival", %path, "Loaded game config (TOML)");
          cfg
        }
        Err(e) => {
          error!(target: "survival", %path, error = %e, "Failed to parse TOML config; using defaults");
          Self::default().checked()
        }
      },
      Err(e) => {
        error!(target: "survival", %path, error = %e, "Failed to read TOML config file; using defaults");
        Self::default().checked()
      }
    }
  }

  pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
    toml::from_str::<GameConfig>(s).map(Self::checked)
  }

  /// Replace invalid sections with their defaults.
  fn checked(mut self) -> Self {
    if let Err(e) = self.scoring.validate() {
      warn!(target: "survival", error = %e, "Invalid scoring config; using built-in tables");
      self.scoring = ScoreTables::default();
    }
    if self.chapters.is_empty() {
      warn!(target: "survival", "Empty chapter table; using built-in chapters");
      self.chapters = default_chapters();
    }
    self
  }
}
