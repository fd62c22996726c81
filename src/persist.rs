//! End-of-run artifacts: the JSON state snapshot and the plain-text summary.
//! Each is written once per run.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::domain::GameState;
use crate::error::GameError;
use crate::notes::NoteLedger;

/// Review text followed by the numbered note list.
pub fn summary_text(review: &str, notes: &NoteLedger) -> String {
  let mut out = String::from(review.trim_end());
  out.push_str("\n\n===== 本輪人生小筆記 =====\n");
  if notes.is_empty() {
    out.push_str("本輪尚無人生小筆記。\n");
  } else {
    out.push_str(&notes.numbered());
  }
  out
}

fn ensure_parent(path: &Path) -> Result<(), GameError> {
  if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
    fs::create_dir_all(dir)?;
  }
  Ok(())
}

pub fn save_snapshot(path: &Path, state: &GameState) -> Result<(), GameError> {
  ensure_parent(path)?;
  let json = serde_json::to_string_pretty(state)?;
  fs::write(path, json)?;
  info!(target: "survival", path = %path.display(), stages = state.logs.len(), "state snapshot saved");
  Ok(())
}

pub fn save_summary(path: &Path, text: &str) -> Result<(), GameError> {
  ensure_parent(path)?;
  fs::write(path, text)?;
  info!(target: "survival", path = %path.display(), chars = text.chars().count(), "summary saved");
  Ok(())
}
