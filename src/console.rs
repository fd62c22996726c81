//! Line-based interactive surface.
//!
//! Input arrives over a channel so the turn loop can await it (and be
//! interrupted) without blocking the runtime; stdin is pumped into that
//! channel by a plain thread. `note` is reserved at every prompt and prints
//! the ledger instead of answering.

use std::fmt::Display;
use std::io::{BufRead, Write};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::debug;

use crate::domain::ChoiceOption;
use crate::error::GameError;
use crate::notes::NoteLedger;
use crate::scoring::ScoringEngine;

pub const NOTE_KEYWORD: &str = "note";

pub struct Console {
  input: UnboundedReceiver<String>,
  out: Box<dyn Write + Send>,
  write_failed: bool,
}

impl Console {
  pub fn new(input: UnboundedReceiver<String>, out: Box<dyn Write + Send>) -> Self {
    Self { input, out, write_failed: false }
  }

  /// Console on stdin/stdout. The reader thread ends with stdin (or when the
  /// console is dropped) and is never joined.
  pub fn stdio() -> Self {
    let (tx, rx) = unbounded_channel();
    std::thread::spawn(move || {
      for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        if tx.send(line).is_err() {
          break;
        }
      }
    });
    Self::new(rx, Box::new(std::io::stdout()))
  }

  /// Print one line of story text.
  pub fn say(&mut self, text: impl Display) {
    let res = writeln!(self.out, "{text}");
    self.check_write(res);
  }

  /// Output errors never stop the run; the first one is logged.
  fn check_write(&mut self, res: std::io::Result<()>) {
    if let Err(e) = res {
      if !self.write_failed {
        debug!(target: "survival", error = %e, "console output failed; later write errors are not logged");
        self.write_failed = true;
      }
    }
  }

  pub fn show_notes(&mut self, notes: &NoteLedger) {
    self.say("\n===== 目前累積的人生小筆記 =====");
    if notes.is_empty() {
      self.say("暫時還沒有，但光是活到這裡就已經很不容易了。");
    } else {
      let listing = notes.numbered();
      self.say(listing.trim_end());
    }
    self.say("====================================\n");
  }

  async fn read_line(&mut self, prompt: &str) -> Result<String, GameError> {
    let res = write!(self.out, "{prompt}").and_then(|()| self.out.flush());
    self.check_write(res);
    let line = self.input.recv().await.ok_or(GameError::InputClosed)?;
    Ok(line.trim().to_string())
  }

  /// Non-empty answer; blank input re-prompts.
  pub async fn ask(&mut self, prompt: &str, notes: &NoteLedger) -> Result<String, GameError> {
    loop {
      let line = self.read_line(prompt).await?;
      if line.eq_ignore_ascii_case(NOTE_KEYWORD) {
        self.show_notes(notes);
        continue;
      }
      if line.is_empty() {
        self.say("你可以隨便打幾個字，別讓自己完全消失在這一關。");
        continue;
      }
      return Ok(line);
    }
  }

  /// Like `ask`, but blank input returns `default`.
  pub async fn ask_or_default(&mut self, prompt: &str, notes: &NoteLedger, default: &str) -> Result<String, GameError> {
    loop {
      let line = self.read_line(prompt).await?;
      if line.eq_ignore_ascii_case(NOTE_KEYWORD) {
        self.show_notes(notes);
        continue;
      }
      if line.is_empty() {
        return Ok(default.to_string());
      }
      return Ok(line);
    }
  }

  /// Ordinal choice from `options`; out-of-range input re-prompts with `retry`.
  pub async fn choose<'o>(
    &mut self,
    prompt: &str,
    retry: &str,
    notes: &NoteLedger,
    scoring: &ScoringEngine<'_>,
    options: &'o [ChoiceOption],
  ) -> Result<&'o ChoiceOption, GameError> {
    loop {
      let line = self.ask(prompt, notes).await?;
      match scoring.select_option(options, &line) {
        Ok(opt) => return Ok(opt),
        Err(e) => {
          debug!(target: "stage", error = %e, "selection rejected");
          self.say(retry);
        }
      }
    }
  }
}

#[cfg(test)]
pub mod testing {
  //! Scripted console for tests: pre-loaded input lines, captured output.

  use std::sync::{Arc, Mutex};

  use super::*;

  #[derive(Clone, Default)]
  pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

  impl SharedBuf {
    pub fn contents(&self) -> String {
      String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
  }

  impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
      self.0.lock().unwrap().extend_from_slice(buf);
      Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
      Ok(())
    }
  }

  /// Console fed with `lines`; input closes after the last one.
  pub fn scripted(lines: &[&str]) -> (Console, SharedBuf) {
    let (tx, rx) = unbounded_channel();
    for l in lines {
      tx.send(l.to_string()).unwrap();
    }
    drop(tx);
    let buf = SharedBuf::default();
    (Console::new(rx, Box::new(buf.clone())), buf)
  }
}
