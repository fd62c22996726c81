//! Append-only, deduplicated ledger of "life notes".

use serde::{Deserialize, Serialize};

/// Insertion order is the chronological record and is kept as-is.
/// Serialized as a plain JSON array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteLedger(Vec<String>);

impl NoteLedger {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a note unless it is blank or already present (exact match after trim).
  /// Returns true when the ledger changed.
  pub fn append(&mut self, note: &str) -> bool {
    let note = note.trim();
    if note.is_empty() || self.0.iter().any(|n| n == note) {
      return false;
    }
    self.0.push(note.to_string());
    true
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.0.iter().map(String::as_str)
  }

  /// `1. first\n2. second\n` style listing used by the note display and the summary.
  pub fn numbered(&self) -> String {
    self
      .iter()
      .enumerate()
      .map(|(i, n)| format!("{}. {}\n", i + 1, n))
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn duplicates_and_blanks_are_ignored() {
    let mut l = NoteLedger::new();
    assert!(l.append("你不是成績單附屬品。"));
    assert!(!l.append("   "));
    assert!(!l.append(""));
    assert!(l.append("有些沉默是在保護自己。"));
    assert!(!l.append("你不是成績單附屬品。"));
    assert!(!l.append("  你不是成績單附屬品。  "));
    assert_eq!(l.len(), 2);
  }

  #[test]
  fn first_insertion_order_survives_duplicates() {
    let mut l = NoteLedger::new();
    for n in ["b", "a", "b", "c", "a"] {
      l.append(n);
    }
    assert_eq!(l.iter().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    assert_eq!(l.numbered(), "1. b\n2. a\n3. c\n");
  }

  #[test]
  fn serializes_as_plain_array() {
    let mut l = NoteLedger::new();
    l.append("一");
    assert_eq!(serde_json::to_string(&l).unwrap(), r#"["一"]"#);
  }
}
