//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// True if the char is a Han ideograph (CJK unified ideographs, extensions, compatibility block).
pub fn is_cjk(ch: char) -> bool {
  ('\u{4E00}'..='\u{9FFF}').contains(&ch)
    || ('\u{3400}'..='\u{4DBF}').contains(&ch)
    || ('\u{20000}'..='\u{2A6DF}').contains(&ch)
    || ('\u{2A700}'..='\u{2B73F}').contains(&ch)
    || ('\u{2B740}'..='\u{2B81F}').contains(&ch)
    || ('\u{2B820}'..='\u{2CEAF}').contains(&ch)
    || ('\u{F900}'..='\u{FAFF}').contains(&ch)
}

/// Remove every whitespace char, including the full-width space U+3000.
pub fn strip_whitespace(s: &str) -> String {
  s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Log-safe truncation for large strings. Counts chars, not bytes, so CJK text never splits mid-char.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  let total = s.chars().count();
  if total <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} chars total)", head, total)
  }
}

/// Flatten to a single line and keep at most `max` chars.
pub fn one_line(s: &str, max: usize) -> String {
  s.trim().replace(['\r', '\n'], " ").chars().take(max).collect()
}
