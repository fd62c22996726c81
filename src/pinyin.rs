//! Pinyin readings for revealed kinship answers, e.g. "丈公（zhàng gōng）".
use pinyin::ToPinyin;

/// Space-separated toned syllables for the Han characters in `word`.
/// Characters without a reading are skipped. Polyphones use the default
/// reading since there is no word segmentation.
pub fn reading(word: &str) -> String {
  word
    .chars()
    .filter_map(|ch| ch.to_pinyin())
    .map(|py| py.with_tone())
    .collect::<Vec<_>>()
    .join(" ")
}

/// `word（reading）`, or the bare word when nothing has a reading.
pub fn annotate(word: &str) -> String {
  let r = reading(word);
  if r.is_empty() {
    word.to_string()
  } else {
    format!("{word}（{r}）")
  }
}
