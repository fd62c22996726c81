//! Built-in content: fixed option tables and the deterministic fallbacks used
//! whenever generated content is missing or fails validation.

use crate::domain::{ChoiceOption, ContentSource, Difficulty, GeneratedQuestion};

/// Used when neither the narration nor the backup request yields a note.
pub const FALLBACK_NOTE: &str = "能撐到這裡，本身就是一種天賦。";

fn opt(title: &str, description: &str, hp_change: i32, tag: &str) -> ChoiceOption {
  ChoiceOption {
    title: title.into(),
    description: description.into(),
    hp_change,
    tag: tag.into(),
    keyword: None,
    note: None,
    flavour: None,
  }
}

/// Stage 1. Fixed notes, no narration.
pub fn birth_options() -> Vec<ChoiceOption> {
  let entry = |keyword: &str, title: &str, hp_change: i32, tag: &str, note: &str, flavour: &str| ChoiceOption {
    keyword: Some(keyword.into()),
    note: Some(note.into()),
    flavour: Some(flavour.into()),
    ..opt(title, "", hp_change, tag)
  };
  vec![
    entry(
      "male",
      "男生（male）",
      -10,
      "male_default",
      "一出生就被預約責任，連選單都沒看見。",
      "長輩們露出「以後有人扛房貸了」的表情，你順利出生，順便背上一個看不見的『要有出息』Buff。",
    ),
    entry(
      "female",
      "女生（female）",
      -30,
      "female_hard_mode",
      "這不是妳的錯，是這片地圖太難。",
      "產房外安靜了三秒。有人說「女兒也不錯啦」，語氣卻一點都不篤定。",
    ),
    entry(
      "other",
      "其他（other）",
      -25,
      "non_binary",
      "世界很愛要你勾『男/女』，你可以先勾自己。",
      "你拒絕被二分表格框住，系統有點當機，但世界上多了一個問號。",
    ),
  ]
}

/// Stage 5.
pub fn children_options() -> Vec<ChoiceOption> {
  vec![
    opt("生一個小孩", "", 0, "child_one"),
    opt("生兩個小孩", "", 10, "child_two"),
    opt("不生小孩", "", -25, "child_none"),
  ]
}

/// Stage 3 fallback.
pub fn fallback_jobs() -> Vec<ChoiceOption> {
  vec![
    opt("連鎖餐飲店基層員工", "快節奏、長工時、薪水普通，長輩覺得不夠體面。", -25, "job_low_status"),
    opt("科技業輪班工程師", "薪水高但爆肝，家人滿意，你的週末可能不存在。", 10, "job_high_pay"),
    opt("基層公務員", "穩定、規律，是長輩最愛聽到的三個字：鐵飯碗。", 5, "job_stable"),
  ]
}

/// Stage 4 fallback.
pub fn fallback_partners() -> Vec<ChoiceOption> {
  vec![
    opt("家世很好但脾氣很差的人", "資源多、門當戶對，但一言不合就翻桌，兩家壓力都很大。", 5, "partner_family_approved"),
    opt("條件普通但個性很好的人", "背景普通、個性溫和，長輩不反對，也不會特別滿意。", 0, "partner_balanced"),
    opt("收入不穩但非常契合的靈魂伴侶", "價值觀同步，但長輩只看得到存摺，壓力可能很大。", -15, "partner_family_disapproved"),
  ]
}

/// Stage 6 fallback.
pub fn fallback_newyear_question() -> GeneratedQuestion {
  GeneratedQuestion {
    question: "最近過得怎麼樣？".into(),
    difficulty: Difficulty::Medium,
    answers: Vec::new(),
    source: ContentSource::Fallback,
  }
}

/// Stage 7 fallback. Its answer must itself pass the reference-answer filter.
pub fn fallback_kinship_question() -> GeneratedQuestion {
  GeneratedQuestion {
    question: "姑婆的公公要怎麼稱呼？".into(),
    difficulty: Difficulty::Extreme,
    answers: vec!["丈公".into()],
    source: ContentSource::Fallback,
  }
}

/// Review text used when the review request fails.
pub fn fallback_review(stages_played: usize, hp: u32) -> String {
  format!(
    "這一輪你走過了 {stages_played} 關，最後剩下 {hp} 點 HP。\
     不管長輩怎麼打分數，這些選擇拼起來，就是你自己版本的人生。"
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::validate::is_reasonable_kinship_answer;

  #[test]
  fn fallback_kinship_answer_passes_the_filter() {
    let q = fallback_kinship_question();
    assert!(q.answers.iter().all(|a| is_reasonable_kinship_answer(a)));
  }

  #[test]
  fn fixed_tables_have_three_distinct_options() {
    for set in [birth_options(), children_options(), fallback_jobs(), fallback_partners()] {
      assert_eq!(set.len(), 3);
      let mut titles: Vec<_> = set.iter().map(|o| o.title.as_str()).collect();
      titles.dedup();
      assert_eq!(titles.len(), 3);
    }
  }

  #[test]
  fn birth_options_carry_fixed_notes() {
    assert!(birth_options().iter().all(|o| o.note.is_some() && o.keyword.is_some()));
  }
}
