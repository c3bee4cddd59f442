//! Answer grading for the five Mega Challenge styles and the score rollup.
//!
//! Choice questions (multiple choice, error identification, listening) compare
//! option indices. Free-text questions (fill blank, scramble) go through
//! `strict_check`. Nothing here awards partial credit.

use serde::{Deserialize, Serialize};

use crate::domain::MegaTest;

/// Question category of the Mega Challenge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
  #[serde(rename = "mc")]
  MultipleChoice,
  #[serde(rename = "fill")]
  FillBlank,
  #[serde(rename = "error")]
  ErrorId,
  #[serde(rename = "scramble")]
  Scramble,
  #[serde(rename = "listening")]
  Listening,
}

impl Zone {
  pub const ALL: [Zone; 5] = [Zone::MultipleChoice, Zone::FillBlank, Zone::ErrorId, Zone::Scramble, Zone::Listening];

  pub fn takes_text(&self) -> bool {
    matches!(self, Zone::FillBlank | Zone::Scramble)
  }
}

/// A learner's answer: an option index or typed text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
  Choice(usize),
  Text(String),
}

/// Trim, collapse whitespace runs, lowercase and drop `. ? ! ,`.
pub fn normalize_answer(s: &str) -> String {
  s.split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
    .chars()
    .filter(|c| !matches!(c, '.' | '?' | '!' | ','))
    .collect()
}

/// Strict-but-lenient comparison used for free-text answers.
/// Empty input or empty target never matches.
pub fn strict_check(input: &str, target: &str) -> bool {
  if input.is_empty() || target.is_empty() {
    return false;
  }
  normalize_answer(input) == normalize_answer(target)
}

pub fn grade_choice(answer: Option<&AnswerValue>, correct: usize) -> bool {
  matches!(answer, Some(AnswerValue::Choice(i)) if *i == correct)
}

pub fn grade_text(answer: Option<&AnswerValue>, target: &str) -> bool {
  matches!(answer, Some(AnswerValue::Text(s)) if strict_check(s, target))
}

/// Correct counts per category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBoard {
  pub mc: usize,
  pub fill: usize,
  pub error: usize,
  pub scramble: usize,
  pub listening: usize,
  /// Matched pairs of the matching game. Reported, never part of the total.
  #[serde(rename = "match")]
  pub matching: usize,
}

impl ScoreBoard {
  /// Sum over the five graded categories.
  pub fn total_correct(&self) -> usize {
    Zone::ALL.iter().map(|z| self.get(*z)).sum()
  }

  pub fn get(&self, zone: Zone) -> usize {
    match zone {
      Zone::MultipleChoice => self.mc,
      Zone::FillBlank => self.fill,
      Zone::ErrorId => self.error,
      Zone::Scramble => self.scramble,
      Zone::Listening => self.listening,
    }
  }
}

fn hits(results: impl Iterator<Item = bool>) -> usize {
  results.filter(|ok| *ok).count()
}

/// Count correct submitted answers. `submitted` yields the answer for a
/// question only once it has been submitted.
pub fn tally<'a, F>(test: &MegaTest, submitted: F) -> ScoreBoard
where
  F: Fn(Zone, &str) -> Option<&'a AnswerValue>,
{
  ScoreBoard {
    mc: hits(test.multiple_choice.iter().map(|q| grade_choice(submitted(Zone::MultipleChoice, &q.id), q.correct_answer))),
    fill: hits(test.fill_blank.iter().map(|q| grade_text(submitted(Zone::FillBlank, &q.id), &q.correct_answer))),
    error: hits(test.error_id.iter().map(|q| grade_choice(submitted(Zone::ErrorId, &q.id), q.correct_option_index))),
    scramble: hits(test.scramble.iter().map(|q| grade_text(submitted(Zone::Scramble, &q.id), &q.correct_sentence))),
    listening: hits(test.listening.iter().map(|q| grade_choice(submitted(Zone::Listening, &q.id), q.correct_answer))),
    matching: 0,
  }
}

/// `round(correct / denominator × 10, 1 decimal)`; 0 for an empty battery.
pub fn score_out_of_ten(correct: usize, denominator: usize) -> f64 {
  if denominator == 0 {
    return 0.0;
  }
  ((correct as f64 / denominator as f64) * 100.0).round() / 10.0
}

/// Certificate grade band for a score out of 10.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Evaluation {
  pub text: &'static str,
  pub emoji: &'static str,
  pub level: &'static str,
  pub praise: &'static str,
}

pub fn evaluate(score: f64) -> Evaluation {
  if score >= 9.0 {
    Evaluation { text: "XUẤT SẮC", emoji: "🏆", level: "EXCELLENT", praise: "Con là một ngôi sao sáng nhất lớp Mrs. Dung!" }
  } else if score >= 7.0 {
    Evaluation { text: "KHÁ GIỎI", emoji: "🌟", level: "GREAT JOB", praise: "Con làm bài rất tuyệt vời, tiếp tục phát huy nhé!" }
  } else if score >= 5.0 {
    Evaluation { text: "CỐ GẮNG", emoji: "👍", level: "GOOD EFFORT", praise: "Con đã nỗ lực rất nhiều, Mrs. Dung tự hào về con!" }
  } else {
    Evaluation { text: "CẦN NỖ LỰC", emoji: "💪", level: "KEEP IT UP", praise: "Đừng nản lòng con nhé, bài sau mình làm tốt hơn nào!" }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testutil::sample_lesson;
  use std::collections::HashMap;

  #[test]
  fn strict_check_is_lenient_on_case_space_and_punctuation() {
    assert!(strict_check("The cat  sat.", "the cat sat"));
    assert!(strict_check("  Where is   my HAT?! ", "where is my hat"));
    assert!(strict_check("yes, I do", "Yes I do."));
    assert!(!strict_check("a dog", "a cat"));
  }

  #[test]
  fn strict_check_rejects_empty_sides() {
    assert!(!strict_check("", "cat"));
    assert!(!strict_check("cat", ""));
    assert!(!strict_check("", ""));
  }

  #[test]
  fn strict_check_does_not_strip_other_punctuation() {
    assert!(!strict_check("it's", "its"));
    assert!(!strict_check("cat;", "cat"));
  }

  #[test]
  fn choice_and_text_grading() {
    assert!(grade_choice(Some(&AnswerValue::Choice(2)), 2));
    assert!(!grade_choice(Some(&AnswerValue::Choice(1)), 2));
    assert!(!grade_choice(Some(&AnswerValue::Text("2".into())), 2));
    assert!(!grade_choice(None, 0));
    assert!(grade_text(Some(&AnswerValue::Text("Apple.".into())), "apple"));
    assert!(!grade_text(Some(&AnswerValue::Choice(0)), "apple"));
  }

  #[test]
  fn answer_value_decodes_untagged() {
    let a: AnswerValue = serde_json::from_str("3").unwrap();
    let b: AnswerValue = serde_json::from_str("\"the cat\"").unwrap();
    assert_eq!(a, AnswerValue::Choice(3));
    assert_eq!(b, AnswerValue::Text("the cat".into()));
  }

  #[test]
  fn rollup_of_thirty_correct_is_six() {
    let board = ScoreBoard { mc: 8, fill: 5, error: 10, scramble: 0, listening: 7, matching: 3 };
    assert_eq!(board.total_correct(), 30);
    assert_eq!(score_out_of_ten(board.total_correct(), 50), 6.0);
  }

  #[test]
  fn score_rounds_to_one_decimal() {
    assert_eq!(score_out_of_ten(33, 50), 6.6);
    assert_eq!(score_out_of_ten(1, 3), 3.3);
    assert_eq!(score_out_of_ten(2, 3), 6.7);
    assert_eq!(score_out_of_ten(50, 50), 10.0);
    assert_eq!(score_out_of_ten(0, 0), 0.0);
  }

  #[test]
  fn tally_counts_only_submitted_correct_answers() {
    let lesson = sample_lesson(10);
    let test = &lesson.practice.mega_test;
    let mut answers: HashMap<(Zone, String), AnswerValue> = HashMap::new();
    // 3 correct mc, 1 wrong mc
    for i in 0..3 {
      answers.insert((Zone::MultipleChoice, format!("mc{i}")), AnswerValue::Choice(i % 4));
    }
    answers.insert((Zone::MultipleChoice, "mc3".into()), AnswerValue::Choice(0));
    answers.insert((Zone::FillBlank, "fb0".into()), AnswerValue::Text(" APPLE0 ".into()));
    answers.insert((Zone::Scramble, "sc4".into()), AnswerValue::Text("the cat sat 4".into()));
    answers.insert((Zone::ErrorId, "er0".into()), AnswerValue::Choice(1));
    answers.insert((Zone::Listening, "li0".into()), AnswerValue::Choice(2));

    let board = tally(test, |zone, id| answers.get(&(zone, id.to_string())));
    assert_eq!(board, ScoreBoard { mc: 3, fill: 1, error: 1, scramble: 1, listening: 1, matching: 0 });
  }

  #[test]
  fn evaluation_bands() {
    assert_eq!(evaluate(9.0).level, "EXCELLENT");
    assert_eq!(evaluate(8.9).level, "GREAT JOB");
    assert_eq!(evaluate(5.0).level, "GOOD EFFORT");
    assert_eq!(evaluate(4.9).level, "KEEP IT UP");
  }
}
