//! Practice sessions: one learner working through one lesson.
//!
//! A session owns the answer sheet for the Mega Challenge, the flashcard deck
//! over the vocabulary, the matching board and one cursor per question set.
//! Grading always reads the correct answers embedded in the lesson.

use std::{
  collections::{HashMap, HashSet},
  sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::domain::{LessonPlan, MegaTest, VocabularyItem};
use crate::error::AppError;
use crate::grading::{evaluate, grade_choice, grade_text, score_out_of_ten, tally, AnswerValue, Evaluation, ScoreBoard, Zone};
use crate::widgets::{CardFace, FlashcardAction, FlashcardDeck, MatchOutcome, MatchingBoard, QuestionCursor};

type QuestionKey = (Zone, String);

/// Answers and submission flags, keyed by category and question id.
#[derive(Clone, Debug, Default)]
pub struct AnswerSheet {
  answers: HashMap<QuestionKey, AnswerValue>,
  submitted: HashSet<QuestionKey>,
}

impl AnswerSheet {
  /// Record or replace an answer. Rejected once the question is submitted.
  pub fn answer(&mut self, zone: Zone, id: &str, value: AnswerValue) -> Result<(), AppError> {
    if self.is_submitted(zone, id) {
      return Err(AppError::AlreadySubmitted(id.to_string()));
    }
    self.answers.insert((zone, id.to_string()), value);
    Ok(())
  }

  /// Lock the question. Idempotent; submitting with no answer is allowed.
  pub fn submit(&mut self, zone: Zone, id: &str) {
    self.submitted.insert((zone, id.to_string()));
  }

  pub fn is_submitted(&self, zone: Zone, id: &str) -> bool {
    self.submitted.contains(&(zone, id.to_string()))
  }

  /// The answer only if the question has been submitted.
  pub fn submitted_answer(&self, zone: Zone, id: &str) -> Option<&AnswerValue> {
    let key = (zone, id.to_string());
    if self.submitted.contains(&key) {
      self.answers.get(&key)
    } else {
      None
    }
  }
}

/// Correct answer of one question, as stored in the lesson.
#[derive(Clone, Debug, PartialEq)]
pub struct AnswerKey {
  pub value: AnswerValue,
  /// Human-readable form (option text for choice questions).
  pub display: String,
  pub explanation: String,
}

fn option_text(options: &[String], index: usize) -> String {
  options.get(index).cloned().unwrap_or_default()
}

/// Look up the correct answer of `id` in the given category.
pub fn answer_key(test: &MegaTest, zone: Zone, id: &str) -> Option<AnswerKey> {
  match zone {
    Zone::MultipleChoice => test.multiple_choice.iter().find(|q| q.id == id).map(|q| AnswerKey {
      value: AnswerValue::Choice(q.correct_answer),
      display: option_text(&q.options, q.correct_answer),
      explanation: q.explanation.clone(),
    }),
    Zone::FillBlank => test.fill_blank.iter().find(|q| q.id == id).map(|q| AnswerKey {
      value: AnswerValue::Text(q.correct_answer.clone()),
      display: q.correct_answer.clone(),
      explanation: q.explanation.clone().unwrap_or_default(),
    }),
    Zone::ErrorId => test.error_id.iter().find(|q| q.id == id).map(|q| AnswerKey {
      value: AnswerValue::Choice(q.correct_option_index),
      display: option_text(&q.options, q.correct_option_index),
      explanation: q.explanation.clone(),
    }),
    Zone::Scramble => test.scramble.iter().find(|q| q.id == id).map(|q| AnswerKey {
      value: AnswerValue::Text(q.correct_sentence.clone()),
      display: q.correct_sentence.clone(),
      explanation: q.translation.clone(),
    }),
    Zone::Listening => test.listening.iter().find(|q| q.id == id).map(|q| AnswerKey {
      value: AnswerValue::Choice(q.correct_answer),
      display: option_text(&q.options, q.correct_answer),
      explanation: q.explanation.clone(),
    }),
  }
}

pub fn set_len(test: &MegaTest, zone: Zone) -> usize {
  match zone {
    Zone::MultipleChoice => test.multiple_choice.len(),
    Zone::FillBlank => test.fill_blank.len(),
    Zone::ErrorId => test.error_id.len(),
    Zone::Scramble => test.scramble.len(),
    Zone::Listening => test.listening.len(),
  }
}

fn zone_name(zone: Zone) -> &'static str {
  match zone {
    Zone::MultipleChoice => "multipleChoice",
    Zone::FillBlank => "fillBlank",
    Zone::ErrorId => "errorId",
    Zone::Scramble => "scramble",
    Zone::Listening => "listening",
  }
}

/// One message per question set whose size differs from `expected`.
pub fn set_size_warnings(test: &MegaTest, expected: usize) -> Vec<String> {
  Zone::ALL
    .iter()
    .filter(|z| set_len(test, **z) != expected)
    .map(|z| format!("{} has {} questions, expected {}", zone_name(*z), set_len(test, *z), expected))
    .collect()
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResult {
  pub correct: bool,
  pub expected: String,
  pub explanation: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardView {
  pub index: usize,
  pub total: usize,
  pub face: CardFace,
  pub card: Option<VocabularyItem>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingView {
  pub outcome: MatchOutcome,
  pub selected: Option<String>,
  pub matched: Vec<String>,
  pub pairs: usize,
  pub won: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
  pub scores: ScoreBoard,
  pub total_correct: usize,
  pub out_of: usize,
  pub score: f64,
  pub evaluation: Evaluation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSide {
  Left,
  Right,
}

pub struct PracticeSession {
  pub lesson_id: String,
  lesson: Arc<LessonPlan>,
  sheet: AnswerSheet,
  deck: FlashcardDeck,
  matching: MatchingBoard,
  cursors: HashMap<Zone, QuestionCursor>,
}

impl PracticeSession {
  pub fn new(lesson_id: String, lesson: Arc<LessonPlan>) -> Self {
    let test = &lesson.practice.mega_test;
    let deck = FlashcardDeck::new(lesson.vocabulary.len());
    let matching = MatchingBoard::new(test.matching.iter().map(|p| p.id.clone()).collect());
    let cursors = Zone::ALL.iter().map(|z| (*z, QuestionCursor::new(set_len(test, *z)))).collect();
    Self { lesson_id, lesson, sheet: AnswerSheet::default(), deck, matching, cursors }
  }

  pub fn lesson(&self) -> &LessonPlan {
    &self.lesson
  }

  fn key_for(&self, zone: Zone, question_id: &str) -> Result<AnswerKey, AppError> {
    answer_key(&self.lesson.practice.mega_test, zone, question_id)
      .ok_or_else(|| AppError::NotFound(format!("question {}", question_id)))
  }

  /// Store an answer. Choice categories take an index, fill/scramble take text.
  pub fn answer(&mut self, zone: Zone, question_id: &str, value: AnswerValue) -> Result<(), AppError> {
    self.key_for(zone, question_id)?;
    match (&value, zone.takes_text()) {
      (AnswerValue::Text(_), true) | (AnswerValue::Choice(_), false) => {}
      (_, true) => return Err(AppError::InvalidInput("Câu này cần nhập chữ con nhé!".into())),
      (_, false) => return Err(AppError::InvalidInput("Câu này cần chọn một đáp án con nhé!".into())),
    }
    self.sheet.answer(zone, question_id, value)
  }

  /// Submit and grade one question.
  pub fn submit(&mut self, zone: Zone, question_id: &str) -> Result<SubmitResult, AppError> {
    let key = self.key_for(zone, question_id)?;
    self.sheet.submit(zone, question_id);
    let given = self.sheet.submitted_answer(zone, question_id);
    let correct = match &key.value {
      AnswerValue::Choice(i) => grade_choice(given, *i),
      AnswerValue::Text(t) => grade_text(given, t),
    };
    Ok(SubmitResult { correct, expected: key.display, explanation: key.explanation })
  }

  pub fn next_question(&mut self, zone: Zone) -> usize {
    self.cursors.entry(zone).or_default().next()
  }

  pub fn flashcard(&mut self, action: Option<FlashcardAction>) -> FlashcardView {
    if let Some(a) = action {
      self.deck.apply(a);
    }
    FlashcardView {
      index: self.deck.index(),
      total: self.deck.len(),
      face: self.deck.face(),
      card: self.lesson.vocabulary.get(self.deck.index()).cloned(),
    }
  }

  pub fn matching_click(&mut self, side: MatchSide, pair_id: &str) -> Result<MatchingView, AppError> {
    let outcome = match side {
      MatchSide::Left => self.matching.select_left(pair_id)?,
      MatchSide::Right => self.matching.select_right(pair_id)?,
    };
    Ok(self.matching_view(outcome))
  }

  pub fn matching_replay(&mut self) -> MatchingView {
    self.matching.replay();
    self.matching_view(MatchOutcome::Ignored)
  }

  fn matching_view(&self, outcome: MatchOutcome) -> MatchingView {
    let matched = self
      .lesson
      .practice
      .mega_test
      .matching
      .iter()
      .filter(|p| self.matching.is_matched(&p.id))
      .map(|p| p.id.clone())
      .collect();
    MatchingView {
      outcome,
      selected: self.matching.selected().map(str::to_string),
      matched,
      pairs: self.matching.pair_count(),
      won: self.matching.is_won(),
    }
  }

  /// Per-category counts, the score out of 10 and its grade band.
  pub fn score(&self, scoring: &ScoringConfig) -> ScoreSummary {
    let test = &self.lesson.practice.mega_test;
    let mut scores = tally(test, |zone, id| self.sheet.submitted_answer(zone, id));
    scores.matching = self.matching.matched_count();

    let out_of = if scoring.normalize_by_actual_count {
      Zone::ALL.iter().map(|z| set_len(test, *z)).sum()
    } else {
      Zone::ALL.len() * scoring.expected_set_size
    };
    let total_correct = scores.total_correct();
    let score = score_out_of_ten(total_correct, out_of);
    ScoreSummary { scores, total_correct, out_of, score, evaluation: evaluate(score) }
  }
}
