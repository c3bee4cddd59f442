//! Small state machines behind the study widgets: flashcards, the matching
//! game and the per-category question cursor.
//!
//! They hold positions and selections only; the content lives in the lesson.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardFace {
  #[default]
  Front,
  Back,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashcardAction {
  Next,
  Prev,
  Flip,
}

/// Circular vocabulary deck. Moving always shows the front of the new card.
#[derive(Clone, Debug)]
pub struct FlashcardDeck {
  len: usize,
  index: usize,
  face: CardFace,
}

impl FlashcardDeck {
  pub fn new(len: usize) -> Self {
    Self { len, index: 0, face: CardFace::Front }
  }

  pub fn index(&self) -> usize {
    self.index
  }

  pub fn face(&self) -> CardFace {
    self.face
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn flip(&mut self) {
    self.face = match self.face {
      CardFace::Front => CardFace::Back,
      CardFace::Back => CardFace::Front,
    };
  }

  pub fn next(&mut self) {
    if self.is_empty() {
      return;
    }
    self.face = CardFace::Front;
    self.index = (self.index + 1) % self.len;
  }

  pub fn prev(&mut self) {
    if self.is_empty() {
      return;
    }
    self.face = CardFace::Front;
    self.index = (self.index + self.len - 1) % self.len;
  }

  pub fn apply(&mut self, action: FlashcardAction) {
    match action {
      FlashcardAction::Next => self.next(),
      FlashcardAction::Prev => self.prev(),
      FlashcardAction::Flip => self.flip(),
    }
  }
}

/// What a click on the matching board did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
  Selected,
  Matched,
  /// Wrong right-hand card; the selection is dropped, nothing is counted.
  Mismatch,
  Ignored,
}

/// Pairing game over the lesson's matching pairs.
#[derive(Clone, Debug)]
pub struct MatchingBoard {
  pair_ids: Vec<String>,
  selected_left: Option<String>,
  matched: HashSet<String>,
}

impl MatchingBoard {
  pub fn new(pair_ids: Vec<String>) -> Self {
    Self { pair_ids, selected_left: None, matched: HashSet::new() }
  }

  fn check_known(&self, id: &str) -> Result<(), AppError> {
    if self.pair_ids.iter().any(|p| p == id) {
      Ok(())
    } else {
      Err(AppError::NotFound(format!("matching pair {}", id)))
    }
  }

  pub fn select_left(&mut self, id: &str) -> Result<MatchOutcome, AppError> {
    self.check_known(id)?;
    if self.matched.contains(id) {
      return Ok(MatchOutcome::Ignored);
    }
    self.selected_left = Some(id.to_string());
    Ok(MatchOutcome::Selected)
  }

  pub fn select_right(&mut self, id: &str) -> Result<MatchOutcome, AppError> {
    self.check_known(id)?;
    if self.matched.contains(id) {
      return Ok(MatchOutcome::Ignored);
    }
    match self.selected_left.take() {
      None => Ok(MatchOutcome::Ignored),
      Some(left) if left == id => {
        self.matched.insert(left);
        Ok(MatchOutcome::Matched)
      }
      Some(_) => Ok(MatchOutcome::Mismatch),
    }
  }

  pub fn selected(&self) -> Option<&str> {
    self.selected_left.as_deref()
  }

  pub fn is_matched(&self, id: &str) -> bool {
    self.matched.contains(id)
  }

  pub fn matched_count(&self) -> usize {
    self.matched.len()
  }

  pub fn pair_count(&self) -> usize {
    self.pair_ids.len()
  }

  pub fn is_won(&self) -> bool {
    !self.pair_ids.is_empty() && self.matched.len() == self.pair_ids.len()
  }

  pub fn replay(&mut self) {
    self.matched.clear();
    self.selected_left = None;
  }
}

/// Position inside one question set.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuestionCursor {
  len: usize,
  index: usize,
}

impl QuestionCursor {
  pub fn new(len: usize) -> Self {
    Self { len, index: 0 }
  }

  /// Advance; wraps to the first question after the last one.
  pub fn next(&mut self) -> usize {
    if self.len > 0 {
      self.index = (self.index + 1) % self.len;
    }
    self.index
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn flashcards_wrap_both_ways() {
    let mut deck = FlashcardDeck::new(5);
    deck.prev();
    assert_eq!(deck.index(), 4);
    deck.next();
    assert_eq!(deck.index(), 0);
    for _ in 0..7 {
      deck.next();
    }
    assert_eq!(deck.index(), 2);
  }

  #[test]
  fn navigating_turns_card_to_front() {
    let mut deck = FlashcardDeck::new(3);
    deck.flip();
    assert_eq!(deck.face(), CardFace::Back);
    deck.apply(FlashcardAction::Next);
    assert_eq!(deck.face(), CardFace::Front);
    assert_eq!(deck.index(), 1);
    deck.flip();
    deck.flip();
    assert_eq!(deck.face(), CardFace::Front);
  }

  #[test]
  fn empty_deck_stays_put() {
    let mut deck = FlashcardDeck::new(0);
    deck.next();
    deck.prev();
    assert_eq!(deck.index(), 0);
  }

  fn board() -> MatchingBoard {
    MatchingBoard::new(vec!["m1".into(), "m2".into(), "m3".into()])
  }

  #[test]
  fn matching_won_only_when_every_pair_matched() {
    let mut b = board();
    for id in ["m1", "m2"] {
      assert_eq!(b.select_left(id).unwrap(), MatchOutcome::Selected);
      assert_eq!(b.select_right(id).unwrap(), MatchOutcome::Matched);
    }
    assert!(!b.is_won());
    b.select_left("m3").unwrap();
    b.select_right("m3").unwrap();
    assert!(b.is_won());
    assert_eq!(b.matched_count(), 3);
  }

  #[test]
  fn mismatch_clears_selection_without_penalty() {
    let mut b = board();
    b.select_left("m1").unwrap();
    assert_eq!(b.select_right("m2").unwrap(), MatchOutcome::Mismatch);
    assert_eq!(b.selected(), None);
    assert_eq!(b.matched_count(), 0);
    assert_eq!(b.select_right("m1").unwrap(), MatchOutcome::Ignored);
  }

  #[test]
  fn matched_pairs_ignore_further_clicks() {
    let mut b = board();
    b.select_left("m2").unwrap();
    b.select_right("m2").unwrap();
    assert_eq!(b.select_left("m2").unwrap(), MatchOutcome::Ignored);
    assert_eq!(b.select_right("m2").unwrap(), MatchOutcome::Ignored);
    assert_eq!(b.matched_count(), 1);
  }

  #[test]
  fn replay_resets_and_unknown_ids_are_rejected() {
    let mut b = board();
    b.select_left("m1").unwrap();
    b.select_right("m1").unwrap();
    b.replay();
    assert!(!b.is_matched("m1"));
    assert!(matches!(b.select_left("zz"), Err(AppError::NotFound(_))));
    assert!(!MatchingBoard::new(vec![]).is_won());
  }

  #[test]
  fn cursor_wraps_after_last_question() {
    let mut c = QuestionCursor::new(3);
    assert_eq!(c.next(), 1);
    assert_eq!(c.next(), 2);
    assert_eq!(c.next(), 0);
    assert_eq!(QuestionCursor::new(0).next(), 0);
  }
}
