//! Test fixtures: a canned lesson plan and a local mock of the Gemini API.

use std::sync::{Arc, Mutex};

use axum::{
  extract::{Path, State},
  http::StatusCode,
  routing::post,
  Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::config::AgentConfig;
use crate::domain::*;
use crate::gemini::GeminiSettings;
use crate::keystore::KeyStore;
use crate::state::AppState;

/// State with no saved key, talking to the real endpoint (never reached).
pub fn test_state() -> AppState {
  AppState::build(KeyStore::load(None, None), AgentConfig::default(), GeminiSettings::default(), false).unwrap()
}

/// State with a saved key, pointed at a mock Gemini server.
pub fn test_state_for(base_url: &str) -> AppState {
  let settings = GeminiSettings { base_url: base_url.to_string(), ..Default::default() };
  AppState::build(KeyStore::load(None, Some("test-key".into())), AgentConfig::default(), settings, false).unwrap()
}

/// A lesson whose five graded sets each hold `n` questions and three matching pairs.
///
/// Answers are predictable: mc `i % 4`, error-id `(i + 1) % 4`,
/// listening `(i + 2) % 4`, fill-blank `apple{i}`, scramble `The cat sat {i}.`
pub fn sample_lesson(n: usize) -> LessonPlan {
  let options = || vec!["a".to_string(), "b".into(), "c".into(), "d".into()];
  let mega = MegaTest {
    multiple_choice: (0..n)
      .map(|i| MultipleChoiceQ {
        id: format!("mc{i}"),
        question: format!("Question {i}?"),
        options: options(),
        correct_answer: i % 4,
        explanation: "Because.".into(),
      })
      .collect(),
    scramble: (0..n)
      .map(|i| ScrambleQ {
        id: format!("sc{i}"),
        scrambled: vec!["sat".into(), "The".into(), format!("{i}."), "cat".into()],
        correct_sentence: format!("The cat sat {i}."),
        translation: "Con mèo ngồi.".into(),
      })
      .collect(),
    fill_blank: (0..n)
      .map(|i| FillBlankQ {
        id: format!("fb{i}"),
        question: "I like ___ .".into(),
        correct_answer: format!("apple{i}"),
        clue_emoji: "🍎".into(),
        explanation: Some("Fruit.".into()),
        options: None,
      })
      .collect(),
    error_id: (0..n)
      .map(|i| ErrorIdQ {
        id: format!("er{i}"),
        sentence: "She go to school.".into(),
        options: options(),
        correct_option_index: (i + 1) % 4,
        explanation: "goes".into(),
      })
      .collect(),
    listening: (0..n)
      .map(|i| ListeningQ {
        id: format!("li{i}"),
        question: "What did you hear?".into(),
        audio_text: format!("Number {i}"),
        options: options(),
        correct_answer: (i + 2) % 4,
        explanation: String::new(),
      })
      .collect(),
    matching: vec![
      MatchingPair { id: "m1".into(), left: "cat".into(), right: "con mèo".into() },
      MatchingPair { id: "m2".into(), left: "dog".into(), right: "con chó".into() },
      MatchingPair { id: "m3".into(), left: "bird".into(), right: "con chim".into() },
    ],
  };

  LessonPlan {
    topic: "Pets".into(),
    vocabulary: ["cat", "dog", "bird"]
      .iter()
      .map(|w| VocabularyItem {
        word: w.to_string(),
        emoji: "🐾".into(),
        ipa: String::new(),
        meaning: format!("{w} (vi)"),
        example: format!("I have a {w}."),
        sentence_meaning: String::new(),
        kind: "noun".into(),
      })
      .collect(),
    grammar: GrammarSection {
      topic: "Have got".into(),
      explanation: "Dùng để nói sở hữu.".into(),
      examples: vec!["I have got a cat.".into()],
    },
    reading: ReadingAdventure {
      title: "My pets".into(),
      passage: "I have a cat.".into(),
      translation: "Tôi có một con mèo.".into(),
      comprehension: vec![],
    },
    practice: PracticeContent { mega_test: mega },
    teacher_tips: "Use real toys.".into(),
  }
}

/// generateContent body carrying one text part.
pub fn text_reply(text: &str) -> Value {
  json!({ "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] }, "finishReason": "STOP" }] })
}

pub struct MockReply {
  pub status: StatusCode,
  pub body: Value,
}

impl MockReply {
  pub fn ok(body: Value) -> Self {
    Self { status: StatusCode::OK, body }
  }
}

type Responder = dyn Fn(&str, &Value) -> MockReply + Send + Sync;

#[derive(Clone)]
struct MockState {
  respond: Arc<Responder>,
  seen: Arc<Mutex<Vec<(String, Value)>>>,
}

pub struct MockGemini {
  pub base_url: String,
  seen: Arc<Mutex<Vec<(String, Value)>>>,
}

impl MockGemini {
  /// (model, request body) pairs in arrival order.
  pub fn requests(&self) -> Vec<(String, Value)> {
    self.seen.lock().unwrap().clone()
  }
}

async fn handle(State(st): State<MockState>, Path(action): Path<String>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
  let model = action.split(':').next().unwrap_or_default().to_string();
  let reply = (st.respond)(&model, &body);
  st.seen.lock().unwrap().push((model, body));
  (reply.status, Json(reply.body))
}

/// Serve `respond` on an ephemeral local port, mimicking `models/{model}:generateContent`.
pub async fn spawn_mock_gemini<F>(respond: F) -> MockGemini
where
  F: Fn(&str, &Value) -> MockReply + Send + Sync + 'static,
{
  let seen = Arc::new(Mutex::new(Vec::new()));
  let state = MockState { respond: Arc::new(respond), seen: seen.clone() };
  let app = Router::new().route("/models/:action", post(handle)).with_state(state);

  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move {
    axum::serve(listener, app).await.unwrap();
  });

  MockGemini { base_url: format!("http://{}", addr), seen }
}
