//! Application state: key store, prompts, Gemini settings, in-memory lesson
//! and session stores, and the audio queue.
//!
//! Lessons live in a bounded store: once `lesson_capacity` is reached the
//! oldest lesson is evicted. Removing a lesson, by delete or eviction, drops
//! every practice session opened on it.

use std::{
  collections::{HashMap, VecDeque},
  sync::Arc,
};

use tokio::sync::{broadcast, RwLock};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::audio::{AudioChunk, AudioQueue, BroadcastOutput, GeminiSpeech};
use crate::config::{load_agent_config_from_env, AgentConfig, Prompts, ScoringConfig};
use crate::domain::LessonPlan;
use crate::error::AppError;
use crate::gemini::{Gemini, GeminiSettings};
use crate::keystore::KeyStore;
use crate::session::PracticeSession;

/// Buffered audio clips per WebSocket listener before it starts lagging.
const AUDIO_BROADCAST_CAPACITY: usize = 16;
/// Lessons kept in memory unless LESSON_CAPACITY says otherwise.
pub const DEFAULT_LESSON_CAPACITY: usize = 32;

/// Lessons (oldest first) and the sessions opened on them, under one lock so
/// a session can never outlive its lesson.
#[derive(Default)]
pub struct LessonStore {
  lessons: HashMap<String, Arc<LessonPlan>>,
  order: VecDeque<String>,
  sessions: HashMap<String, PracticeSession>,
}

impl LessonStore {
  pub fn lesson_count(&self) -> usize {
    self.lessons.len()
  }

  pub fn session_count(&self) -> usize {
    self.sessions.len()
  }

  /// Drop a lesson and its sessions. Returns the sessions dropped, or None if unknown.
  fn remove(&mut self, id: &str) -> Option<usize> {
    self.lessons.remove(id)?;
    self.order.retain(|l| l != id);
    let before = self.sessions.len();
    self.sessions.retain(|_, s| s.lesson_id != id);
    Some(before - self.sessions.len())
  }
}

#[derive(Clone)]
pub struct AppState {
  pub keys: KeyStore,
  pub prompts: Prompts,
  pub scoring: ScoringConfig,
  pub gemini_settings: Arc<GeminiSettings>,
  pub http: reqwest::Client,
  pub store: Arc<RwLock<LessonStore>>,
  pub lesson_capacity: usize,
  pub audio: AudioQueue,
  pub audio_tx: broadcast::Sender<AudioChunk>,
}

impl AppState {
  /// Build state from env: TOML config, Gemini settings, key file, audio pacing,
  /// lesson capacity.
  #[instrument(level = "info", skip_all)]
  pub fn from_env() -> Result<Self, AppError> {
    let cfg = load_agent_config_from_env().unwrap_or_default();
    let settings = GeminiSettings::from_env();
    let pace = !matches!(std::env::var("AUDIO_PACE").as_deref(), Ok("0") | Ok("false"));
    let mut state = Self::build(KeyStore::from_env(), cfg, settings, pace)?;
    if let Some(cap) = std::env::var("LESSON_CAPACITY").ok().and_then(|v| v.parse::<usize>().ok()) {
      state.lesson_capacity = cap.max(1);
    }
    info!(target: "mrsdung_backend", lesson_capacity = state.lesson_capacity, "Lesson store ready");
    Ok(state)
  }

  /// Assemble state from parts. Must run inside a Tokio runtime (spawns the audio worker).
  pub fn build(keys: KeyStore, cfg: AgentConfig, settings: GeminiSettings, pace_audio: bool) -> Result<Self, AppError> {
    let http = settings.http_client()?;
    let settings = Arc::new(settings);
    info!(
      target: "mrsdung_backend",
      base_url = %settings.base_url,
      text_model = %settings.text_model,
      tts_model = %settings.tts_model,
      image_model = %settings.image_model,
      timeout = ?settings.timeout,
      "Gemini settings"
    );

    let (audio_tx, _) = broadcast::channel(AUDIO_BROADCAST_CAPACITY);
    let speech = GeminiSpeech { settings: settings.clone(), http: http.clone(), keys: keys.clone() };
    let out_tx = audio_tx.clone();
    let audio = AudioQueue::spawn(speech, move || Ok(BroadcastOutput::new(out_tx.clone(), pace_audio)));

    Ok(Self {
      keys,
      prompts: cfg.prompts,
      scoring: cfg.scoring,
      gemini_settings: settings,
      http,
      store: Arc::new(RwLock::new(LessonStore::default())),
      lesson_capacity: DEFAULT_LESSON_CAPACITY,
      audio,
      audio_tx,
    })
  }

  /// Client bound to the saved key. `MissingApiKey` when none is saved.
  pub async fn gemini(&self) -> Result<Gemini, AppError> {
    let key = self.keys.require().await?;
    Ok(Gemini::new(self.http.clone(), self.gemini_settings.clone(), key))
  }

  /// Store a lesson, evicting the oldest ones (and their sessions) past capacity.
  #[instrument(level = "debug", skip(self, lesson), fields(topic = %lesson.topic))]
  pub async fn insert_lesson(&self, lesson: LessonPlan) -> (String, Arc<LessonPlan>) {
    let id = Uuid::new_v4().to_string();
    let lesson = Arc::new(lesson);
    let mut store = self.store.write().await;
    while store.order.len() >= self.lesson_capacity.max(1) {
      let Some(oldest) = store.order.pop_front() else { break };
      let closed = store.remove(&oldest).unwrap_or(0);
      info!(target: "lesson", lesson_id = %oldest, sessions_closed = closed, "Evicted oldest lesson");
    }
    store.lessons.insert(id.clone(), lesson.clone());
    store.order.push_back(id.clone());
    (id, lesson)
  }

  pub async fn get_lesson(&self, id: &str) -> Result<Arc<LessonPlan>, AppError> {
    self
      .store
      .read()
      .await
      .lessons
      .get(id)
      .cloned()
      .ok_or_else(|| AppError::NotFound(format!("lesson {}", id)))
  }

  /// Remove a lesson and its sessions. Returns the number of sessions dropped.
  #[instrument(level = "info", skip(self), fields(%id))]
  pub async fn remove_lesson(&self, id: &str) -> Result<usize, AppError> {
    self
      .store
      .write()
      .await
      .remove(id)
      .ok_or_else(|| AppError::NotFound(format!("lesson {}", id)))
  }

  #[instrument(level = "debug", skip(self), fields(%lesson_id))]
  pub async fn open_session(&self, lesson_id: &str) -> Result<String, AppError> {
    let mut store = self.store.write().await;
    let lesson = store
      .lessons
      .get(lesson_id)
      .cloned()
      .ok_or_else(|| AppError::NotFound(format!("lesson {}", lesson_id)))?;
    let id = Uuid::new_v4().to_string();
    let session = PracticeSession::new(lesson_id.to_string(), lesson);
    store.sessions.insert(id.clone(), session);
    Ok(id)
  }

  /// Run `f` on a session under the store's write lock.
  pub async fn with_session<R>(
    &self,
    id: &str,
    f: impl FnOnce(&mut PracticeSession) -> Result<R, AppError>,
  ) -> Result<R, AppError> {
    let mut store = self.store.write().await;
    let session = store
      .sessions
      .get_mut(id)
      .ok_or_else(|| AppError::NotFound(format!("session {}", id)))?;
    f(session)
  }
}
