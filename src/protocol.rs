//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! JSON field names are camelCase to match the web front-end.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audio::AudioChunk;
use crate::domain::{
  CefrLevel, CharacterProfile, ContentResult, ImageRatio, InlineImage, LessonPlan, MindMapData, MindMapMode,
  PresentationScript, ScoreBreakdown, SpeechEvaluation, WritingError,
};
use crate::export::SpeakingCertificate;
use crate::grading::{AnswerValue, Zone};
use crate::session::{FlashcardView, MatchSide, MatchingView, ScoreSummary, SubmitResult};
use crate::widgets::FlashcardAction;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  Answer {
    #[serde(rename = "sessionId")]
    session_id: String,
    zone: Zone,
    #[serde(rename = "questionId")]
    question_id: String,
    value: AnswerValue,
  },
  Submit {
    #[serde(rename = "sessionId")]
    session_id: String,
    zone: Zone,
    #[serde(rename = "questionId")]
    question_id: String,
  },
  NextQuestion {
    #[serde(rename = "sessionId")]
    session_id: String,
    zone: Zone,
  },
  Flashcard {
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(default)]
    action: Option<FlashcardAction>,
  },
  Matching {
    #[serde(rename = "sessionId")]
    session_id: String,
    side: MatchSide,
    #[serde(rename = "pairId")]
    pair_id: String,
  },
  MatchingReplay {
    #[serde(rename = "sessionId")]
    session_id: String,
  },
  Score {
    #[serde(rename = "sessionId")]
    session_id: String,
  },
  Speak {
    text: String,
  },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  Answered {
    #[serde(rename = "questionId")]
    question_id: String,
  },
  AnswerResult {
    #[serde(rename = "questionId")]
    question_id: String,
    #[serde(flatten)]
    result: SubmitResult,
  },
  QuestionIndex {
    zone: Zone,
    index: usize,
  },
  Flashcard {
    #[serde(flatten)]
    view: FlashcardView,
  },
  Matching {
    #[serde(flatten)]
    view: MatchingView,
  },
  Score {
    #[serde(flatten)]
    summary: ScoreSummary,
  },
  Queued {
    queued: bool,
  },
  /// Clip from the shared playback queue.
  Audio {
    #[serde(flatten)]
    chunk: AudioChunk,
  },
  Error {
    kind: String,
    message: String,
  },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Serialize)]
pub struct HealthOut {
  pub ok: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsOut {
  pub has_api_key: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyIn {
  #[serde(default)]
  pub api_key: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerMode {
  Topic,
  Text,
  Image,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonIn {
  pub mode: PlannerMode,
  #[serde(default)]
  pub topic: Option<String>,
  #[serde(default)]
  pub text: Option<String>,
  #[serde(default)]
  pub images: Vec<InlineImage>,
  #[serde(default)]
  pub level: CefrLevel,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonOut {
  pub lesson_id: String,
  pub session_id: String,
  pub lesson: Arc<LessonPlan>,
  /// Question sets that did not come back with the expected size.
  pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedOut {
  pub deleted: bool,
  pub sessions_closed: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerIn {
  pub zone: Zone,
  pub question_id: String,
  pub value: AnswerValue,
}

#[derive(Debug, Serialize)]
pub struct OkOut {
  pub ok: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitIn {
  pub zone: Zone,
  pub question_id: String,
}

#[derive(Debug, Deserialize)]
pub struct NextIn {
  pub zone: Zone,
}

#[derive(Debug, Serialize)]
pub struct IndexOut {
  pub index: usize,
}

#[derive(Debug, Deserialize)]
pub struct FlashcardIn {
  #[serde(default)]
  pub action: Option<FlashcardAction>,
}

/// Either a click (`side` + `pairId`) or `{"replay": true}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingIn {
  #[serde(default)]
  pub side: Option<MatchSide>,
  #[serde(default)]
  pub pair_id: Option<String>,
  #[serde(default)]
  pub replay: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CertificateIn {
  #[serde(default)]
  pub student_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryIn {
  #[serde(default)]
  pub images: Vec<String>,
  #[serde(default = "default_image_mime")]
  pub mime_type: String,
  pub character: CharacterProfile,
  #[serde(default)]
  pub mode: String,
  #[serde(default)]
  pub custom_prompt: Option<String>,
  #[serde(default)]
  pub topic: Option<String>,
  #[serde(default)]
  pub text: Option<String>,
}

fn default_image_mime() -> String {
  "image/jpeg".into()
}

#[derive(Debug, Serialize)]
pub struct StoryOut {
  pub story: ContentResult,
}

#[derive(Debug, Deserialize)]
pub struct MindMapIn {
  pub mode: MindMapMode,
  /// Free text for TOPIC/TEXT, a list of `{data, mimeType}` for IMAGE.
  pub content: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MindMapOut {
  pub mind_map: MindMapData,
}

#[derive(Debug, Serialize)]
pub struct PromptOut {
  pub prompt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationIn {
  pub mind_map: MindMapData,
  /// Queue the introduction for playback once the script is ready.
  #[serde(default)]
  pub speak_intro: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationOut {
  pub script: PresentationScript,
  pub full_english: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingIn {
  pub text: String,
  #[serde(default)]
  pub prompt: String,
}

/// Writing correction with the loose model fields already resolved.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingOut {
  pub score: f64,
  pub feedback: String,
  pub fixed_text: String,
  pub breakdown: Option<ScoreBreakdown>,
  pub errors: Vec<WritingError>,
  pub suggestions: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechIn {
  pub audio_base64: String,
  #[serde(default = "default_audio_mime")]
  pub mime_type: String,
  #[serde(default)]
  pub student_name: Option<String>,
}

fn default_audio_mime() -> String {
  "audio/wav".into()
}

#[derive(Debug, Serialize)]
pub struct SpeechOut {
  pub evaluation: SpeechEvaluation,
  pub certificate: SpeakingCertificate,
}

#[derive(Debug, Deserialize)]
pub struct ImageIn {
  pub prompt: String,
  #[serde(default = "default_image_style")]
  pub style: String,
  #[serde(default)]
  pub ratio: ImageRatio,
}

fn default_image_style() -> String {
  "3D Cartoon, Pixar Style".into()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOut {
  pub image_url: String,
}

#[derive(Debug, Deserialize)]
pub struct TextIn {
  pub text: String,
}

#[derive(Debug, Serialize)]
pub struct TtsOut {
  /// None when the service answered without audio.
  pub audio: Option<AudioChunk>,
}

#[derive(Debug, Serialize)]
pub struct QueuedOut {
  pub queued: bool,
}

#[derive(Debug, Serialize)]
pub struct FilenameOut {
  pub filename: String,
}
