//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! Every generation call checks for a saved API key first, then validates its
//! input, then talks to Gemini. Practice operations only touch the in-memory
//! session and never need the network.

use chrono::Local;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::audio::{AudioChunk, PcmClip};
use crate::domain::{LessonInput, MindMapMode};
use crate::error::AppError;
use crate::export::{lesson_certificate, speaking_certificate, Certificate};
use crate::grading::{AnswerValue, Zone};
use crate::protocol::*;
use crate::session::{set_size_warnings, FlashcardView, MatchingView, ScoreSummary, SubmitResult};
use crate::state::AppState;
use crate::util::{is_blank, trunc_for_log};
use crate::widgets::FlashcardAction;

pub const MSG_TOPIC_REQUIRED: &str = "Hãy nhập chủ đề bài học con nhé!";
pub const MSG_TEXT_REQUIRED: &str = "Hãy dán nội dung bài học vào đây!";
pub const MSG_IMAGES_REQUIRED: &str = "Hãy chọn ít nhất một tấm ảnh tài liệu!";
const MSG_MIND_MAP_IMAGES: &str = "Vui lòng chọn ít nhất 1 ảnh nhé!";
const MSG_MIND_MAP_CONTENT: &str = "Vui lòng nhập nội dung con muốn tạo sơ đồ nhé!";
const MSG_WRITING_EMPTY: &str = "Con hãy viết vài câu trước nhé!";
const MSG_AUDIO_EMPTY: &str = "Con hãy thu âm trước nhé!";
const MSG_PROMPT_EMPTY: &str = "Hãy mô tả bức tranh con muốn vẽ nhé!";
const MSG_MATCH_CLICK: &str = "Hãy chọn một thẻ để ghép nhé!";

/// Turn the planner form into a mode-specific input. Only the field of the
/// selected mode is looked at.
pub fn lesson_input(req: LessonIn) -> Result<LessonInput, AppError> {
  match req.mode {
    PlannerMode::Topic if is_blank(req.topic.as_deref()) => Err(AppError::InvalidInput(MSG_TOPIC_REQUIRED.into())),
    PlannerMode::Text if is_blank(req.text.as_deref()) => Err(AppError::InvalidInput(MSG_TEXT_REQUIRED.into())),
    PlannerMode::Image if req.images.is_empty() => Err(AppError::InvalidInput(MSG_IMAGES_REQUIRED.into())),
    PlannerMode::Topic => Ok(LessonInput::Topic(req.topic.unwrap_or_default().trim().to_string())),
    PlannerMode::Text => Ok(LessonInput::Text(req.text.unwrap_or_default())),
    PlannerMode::Image => Ok(LessonInput::Images(req.images)),
  }
}

fn check_mind_map_content(mode: MindMapMode, content: &Value) -> Result<(), AppError> {
  let empty = match content {
    Value::Null => true,
    Value::String(s) => s.trim().is_empty(),
    Value::Array(a) => a.is_empty(),
    Value::Object(o) => o.is_empty(),
    _ => false,
  };
  match (mode, empty) {
    (MindMapMode::Image, true) => Err(AppError::InvalidInput(MSG_MIND_MAP_IMAGES.into())),
    (_, true) => Err(AppError::InvalidInput(MSG_MIND_MAP_CONTENT.into())),
    _ => Ok(()),
  }
}

fn require_text(value: &str, msg: &str) -> Result<(), AppError> {
  if value.trim().is_empty() {
    Err(AppError::InvalidInput(msg.into()))
  } else {
    Ok(())
  }
}

// --- Settings ---

pub async fn settings(state: &AppState) -> SettingsOut {
  SettingsOut { has_api_key: state.keys.is_set().await }
}

pub async fn save_api_key(state: &AppState, key: &str) -> Result<SettingsOut, AppError> {
  state.keys.set(key).await?;
  Ok(settings(state).await)
}

// --- Lesson planner ---

#[instrument(level = "info", skip(state, req), fields(mode = ?req.mode, cefr = req.level.label()))]
pub async fn create_lesson(state: &AppState, req: LessonIn) -> Result<LessonOut, AppError> {
  let gemini = state.gemini().await?;
  let level = req.level;
  let input = lesson_input(req)?;

  let plan = gemini.generate_lesson_plan(&state.prompts, &input, level).await?;
  let warnings = set_size_warnings(&plan.practice.mega_test, state.scoring.expected_set_size);
  for w in &warnings {
    warn!(target: "lesson", warning = %w, "Question set size differs");
  }

  let (lesson_id, lesson) = state.insert_lesson(plan).await;
  let session_id = state.open_session(&lesson_id).await?;
  info!(target: "lesson", %lesson_id, %session_id, topic = %trunc_for_log(&lesson.topic, 40), "Lesson created");
  Ok(LessonOut { lesson_id, session_id, lesson, warnings })
}

// --- Practice session ---

#[instrument(level = "info", skip(state, value), fields(%session_id, ?zone, %question_id))]
pub async fn answer(state: &AppState, session_id: &str, zone: Zone, question_id: &str, value: AnswerValue) -> Result<(), AppError> {
  state.with_session(session_id, |s| s.answer(zone, question_id, value)).await
}

#[instrument(level = "info", skip(state), fields(%session_id, ?zone, %question_id))]
pub async fn submit(state: &AppState, session_id: &str, zone: Zone, question_id: &str) -> Result<SubmitResult, AppError> {
  let result = state.with_session(session_id, |s| s.submit(zone, question_id)).await?;
  info!(target: "lesson", %question_id, correct = result.correct, "Answer submitted");
  Ok(result)
}

pub async fn next_question(state: &AppState, session_id: &str, zone: Zone) -> Result<usize, AppError> {
  state.with_session(session_id, |s| Ok(s.next_question(zone))).await
}

pub async fn flashcard(state: &AppState, session_id: &str, action: Option<FlashcardAction>) -> Result<FlashcardView, AppError> {
  state.with_session(session_id, |s| Ok(s.flashcard(action))).await
}

pub async fn matching(state: &AppState, session_id: &str, req: MatchingIn) -> Result<MatchingView, AppError> {
  if req.replay {
    return state.with_session(session_id, |s| Ok(s.matching_replay())).await;
  }
  match (req.side, req.pair_id) {
    (Some(side), Some(pair_id)) => state.with_session(session_id, |s| s.matching_click(side, &pair_id)).await,
    _ => Err(AppError::InvalidInput(MSG_MATCH_CLICK.into())),
  }
}

pub async fn score(state: &AppState, session_id: &str) -> Result<ScoreSummary, AppError> {
  state.with_session(session_id, |s| Ok(s.score(&state.scoring))).await
}

#[instrument(level = "info", skip(state, student_name), fields(%session_id))]
pub async fn certificate(state: &AppState, session_id: &str, student_name: Option<&str>) -> Result<Certificate, AppError> {
  let today = Local::now().date_naive();
  state
    .with_session(session_id, |s| {
      let summary = s.score(&state.scoring);
      Ok(lesson_certificate(student_name, &s.lesson().topic, &summary, today))
    })
    .await
}

// --- Story, mind map, presentation ---

#[instrument(level = "info", skip(state, req), fields(images = req.images.len(), character = %req.character.id))]
pub async fn story(state: &AppState, req: StoryIn) -> Result<StoryOut, AppError> {
  let gemini = state.gemini().await?;
  if req.images.is_empty() {
    return Err(AppError::InvalidInput(MSG_IMAGES_REQUIRED.into()));
  }
  let story = gemini
    .create_story_content(
      &state.prompts,
      &req.images,
      &req.mime_type,
      &req.character,
      &req.mode,
      req.custom_prompt.as_deref(),
      req.topic.as_deref(),
      req.text.as_deref(),
    )
    .await?;
  Ok(StoryOut { story })
}

#[instrument(level = "info", skip(state, req), fields(mode = ?req.mode))]
pub async fn mind_map(state: &AppState, req: MindMapIn) -> Result<MindMapOut, AppError> {
  let gemini = state.gemini().await?;
  check_mind_map_content(req.mode, &req.content)?;
  let mind_map = gemini.generate_mind_map(&state.prompts, &req.content, req.mode).await?;
  Ok(MindMapOut { mind_map })
}

pub async fn mind_map_prompt(state: &AppState, req: MindMapIn) -> Result<PromptOut, AppError> {
  let gemini = state.gemini().await?;
  check_mind_map_content(req.mode, &req.content)?;
  let prompt = gemini.generate_mind_map_prompt(&state.prompts, &req.content, req.mode).await?;
  Ok(PromptOut { prompt })
}

#[instrument(level = "info", skip(state, req), fields(nodes = req.mind_map.nodes.len(), speak_intro = req.speak_intro))]
pub async fn presentation(state: &AppState, req: PresentationIn) -> Result<PresentationOut, AppError> {
  let gemini = state.gemini().await?;
  let script = gemini.generate_presentation(&state.prompts, &req.mind_map).await?;
  if req.speak_intro {
    state.audio.enqueue(&script.introduction.english);
  }
  let full_english = script.full_english();
  Ok(PresentationOut { script, full_english })
}

// --- Evaluation ---

#[instrument(level = "info", skip(state, req), fields(text_len = req.text.len()))]
pub async fn correct_writing(state: &AppState, req: WritingIn) -> Result<WritingOut, AppError> {
  let gemini = state.gemini().await?;
  require_text(&req.text, MSG_WRITING_EMPTY)?;
  let c = gemini.correct_writing(&state.prompts, &req.text, &req.prompt).await?;
  Ok(WritingOut {
    score: c.score_value(),
    feedback: c.feedback_text(),
    fixed_text: c.fixed_text_or(&req.text).to_string(),
    breakdown: c.breakdown.clone(),
    errors: c.errors.clone(),
    suggestions: c.suggestions.clone(),
  })
}

#[instrument(level = "info", skip(state, req), fields(audio_len = req.audio_base64.len(), mime = %req.mime_type))]
pub async fn evaluate_speech(state: &AppState, req: SpeechIn) -> Result<SpeechOut, AppError> {
  let gemini = state.gemini().await?;
  require_text(&req.audio_base64, MSG_AUDIO_EMPTY)?;
  let evaluation = gemini.evaluate_speech(&state.prompts, &req.audio_base64, &req.mime_type).await?;
  let certificate = speaking_certificate(req.student_name.as_deref(), &evaluation, Local::now().naive_local());
  Ok(SpeechOut { evaluation, certificate })
}

// --- Pictures and audio ---

#[instrument(level = "info", skip(state, req), fields(ratio = req.ratio.as_str()))]
pub async fn story_image(state: &AppState, req: ImageIn) -> Result<ImageOut, AppError> {
  let gemini = state.gemini().await?;
  require_text(&req.prompt, MSG_PROMPT_EMPTY)?;
  let image_url = gemini.generate_story_image(&state.prompts, &req.prompt, &req.style, req.ratio).await?;
  Ok(ImageOut { image_url })
}

/// One-shot synthesis returned to the caller as WAV, bypassing the queue.
#[instrument(level = "info", skip(state, text), fields(text_len = text.len()))]
pub async fn tts(state: &AppState, text: &str) -> Result<TtsOut, AppError> {
  let gemini = state.gemini().await?;
  if text.trim().is_empty() {
    return Ok(TtsOut { audio: None });
  }
  let audio = match gemini.synthesize_speech(text).await? {
    Some(data) => Some(AudioChunk::from_clip(&PcmClip::decode_base64(&data)?)?),
    None => None,
  };
  Ok(TtsOut { audio })
}

/// Queue text on the shared playback queue; clips reach WS listeners as `audio`.
pub async fn speak(state: &AppState, text: &str) -> Result<QueuedOut, AppError> {
  if !state.keys.is_set().await {
    return Err(AppError::MissingApiKey);
  }
  Ok(QueuedOut { queued: state.audio.enqueue(text) })
}
