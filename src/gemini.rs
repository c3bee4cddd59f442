//! Minimal Gemini client for our use-cases.
//!
//! Everything goes through `models/{model}:generateContent`. JSON operations
//! declare a response schema and decode through `salvage`; speech and image
//! calls ask for an audio/image response modality and return inline data.
//! Calls are instrumented and log model names, latencies and response sizes
//! (not contents).
//!
//! NOTE: We never log the API key and keep payload previews short.

use std::{sync::Arc, time::Duration};

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use crate::config::Prompts;
use crate::domain::{
  CharacterProfile, ContentResult, ImageRatio, LessonInput, LessonPlan, MindMapData, MindMapMode,
  PresentationScript, SpeechEvaluation, WritingCorrection, CefrLevel,
};
use crate::error::AppError;
use crate::salvage::parse_model_json;
use crate::schemas;
use crate::util::{fill_template, trunc_for_log};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Endpoint, models and limits. Shared by every client built from a key.
#[derive(Clone, Debug)]
pub struct GeminiSettings {
  pub base_url: String,
  pub text_model: String,
  pub tts_model: String,
  pub image_model: String,
  pub voice: String,
  pub timeout: Duration,
}

impl Default for GeminiSettings {
  fn default() -> Self {
    Self {
      base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
      text_model: "gemini-3-pro-preview".into(),
      tts_model: "gemini-2.5-flash-preview-tts".into(),
      image_model: "gemini-2.5-flash-image".into(),
      voice: "Kore".into(),
      timeout: Duration::from_secs(120),
    }
  }
}

impl GeminiSettings {
  pub fn from_env() -> Self {
    let d = Self::default();
    let var = |name: &str, fallback: String| std::env::var(name).unwrap_or(fallback);
    Self {
      base_url: var("GEMINI_BASE_URL", d.base_url),
      text_model: var("GEMINI_TEXT_MODEL", d.text_model),
      tts_model: var("GEMINI_TTS_MODEL", d.tts_model),
      image_model: var("GEMINI_IMAGE_MODEL", d.image_model),
      voice: var("GEMINI_VOICE", d.voice),
      timeout: std::env::var("GEMINI_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(d.timeout),
    }
  }

  /// Shared HTTP client carrying the request timeout.
  pub fn http_client(&self) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
      .timeout(self.timeout)
      .build()
      .map_err(|e| AppError::Internal(e.to_string()))
  }
}

#[derive(Clone)]
pub struct Gemini {
  client: reqwest::Client,
  api_key: String,
  pub settings: Arc<GeminiSettings>,
}

impl Gemini {
  pub fn new(client: reqwest::Client, settings: Arc<GeminiSettings>, api_key: String) -> Self {
    Self { client, api_key, settings }
  }

  /// Raw generateContent call. Non-2xx answers surface Gemini's own error message.
  #[instrument(level = "info", skip(self, req), fields(model = %model))]
  async fn generate(&self, model: &str, req: &GenerateRequest) -> Result<GenerateResponse, AppError> {
    let url = format!("{}/models/{}:generateContent", self.settings.base_url, model);
    let start = std::time::Instant::now();

    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "mrsdung-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(API_KEY_HEADER, &self.api_key)
      .json(req)
      .send()
      .await
      .map_err(|e| {
        error!(target: "gemini", error = %e, "Gemini request failed");
        AppError::Service(e.to_string())
      })?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_gemini_error(&body).unwrap_or(body);
      error!(target: "gemini", %status, elapsed = ?start.elapsed(), "Gemini returned an error");
      return Err(AppError::Service(msg));
    }

    let body: GenerateResponse = res.json().await?;
    if let Some(usage) = &body.usage_metadata {
      info!(
        target: "gemini",
        prompt_tokens = ?usage.prompt_token_count,
        candidates_tokens = ?usage.candidates_token_count,
        total_tokens = ?usage.total_token_count,
        elapsed = ?start.elapsed(),
        "Gemini usage"
      );
    }
    if let Some(reason) = body.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
      if reason == "MAX_TOKENS" {
        warn!(target: "gemini", "Gemini stopped at the output token limit");
      }
    }
    Ok(body)
  }

  /// Schema-constrained JSON generation with salvage decoding.
  #[instrument(level = "info", skip(self, system, parts, schema), fields(model = %self.settings.text_model, parts = parts.len()))]
  async fn generate_json<T: DeserializeOwned>(
    &self,
    system: &str,
    parts: Vec<Part>,
    schema: Value,
    temperature: f32,
    max_output_tokens: Option<u32>,
  ) -> Result<T, AppError> {
    let req = GenerateRequest {
      system_instruction: Some(Content::system(system)),
      contents: vec![Content::user(parts)],
      generation_config: GenerationConfig {
        temperature: Some(temperature),
        response_mime_type: Some("application/json".into()),
        response_schema: Some(schema),
        max_output_tokens,
        ..Default::default()
      },
    };
    let body = self.generate(&self.settings.text_model, &req).await?;
    let text = body.text();
    info!(target: "gemini", text_len = text.len(), "Model JSON received");
    parse_model_json::<T>(&text)
  }

  /// Plain-text generation (no schema).
  #[instrument(level = "info", skip(self, user), fields(model = %self.settings.text_model))]
  async fn generate_text(&self, user: &str, temperature: f32) -> Result<String, AppError> {
    let req = GenerateRequest {
      system_instruction: None,
      contents: vec![Content::user(vec![Part::text(user)])],
      generation_config: GenerationConfig { temperature: Some(temperature), ..Default::default() },
    };
    let body = self.generate(&self.settings.text_model, &req).await?;
    Ok(body.text().trim().to_string())
  }

  // --- High-level helpers (domain-specialized) ---

  /// Lesson plan + 50-question battery from a topic, pasted text or images.
  #[instrument(level = "info", skip(self, prompts, input), fields(mode = input.mode(), cefr = level.label()))]
  pub async fn generate_lesson_plan(
    &self,
    prompts: &Prompts,
    input: &LessonInput,
    level: CefrLevel,
  ) -> Result<LessonPlan, AppError> {
    let system = fill_template(&prompts.lesson_system, &[("level", level.label())]);
    let parts = match input {
      LessonInput::Text(text) => vec![Part::text(&fill_template(&prompts.lesson_text_template, &[("text", text)]))],
      LessonInput::Topic(topic) => vec![Part::text(&fill_template(&prompts.lesson_topic_template, &[("topic", topic)]))],
      LessonInput::Images(images) => images.iter().map(|img| Part::inline(&img.mime_type, &img.data)).collect(),
    };

    let plan: LessonPlan = self.generate_json(&system, parts, schemas::lesson_plan(), 0.0, Some(8192)).await?;
    info!(
      target: "gemini",
      topic = %trunc_for_log(&plan.topic, 40),
      vocabulary = plan.vocabulary.len(),
      "Lesson plan generated"
    );
    Ok(plan)
  }

  /// Kids' story (plus comprehension and speaking questions) from pictures.
  #[instrument(level = "info", skip(self, prompts, images, character, custom_prompt, topic, text), fields(images = images.len(), %mime_type, character = %character.id, %mode))]
  #[allow(clippy::too_many_arguments)]
  pub async fn create_story_content(
    &self,
    prompts: &Prompts,
    images: &[String],
    mime_type: &str,
    character: &CharacterProfile,
    mode: &str,
    custom_prompt: Option<&str>,
    topic: Option<&str>,
    text: Option<&str>,
  ) -> Result<ContentResult, AppError> {
    let mut parts: Vec<Part> = images.iter().map(|data| Part::inline(mime_type, data)).collect();
    let user = fill_template(
      &prompts.story_user_template,
      &[
        ("character", &character.name),
        ("character_emoji", &character.emoji),
        ("character_context", &character.prompt_context),
        ("mode", mode),
        ("custom_prompt", custom_prompt.unwrap_or("-")),
        ("topic", topic.unwrap_or("-")),
        ("text", text.unwrap_or("-")),
      ],
    );
    parts.push(Part::text(&user));
    self.generate_json(&prompts.story_system, parts, schemas::story_content(), 0.1, None).await
  }

  #[instrument(level = "info", skip(self, prompts, content), fields(mode = ?mode))]
  pub async fn generate_mind_map(&self, prompts: &Prompts, content: &Value, mode: MindMapMode) -> Result<MindMapData, AppError> {
    let user = fill_template(
      &prompts.mind_map_user_template,
      &[("mode", mode_label(mode)), ("content", &content.to_string())],
    );
    self.generate_json(&prompts.mind_map_system, vec![Part::text(&user)], schemas::mind_map(), 0.0, None).await
  }

  /// Midjourney-style image prompt for a mind map poster. Plain text.
  #[instrument(level = "info", skip(self, prompts, content), fields(mode = ?mode))]
  pub async fn generate_mind_map_prompt(&self, prompts: &Prompts, content: &Value, mode: MindMapMode) -> Result<String, AppError> {
    let user = fill_template(
      &prompts.mind_map_image_prompt_template,
      &[("mode", mode_label(mode)), ("content", &content.to_string())],
    );
    self.generate_text(&user, 0.0).await
  }

  #[instrument(level = "info", skip(self, prompts, user_text, creative_prompt), fields(text_len = user_text.len()))]
  pub async fn correct_writing(&self, prompts: &Prompts, user_text: &str, creative_prompt: &str) -> Result<WritingCorrection, AppError> {
    let user = fill_template(&prompts.writing_user_template, &[("text", user_text), ("prompt", creative_prompt)]);
    self.generate_json(&prompts.writing_system, vec![Part::text(&user)], schemas::writing_correction(), 0.0, None).await
  }

  #[instrument(level = "info", skip(self, prompts, audio_base64), fields(audio_len = audio_base64.len(), %mime_type))]
  pub async fn evaluate_speech(&self, prompts: &Prompts, audio_base64: &str, mime_type: &str) -> Result<SpeechEvaluation, AppError> {
    let parts = vec![Part::inline(mime_type, audio_base64), Part::text(&prompts.speech_user)];
    self.generate_json(&prompts.speech_system, parts, schemas::speech_evaluation(), 0.0, None).await
  }

  #[instrument(level = "info", skip(self, prompts, data), fields(nodes = data.nodes.len()))]
  pub async fn generate_presentation(&self, prompts: &Prompts, data: &MindMapData) -> Result<PresentationScript, AppError> {
    let mind_map = serde_json::to_string(data).map_err(|e| AppError::Internal(e.to_string()))?;
    let user = fill_template(&prompts.presentation_user_template, &[("mind_map", &mind_map)]);
    self.generate_json(&prompts.presentation_system, vec![Part::text(&user)], schemas::presentation(), 0.0, None).await
  }

  /// Illustration for a story. Returns a `data:image/png;base64,...` URL.
  #[instrument(level = "info", skip(self, prompts, prompt, style), fields(model = %self.settings.image_model, ratio = ratio.as_str()))]
  pub async fn generate_story_image(&self, prompts: &Prompts, prompt: &str, style: &str, ratio: ImageRatio) -> Result<String, AppError> {
    let user = fill_template(&prompts.image_user_template, &[("prompt", prompt), ("style", style)]);
    let req = GenerateRequest {
      system_instruction: None,
      contents: vec![Content::user(vec![Part::text(&user)])],
      generation_config: GenerationConfig {
        image_config: Some(json!({ "aspectRatio": ratio.as_str() })),
        ..Default::default()
      },
    };
    let body = self.generate(&self.settings.image_model, &req).await?;
    match body.inline_data() {
      Some(blob) => Ok(format!("data:image/png;base64,{}", blob.data)),
      None => Err(AppError::Service("Không thể vẽ ảnh.".into())),
    }
  }

  /// Text-to-speech. Returns base64 PCM16LE mono 24 kHz, or None when the
  /// model answered without audio.
  #[instrument(level = "info", skip(self, text), fields(model = %self.settings.tts_model, text_len = text.len()))]
  pub async fn synthesize_speech(&self, text: &str) -> Result<Option<String>, AppError> {
    let req = GenerateRequest {
      system_instruction: None,
      contents: vec![Content::user(vec![Part::text(text)])],
      generation_config: GenerationConfig {
        response_modalities: Some(vec!["AUDIO".into()]),
        speech_config: Some(json!({
          "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": self.settings.voice } }
        })),
        ..Default::default()
      },
    };
    let body = self.generate(&self.settings.tts_model, &req).await?;
    Ok(body.inline_data().map(|b| b.data.clone()))
  }
}

fn mode_label(mode: MindMapMode) -> &'static str {
  match mode {
    MindMapMode::Topic => "TOPIC",
    MindMapMode::Text => "TEXT",
    MindMapMode::Image => "IMAGE",
  }
}

// --- generateContent DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
  #[serde(skip_serializing_if = "Option::is_none")]
  system_instruction: Option<Content>,
  contents: Vec<Content>,
  generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  role: Option<String>,
  #[serde(default)]
  parts: Vec<Part>,
}

impl Content {
  fn system(text: &str) -> Self {
    Self { role: None, parts: vec![Part::text(text)] }
  }
  fn user(parts: Vec<Part>) -> Self {
    Self { role: Some("user".into()), parts }
  }
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  text: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  inline_data: Option<Blob>,
  #[serde(default, skip_serializing)]
  thought: Option<bool>,
}

impl Part {
  fn text(text: &str) -> Self {
    Self { text: Some(text.to_string()), ..Default::default() }
  }
  fn inline(mime_type: &str, data: &str) -> Self {
    Self {
      inline_data: Some(Blob { mime_type: mime_type.to_string(), data: data.to_string() }),
      ..Default::default()
    }
  }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
  #[serde(default)]
  mime_type: String,
  data: String,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  #[serde(skip_serializing_if = "Option::is_none")]
  temperature: Option<f32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_mime_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_schema: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_output_tokens: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_modalities: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  speech_config: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  image_config: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
  #[serde(default)]
  usage_metadata: Option<UsageMetadata>,
}

impl GenerateResponse {
  fn parts(&self) -> &[Part] {
    self
      .candidates
      .first()
      .and_then(|c| c.content.as_ref())
      .map(|c| c.parts.as_slice())
      .unwrap_or(&[])
  }

  /// Concatenated non-thought text of the first candidate.
  fn text(&self) -> String {
    self
      .parts()
      .iter()
      .filter(|p| !p.thought.unwrap_or(false))
      .filter_map(|p| p.text.as_deref())
      .collect::<Vec<_>>()
      .join("")
  }

  fn inline_data(&self) -> Option<&Blob> {
    self.parts().iter().find_map(|p| p.inline_data.as_ref())
  }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
  #[serde(default)]
  content: Option<Content>,
  #[serde(default)]
  finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)]
  prompt_token_count: Option<u32>,
  #[serde(default)]
  candidates_token_count: Option<u32>,
  #[serde(default)]
  total_token_count: Option<u32>,
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
  }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::InlineImage;
  use crate::testutil::{sample_lesson, spawn_mock_gemini, text_reply, MockReply};
  use axum::http::StatusCode;

  fn client_for(base_url: &str) -> Gemini {
    let settings = GeminiSettings { base_url: base_url.to_string(), ..Default::default() };
    Gemini::new(reqwest::Client::new(), Arc::new(settings), "test-key".into())
  }

  #[test]
  fn request_serializes_in_gemini_shape() {
    let req = GenerateRequest {
      system_instruction: Some(Content::system("sys")),
      contents: vec![Content::user(vec![Part::text("hi"), Part::inline("image/png", "AAAA")])],
      generation_config: GenerationConfig {
        temperature: Some(0.0),
        response_mime_type: Some("application/json".into()),
        ..Default::default()
      },
    };
    let v = serde_json::to_value(&req).unwrap();
    assert_eq!(v["systemInstruction"]["parts"][0]["text"], "sys");
    assert!(v["systemInstruction"].get("role").is_none());
    assert_eq!(v["contents"][0]["role"], "user");
    assert_eq!(v["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/png");
    assert_eq!(v["generationConfig"]["responseMimeType"], "application/json");
    assert!(v["generationConfig"].get("responseSchema").is_none());
  }

  #[test]
  fn response_text_skips_thought_parts() {
    let body: GenerateResponse = serde_json::from_value(json!({
      "candidates": [{ "content": { "parts": [
        { "text": "thinking...", "thought": true },
        { "text": "{\"a\":" }, { "text": "1}" }
      ]}}]
    }))
    .unwrap();
    assert_eq!(body.text(), "{\"a\":1}");
  }

  #[test]
  fn error_body_message_is_extracted() {
    let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
    assert_eq!(extract_gemini_error(body).as_deref(), Some("API key not valid."));
    assert_eq!(extract_gemini_error("<html>"), None);
  }

  #[tokio::test]
  async fn lesson_plan_decodes_fenced_reply_and_sends_schema() {
    let lesson = serde_json::to_string(&sample_lesson(10)).unwrap();
    let mock = spawn_mock_gemini(move |_model, _body| MockReply::ok(text_reply(&format!("```json\n{}\n```", lesson)))).await;
    let gemini = client_for(&mock.base_url);

    let input = LessonInput::Images(vec![InlineImage { data: "QUJD".into(), mime_type: "image/jpeg".into() }]);
    let plan = gemini.generate_lesson_plan(&Prompts::default(), &input, CefrLevel::Elementary).await.unwrap();
    assert_eq!(plan.practice.mega_test.multiple_choice.len(), 10);

    let seen = mock.requests();
    assert_eq!(seen.len(), 1);
    let (model, body) = &seen[0];
    assert_eq!(model, "gemini-3-pro-preview");
    assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
    assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
    assert_eq!(body["contents"][0]["parts"][0]["inlineData"]["data"], "QUJD");
    let system = body["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
    assert!(system.contains("Elementary (A2)"));
  }

  #[tokio::test]
  async fn service_error_message_passes_through() {
    let mock = spawn_mock_gemini(|_, _| MockReply {
      status: StatusCode::TOO_MANY_REQUESTS,
      body: json!({ "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" } }),
    })
    .await;
    let gemini = client_for(&mock.base_url);
    let err = gemini
      .correct_writing(&Prompts::default(), "I has a cat", "Write about pets")
      .await
      .unwrap_err();
    assert_eq!(err, AppError::Service("Resource has been exhausted".into()));
  }

  #[tokio::test]
  async fn prose_reply_without_json_is_malformed() {
    let mock = spawn_mock_gemini(|_, _| MockReply::ok(text_reply("Sorry, I cannot help with that."))).await;
    let gemini = client_for(&mock.base_url);
    let err = gemini.evaluate_speech(&Prompts::default(), "UklGRg==", "audio/wav").await.unwrap_err();
    assert_eq!(err, AppError::MalformedResponse);
  }

  #[tokio::test]
  async fn speech_synthesis_returns_inline_audio() {
    let mock = spawn_mock_gemini(|_, _| {
      MockReply::ok(json!({ "candidates": [{ "content": { "parts": [
        { "inlineData": { "mimeType": "audio/L16;rate=24000", "data": "AAABAA==" } }
      ]}}]}))
    })
    .await;
    let gemini = client_for(&mock.base_url);
    let audio = gemini.synthesize_speech("Hello").await.unwrap();
    assert_eq!(audio.as_deref(), Some("AAABAA=="));

    let seen = mock.requests();
    let (model, body) = &seen[0];
    assert_eq!(model, "gemini-2.5-flash-preview-tts");
    assert_eq!(body["generationConfig"]["responseModalities"][0], "AUDIO");
    assert_eq!(
      body["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
      "Kore"
    );
  }

  #[tokio::test]
  async fn image_without_inline_data_is_an_error() {
    let mock = spawn_mock_gemini(|_, _| MockReply::ok(text_reply("no picture today"))).await;
    let gemini = client_for(&mock.base_url);
    let err = gemini
      .generate_story_image(&Prompts::default(), "a cat", "watercolor", ImageRatio::Landscape)
      .await
      .unwrap_err();
    assert!(matches!(err, AppError::Service(_)));
    assert_eq!(mock.requests()[0].1["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
  }
}
