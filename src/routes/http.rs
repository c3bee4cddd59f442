//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Errors render through `AppError`'s `IntoResponse`.

use std::sync::Arc;
use axum::{extract::{Path, State}, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::export::{export_filename, Certificate, ExportKind};
use crate::logic;
use crate::protocol::*;
use crate::session::{FlashcardView, MatchingView, ScoreSummary, SubmitResult};
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, AppError>;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_settings(State(state): State<Arc<AppState>>) -> Json<SettingsOut> {
  Json(logic::settings(&state).await)
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_api_key(State(state): State<Arc<AppState>>, Json(body): Json<ApiKeyIn>) -> ApiResult<SettingsOut> {
  Ok(Json(logic::save_api_key(&state, &body.api_key).await?))
}

#[instrument(level = "info", skip(state, body), fields(mode = ?body.mode))]
pub async fn http_post_lesson(State(state): State<Arc<AppState>>, Json(body): Json<LessonIn>) -> ApiResult<LessonOut> {
  let out = logic::create_lesson(&state, body).await?;
  info!(target: "lesson", lesson_id = %out.lesson_id, warnings = out.warnings.len(), "HTTP lesson generated");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_lesson(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
  state.get_lesson(&id).await.map(Json)
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_lesson(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<DeletedOut> {
  let sessions_closed = state.remove_lesson(&id).await?;
  Ok(Json(DeletedOut { deleted: true, sessions_closed }))
}

#[instrument(level = "info", skip(state, body), fields(zone = ?body.zone, question_id = %body.question_id))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<AnswerIn>,
) -> ApiResult<OkOut> {
  logic::answer(&state, &id, body.zone, &body.question_id, body.value).await?;
  Ok(Json(OkOut { ok: true }))
}

#[instrument(level = "info", skip(state, body), fields(zone = ?body.zone, question_id = %body.question_id))]
pub async fn http_post_submit(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<SubmitIn>,
) -> ApiResult<SubmitResult> {
  Ok(Json(logic::submit(&state, &id, body.zone, &body.question_id).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_next(State(state): State<Arc<AppState>>, Path(id): Path<String>, Json(body): Json<NextIn>) -> ApiResult<IndexOut> {
  let index = logic::next_question(&state, &id, body.zone).await?;
  Ok(Json(IndexOut { index }))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_flashcard(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<FlashcardIn>,
) -> ApiResult<FlashcardView> {
  Ok(Json(logic::flashcard(&state, &id, body.action).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_matching(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<MatchingIn>,
) -> ApiResult<MatchingView> {
  Ok(Json(logic::matching(&state, &id, body).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_score(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<ScoreSummary> {
  Ok(Json(logic::score(&state, &id).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_certificate(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  body: Option<Json<CertificateIn>>,
) -> ApiResult<Certificate> {
  let name = body.and_then(|Json(b)| b.student_name);
  Ok(Json(logic::certificate(&state, &id, name.as_deref()).await?))
}

#[instrument(level = "info", skip(state, body), fields(images = body.images.len()))]
pub async fn http_post_story(State(state): State<Arc<AppState>>, Json(body): Json<StoryIn>) -> ApiResult<StoryOut> {
  Ok(Json(logic::story(&state, body).await?))
}

#[instrument(level = "info", skip(state, body), fields(mode = ?body.mode))]
pub async fn http_post_mind_map(State(state): State<Arc<AppState>>, Json(body): Json<MindMapIn>) -> ApiResult<MindMapOut> {
  Ok(Json(logic::mind_map(&state, body).await?))
}

#[instrument(level = "info", skip(state, body), fields(mode = ?body.mode))]
pub async fn http_post_mind_map_prompt(State(state): State<Arc<AppState>>, Json(body): Json<MindMapIn>) -> ApiResult<PromptOut> {
  Ok(Json(logic::mind_map_prompt(&state, body).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_presentation(
  State(state): State<Arc<AppState>>,
  Json(body): Json<PresentationIn>,
) -> ApiResult<PresentationOut> {
  Ok(Json(logic::presentation(&state, body).await?))
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_post_writing(State(state): State<Arc<AppState>>, Json(body): Json<WritingIn>) -> ApiResult<WritingOut> {
  Ok(Json(logic::correct_writing(&state, body).await?))
}

#[instrument(level = "info", skip(state, body), fields(audio_len = body.audio_base64.len()))]
pub async fn http_post_speech(State(state): State<Arc<AppState>>, Json(body): Json<SpeechIn>) -> ApiResult<SpeechOut> {
  Ok(Json(logic::evaluate_speech(&state, body).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_image(State(state): State<Arc<AppState>>, Json(body): Json<ImageIn>) -> ApiResult<ImageOut> {
  Ok(Json(logic::story_image(&state, body).await?))
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_post_tts(State(state): State<Arc<AppState>>, Json(body): Json<TextIn>) -> ApiResult<TtsOut> {
  Ok(Json(logic::tts(&state, &body.text).await?))
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_post_speak(State(state): State<Arc<AppState>>, Json(body): Json<TextIn>) -> ApiResult<QueuedOut> {
  Ok(Json(logic::speak(&state, &body.text).await?))
}

#[instrument(level = "info")]
pub async fn http_post_export_filename(Json(body): Json<ExportKind>) -> Json<FilenameOut> {
  Json(FilenameOut { filename: export_filename(&body) })
}

#[cfg(test)]
mod tests {
  use crate::routes::build_router;
  use crate::testutil::{sample_lesson, spawn_mock_gemini, test_state, test_state_for, text_reply, MockReply};
  use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
  };
  use serde_json::{json, Value};
  use std::sync::Arc;
  use tower::ServiceExt;

  async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let req = Request::builder()
      .method(method)
      .uri(uri)
      .header("content-type", "application/json")
      .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
      .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let v = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, v)
  }

  #[tokio::test]
  async fn health_and_settings() {
    let app = build_router(Arc::new(test_state()));
    let (s, v) = call(&app, Method::GET, "/api/v1/health", None).await;
    assert_eq!((s, v), (StatusCode::OK, json!({ "ok": true })));

    let (_, v) = call(&app, Method::GET, "/api/v1/settings", None).await;
    assert_eq!(v, json!({ "hasApiKey": false }));
    let (s, v) = call(&app, Method::POST, "/api/v1/settings/api-key", Some(json!({ "apiKey": " abc " }))).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(v, json!({ "hasApiKey": true }));
  }

  #[tokio::test]
  async fn generation_without_key_is_401() {
    let app = build_router(Arc::new(test_state()));
    let (s, v) = call(&app, Method::POST, "/api/v1/lesson", Some(json!({ "mode": "topic", "topic": "Pets" }))).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);
    assert_eq!(v["error"]["kind"], "missing_api_key");
  }

  #[tokio::test]
  async fn blank_topic_is_400_with_vietnamese_message() {
    let mock = spawn_mock_gemini(|_, _| MockReply::ok(text_reply("{}"))).await;
    let app = build_router(Arc::new(test_state_for(&mock.base_url)));
    let (s, v) = call(&app, Method::POST, "/api/v1/lesson", Some(json!({ "mode": "topic", "topic": "  " }))).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"]["message"], "Hãy nhập chủ đề bài học con nhé!");
    assert!(mock.requests().is_empty());
  }

  #[tokio::test]
  async fn lesson_flow_over_http() {
    let lesson = serde_json::to_string(&sample_lesson(10)).unwrap();
    let mock = spawn_mock_gemini(move |_, _| MockReply::ok(text_reply(&lesson))).await;
    let app = build_router(Arc::new(test_state_for(&mock.base_url)));

    let (s, created) = call(
      &app,
      Method::POST,
      "/api/v1/lesson",
      Some(json!({ "mode": "text", "text": "My pets", "level": "A2" })),
    )
    .await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(created["warnings"], json!([]));
    let sid = created["sessionId"].as_str().unwrap().to_string();
    let lid = created["lessonId"].as_str().unwrap().to_string();

    let (s, _) = call(
      &app,
      Method::POST,
      &format!("/api/v1/session/{sid}/answer"),
      Some(json!({ "zone": "mc", "questionId": "mc2", "value": 2 })),
    )
    .await;
    assert_eq!(s, StatusCode::OK);
    let (_, r) = call(
      &app,
      Method::POST,
      &format!("/api/v1/session/{sid}/submit"),
      Some(json!({ "zone": "mc", "questionId": "mc2" })),
    )
    .await;
    assert_eq!(r["correct"], true);
    assert_eq!(r["expected"], "c");

    let (s, v) = call(
      &app,
      Method::POST,
      &format!("/api/v1/session/{sid}/answer"),
      Some(json!({ "zone": "mc", "questionId": "mc2", "value": 1 })),
    )
    .await;
    assert_eq!(s, StatusCode::CONFLICT);
    assert_eq!(v["error"]["kind"], "already_submitted");

    let (_, score) = call(&app, Method::GET, &format!("/api/v1/session/{sid}/score"), None).await;
    assert_eq!(score["scores"]["mc"], 1);
    assert_eq!(score["scores"]["match"], 0);
    assert_eq!(score["score"], 0.2);

    let (_, cert) = call(
      &app,
      Method::POST,
      &format!("/api/v1/session/{sid}/certificate"),
      Some(json!({ "studentName": "An" })),
    )
    .await;
    assert_eq!(cert["filename"], "Certificate-MrsDung-An.png");
    assert!(cert["dateLine"].as_str().unwrap().starts_with("Ngày "));

    let (s, _) = call(&app, Method::DELETE, &format!("/api/v1/lesson/{lid}"), None).await;
    assert_eq!(s, StatusCode::OK);
    let (s, _) = call(&app, Method::GET, &format!("/api/v1/session/{sid}/score"), None).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn flashcard_and_matching_endpoints() {
    let state = test_state();
    let (lid, _) = state.insert_lesson(sample_lesson(3)).await;
    let sid = state.open_session(&lid).await.unwrap();
    let app = build_router(Arc::new(state));

    let (_, v) = call(&app, Method::POST, &format!("/api/v1/session/{sid}/flashcard"), Some(json!({ "action": "prev" }))).await;
    assert_eq!(v["index"], 2);
    assert_eq!(v["face"], "front");

    let uri = format!("/api/v1/session/{sid}/matching");
    call(&app, Method::POST, &uri, Some(json!({ "side": "left", "pairId": "m1" }))).await;
    let (_, v) = call(&app, Method::POST, &uri, Some(json!({ "side": "right", "pairId": "m2" }))).await;
    assert_eq!(v["outcome"], "mismatch");
    let (s, _) = call(&app, Method::POST, &uri, Some(json!({}))).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn export_filename_endpoint() {
    let app = build_router(Arc::new(test_state()));
    let (_, v) = call(
      &app,
      Method::POST,
      "/api/v1/export/filename",
      Some(json!({ "kind": "summary", "topic": "Food", "page": 3 })),
    )
    .await;
    assert_eq!(v["filename"], "Summary-MrsDung-Food-P3.png");
  }
}
