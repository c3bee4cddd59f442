//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Uploaded pages and recordings arrive base64-encoded inside JSON.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Build the application router with:
/// - WebSocket at `/ws` (practice messages + audio queue broadcasts)
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // Settings
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/settings", get(http::http_get_settings))
        .route("/api/v1/settings/api-key", post(http::http_post_api_key))
        // Lesson planner + practice
        .route("/api/v1/lesson", post(http::http_post_lesson))
        .route("/api/v1/lesson/:id", get(http::http_get_lesson).delete(http::http_delete_lesson))
        .route("/api/v1/session/:id/answer", post(http::http_post_answer))
        .route("/api/v1/session/:id/submit", post(http::http_post_submit))
        .route("/api/v1/session/:id/next", post(http::http_post_next))
        .route("/api/v1/session/:id/flashcard", post(http::http_post_flashcard))
        .route("/api/v1/session/:id/matching", post(http::http_post_matching))
        .route("/api/v1/session/:id/score", get(http::http_get_score))
        .route("/api/v1/session/:id/certificate", post(http::http_post_certificate))
        // Story, mind map, evaluation, media
        .route("/api/v1/story", post(http::http_post_story))
        .route("/api/v1/mindmap", post(http::http_post_mind_map))
        .route("/api/v1/mindmap/prompt", post(http::http_post_mind_map_prompt))
        .route("/api/v1/presentation", post(http::http_post_presentation))
        .route("/api/v1/writing/correct", post(http::http_post_writing))
        .route("/api/v1/speech/evaluate", post(http::http_post_speech))
        .route("/api/v1/image", post(http::http_post_image))
        .route("/api/v1/tts", post(http::http_post_tts))
        .route("/api/v1/speak", post(http::http_post_speak))
        .route("/api/v1/export/filename", post(http::http_post_export_filename))
        // State + body limit + CORS + HTTP tracing
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
