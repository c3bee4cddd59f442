//! Mrs. Dung · English Lesson Backend
//!
//! - Axum HTTP + WebSocket API
//! - Gemini integration for lessons, stories, mind maps, grading, images, speech
//! - Shared audio playback queue broadcast to WebSocket listeners
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT               : u16 (default 3000)
//!   GEMINI_API_KEY     : initial key when none is saved yet
//!   API_KEY_FILE       : where a key saved through settings is kept
//!   GEMINI_BASE_URL    : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_TEXT_MODEL / GEMINI_TTS_MODEL / GEMINI_IMAGE_MODEL : model overrides
//!   GEMINI_VOICE       : prebuilt TTS voice name
//!   GEMINI_TIMEOUT_SECS: per-request timeout (default 120)
//!   LESSON_CAPACITY    : lessons kept in memory before the oldest is evicted (default 32)
//!   AUDIO_PACE         : "0"/"false" to push queued clips without waiting out their length
//!   AGENT_CONFIG_PATH  : path to TOML config (prompts + scoring)
//!   LOG_LEVEL          : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT         : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod domain;
mod config;
mod salvage;
mod schemas;
mod keystore;
mod gemini;
mod grading;
mod widgets;
mod session;
mod audio;
mod export;
mod state;
mod protocol;
mod logic;
mod routes;
#[cfg(test)]
mod testutil;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: key store, prompts, Gemini client settings, stores, audio queue.
  let state = Arc::new(AppState::from_env()?);

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "mrsdung_backend", %addr, has_api_key = state.keys.is_set().await, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      info!(target: "mrsdung_backend", "Shutdown signal received");
    })
    .await?;
  Ok(())
}
