//! Application error type shared by the Gemini client, the practice session
//! logic and the HTTP/WS handlers.
//!
//! User-facing messages for validation and response-shape failures are in
//! Vietnamese because they are rendered verbatim to the child using the app.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;

pub const MSG_TRUNCATED: &str =
  "Tài liệu quá lớn khiến AI không thể đóng gói JSON. Hãy thử nhập ít văn bản hơn hoặc chia nhỏ ảnh!";
pub const MSG_MALFORMED: &str = "Lỗi cấu trúc dữ liệu từ AI. Hãy nhấn 'Soạn lại' để thử lại nhé!";

#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
  /// No Gemini API key stored; the client must show the settings dialog.
  MissingApiKey,
  /// Input rejected before any network call.
  InvalidInput(String),
  /// Network or Gemini failure, message passed through as received.
  Service(String),
  /// Model output was long and cut off before the closing brace.
  ResponseTruncated,
  /// Model output could not be decoded into the expected shape.
  MalformedResponse,
  NotFound(String),
  /// Answer change attempted after the question was submitted.
  AlreadySubmitted(String),
  Internal(String),
}

impl AppError {
  /// Stable machine-readable tag used in error bodies and WS messages.
  pub fn kind(&self) -> &'static str {
    match self {
      AppError::MissingApiKey => "missing_api_key",
      AppError::InvalidInput(_) => "invalid_input",
      AppError::Service(_) => "service",
      AppError::ResponseTruncated => "response_truncated",
      AppError::MalformedResponse => "malformed_response",
      AppError::NotFound(_) => "not_found",
      AppError::AlreadySubmitted(_) => "already_submitted",
      AppError::Internal(_) => "internal",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      AppError::MissingApiKey => StatusCode::UNAUTHORIZED,
      AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
      AppError::Service(_) | AppError::ResponseTruncated | AppError::MalformedResponse => StatusCode::BAD_GATEWAY,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::AlreadySubmitted(_) => StatusCode::CONFLICT,
      AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl std::fmt::Display for AppError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      AppError::MissingApiKey => write!(f, "Gemini API key is not configured"),
      AppError::InvalidInput(msg) => write!(f, "{}", msg),
      AppError::Service(msg) => write!(f, "{}", msg),
      AppError::ResponseTruncated => write!(f, "{}", MSG_TRUNCATED),
      AppError::MalformedResponse => write!(f, "{}", MSG_MALFORMED),
      AppError::NotFound(what) => write!(f, "Not found: {}", what),
      AppError::AlreadySubmitted(id) => write!(f, "Question {} was already submitted", id),
      AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
    }
  }
}

impl std::error::Error for AppError {}

impl From<reqwest::Error> for AppError {
  fn from(e: reqwest::Error) -> Self {
    AppError::Service(e.to_string())
  }
}

impl From<std::io::Error> for AppError {
  fn from(e: std::io::Error) -> Self {
    AppError::Internal(e.to_string())
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let body = json!({ "error": { "kind": self.kind(), "message": self.to_string() } });
    (self.status(), Json(body)).into_response()
  }
}
