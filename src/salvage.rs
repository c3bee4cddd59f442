//! Recovering JSON documents from model output.
//!
//! Models asked for JSON still wrap it in code fences or surround it with
//! prose now and then. Decoding happens in two stages that are tested apart:
//!   1. `extract_candidate`: tolerant string scanning that cuts out the most
//!      likely JSON object.
//!   2. `decode_strict`: a plain serde decode into the target record.
//!
//! `parse_model_json` glues both and maps failures onto the two
//! response-shape errors of `AppError`.

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::AppError;
use crate::util::trunc_for_log;

/// Above this many characters a failed decode without a closing brace is
/// reported as a truncated document instead of a malformed one.
pub const TRUNCATION_THRESHOLD: usize = 1000;

/// Remove one leading ```` ``` ```` / ```` ```json ```` fence and one trailing fence.
fn strip_fences(s: &str) -> &str {
  let mut out = s;
  if let Some(rest) = out.strip_prefix("```") {
    let rest = match rest.get(..4) {
      Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
      _ => rest,
    };
    out = rest.trim_start();
  }
  if let Some(rest) = out.strip_suffix("```") {
    out = rest.trim_end();
  }
  out
}

/// Stage 1: cut the candidate object out of raw model text.
///
/// Fails only when there is no `{` at all.
pub fn extract_candidate(raw: &str) -> Result<&str, AppError> {
  let clean = strip_fences(raw.trim());
  let start = clean.find('{').ok_or(AppError::MalformedResponse)?;
  let candidate = match clean.rfind('}') {
    Some(end) if end > start => &clean[start..=end],
    _ => &clean[start..],
  };
  Ok(candidate)
}

/// Stage 2: strict decode of an extracted candidate.
pub fn decode_strict<T: DeserializeOwned>(candidate: &str) -> Result<T, serde_json::Error> {
  serde_json::from_str::<T>(candidate)
}

/// Pick the response-shape error for a raw text whose decode failed.
pub fn classify_failure(raw: &str) -> AppError {
  if raw.chars().count() > TRUNCATION_THRESHOLD && !raw.ends_with('}') {
    AppError::ResponseTruncated
  } else {
    AppError::MalformedResponse
  }
}

/// Extract + decode, mapping every failure onto the response-shape taxonomy.
pub fn parse_model_json<T: DeserializeOwned>(raw: &str) -> Result<T, AppError> {
  let candidate = extract_candidate(raw).map_err(|e| {
    warn!(target: "gemini", raw_len = raw.len(), "No JSON object in model response");
    e
  })?;
  decode_strict::<T>(candidate).map_err(|e| {
    warn!(
      target: "gemini",
      raw_len = raw.len(),
      error = %e,
      preview = %trunc_for_log(raw, 160),
      "JSON decode of model response failed"
    );
    classify_failure(raw)
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Deserialize;

  #[derive(Debug, Deserialize, PartialEq)]
  struct Sample {
    topic: String,
    count: u32,
  }

  const BODY: &str = r#"{"topic": "Animals", "count": 3}"#;

  #[test]
  fn fenced_and_bare_json_decode_to_the_same_value() {
    let bare: Sample = parse_model_json(BODY).unwrap();
    for raw in [
      format!("```json\n{}\n```", BODY),
      format!("```JSON {}```", BODY),
      format!("```\n{}\n```\n", BODY),
      format!("  ```Json\n\n{}  \n```  ", BODY),
    ] {
      let fenced: Sample = parse_model_json(&raw).unwrap();
      assert_eq!(fenced, bare, "raw = {raw:?}");
    }
  }

  #[test]
  fn surrounding_prose_is_cut_away() {
    let raw = format!("Sure! Here is the lesson:\n{}\nHope this helps.", BODY);
    assert_eq!(extract_candidate(&raw).unwrap(), BODY);
  }

  #[test]
  fn missing_open_brace_is_malformed() {
    assert_eq!(extract_candidate("no json here"), Err(AppError::MalformedResponse));
    let r: Result<Sample, _> = parse_model_json("```json\n[1, 2, 3]\n```");
    assert_eq!(r, Err(AppError::MalformedResponse));
    let long = "x".repeat(TRUNCATION_THRESHOLD + 50);
    let r: Result<Sample, _> = parse_model_json(&long);
    assert_eq!(r, Err(AppError::MalformedResponse));
  }

  #[test]
  fn slice_runs_to_end_when_no_closing_brace_follows() {
    assert_eq!(extract_candidate(r#"junk {"topic": "A""#).unwrap(), r#"{"topic": "A""#);
    assert_eq!(extract_candidate("} before {\"a\":1").unwrap(), "{\"a\":1");
  }

  #[test]
  fn long_unterminated_response_is_truncated() {
    let raw = format!(r#"{{"topic": "{}"#, "a".repeat(1200));
    let r: Result<Sample, _> = parse_model_json(&raw);
    assert_eq!(r, Err(AppError::ResponseTruncated));
  }

  #[test]
  fn long_response_ending_in_brace_is_malformed_not_truncated() {
    let raw = format!(r#"{{"topic": "{}", "count": "nope"}}"#, "a".repeat(1200));
    let r: Result<Sample, _> = parse_model_json(&raw);
    assert_eq!(r, Err(AppError::MalformedResponse));
  }

  #[test]
  fn short_unterminated_response_is_malformed() {
    let r: Result<Sample, _> = parse_model_json(r#"{"topic": "Ani"#);
    assert_eq!(r, Err(AppError::MalformedResponse));
  }

  #[test]
  fn wrong_shape_is_malformed() {
    let r: Result<Sample, _> = parse_model_json(r#"{"topic": 12}"#);
    assert_eq!(r, Err(AppError::MalformedResponse));
  }
}
